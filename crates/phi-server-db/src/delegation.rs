// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Delegation (proxy) grant repository.
//!
//! A grant is active iff `revoked_at IS NULL AND (expires_at IS NULL OR
//! expires_at > now)`. The predicate is evaluated in SQL on every lookup.
//!
//! Grants change only through [`DelegationRepository::create_grant`],
//! [`DelegationRepository::update_permissions`] and
//! [`DelegationRepository::revoke`], each touching exactly one row by primary
//! key. Revocation is terminal.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use phi_server_auth::{
	DelegationGrant, DelegationStore, GrantId, LookupError, OrgId, PatientId, Permission,
	PermissionSet, UserId,
};
use sqlx::{sqlite::SqlitePool, Row};

use crate::error::DbError;
use crate::patient::parse_id;
use crate::time;

/// Storage column for each permission bit, in bind order.
const PERMISSION_COLUMNS: [(Permission, &str); 6] = [
	(Permission::ViewProfile, "can_view_profile"),
	(Permission::ViewAppointments, "can_view_appointments"),
	(Permission::ScheduleAppointments, "can_schedule_appointments"),
	(Permission::ViewClinicalNotes, "can_view_clinical_notes"),
	(Permission::ViewBilling, "can_view_billing"),
	(Permission::MessageProviders, "can_message_providers"),
];

const GRANT_COLUMNS: &str = "a.id, a.proxy_user_id, a.patient_id, a.relationship, \
	a.can_view_profile, a.can_view_appointments, a.can_schedule_appointments, \
	a.can_view_clinical_notes, a.can_view_billing, a.can_message_providers, \
	a.granted_at, a.expires_at, a.revoked_at";

const ACTIVE: &str = "a.revoked_at IS NULL AND (a.expires_at IS NULL OR a.expires_at > ?)";

/// Input for [`DelegationRepository::create_grant`].
#[derive(Debug, Clone)]
pub struct NewGrant {
	pub proxy_user_id: UserId,
	pub patient_id: PatientId,
	pub relationship: String,
	pub permissions: PermissionSet,
	pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct DelegationRepository {
	pool: SqlitePool,
}

impl DelegationRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Create a grant.
	///
	/// # Errors
	/// - `DbError::Conflict` if the pair already has an active grant, or `expires_at` is not in the future
	/// - `DbError::NotFound` if the patient does not exist
	#[tracing::instrument(
		skip(self, grant),
		fields(proxy_user_id = %grant.proxy_user_id, patient_id = %grant.patient_id)
	)]
	pub async fn create_grant(&self, grant: NewGrant) -> Result<DelegationGrant, DbError> {
		let now = Utc::now();
		if grant.expires_at.is_some_and(|e| e <= now) {
			return Err(DbError::Conflict("grant would already be expired".to_string()));
		}

		let created = DelegationGrant {
			id: GrantId::generate(),
			proxy_user_id: grant.proxy_user_id,
			patient_id: grant.patient_id,
			relationship: grant.relationship,
			permissions: grant.permissions,
			granted_at: now,
			expires_at: grant.expires_at,
			revoked_at: None,
		};
		let now_text = time::encode(&now);

		let mut query = sqlx::query(
			r#"
			INSERT INTO patient_proxy_assignments (
				id, proxy_user_id, patient_id, relationship,
				can_view_profile, can_view_appointments, can_schedule_appointments,
				can_view_clinical_notes, can_view_billing, can_message_providers,
				granted_at, expires_at, revoked_at, updated_at
			)
			SELECT ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, ?
			WHERE NOT EXISTS (
				SELECT 1 FROM patient_proxy_assignments a
				WHERE a.proxy_user_id = ? AND a.patient_id = ?
				  AND a.revoked_at IS NULL AND (a.expires_at IS NULL OR a.expires_at > ?)
			)
			"#,
		)
		.bind(created.id.to_string())
		.bind(created.proxy_user_id.to_string())
		.bind(created.patient_id.to_string())
		.bind(&created.relationship);
		for (permission, _) in PERMISSION_COLUMNS {
			query = query.bind(created.permissions.contains(permission));
		}
		let result = query
			.bind(&now_text)
			.bind(created.expires_at.as_ref().map(time::encode))
			.bind(&now_text)
			.bind(created.proxy_user_id.to_string())
			.bind(created.patient_id.to_string())
			.bind(&now_text)
			.execute(&self.pool)
			.await;

		match result {
			Ok(r) if r.rows_affected() == 0 => Err(DbError::Conflict(format!(
				"an active grant already exists for proxy {} and patient {}",
				created.proxy_user_id, created.patient_id
			))),
			Ok(_) => {
				tracing::debug!(grant_id = %created.id, "delegation grant created");
				Ok(created)
			}
			Err(sqlx::Error::Database(e)) if e.is_foreign_key_violation() => Err(DbError::NotFound(
				format!("patient {}", created.patient_id),
			)),
			Err(e) => Err(e.into()),
		}
	}

	/// Get a grant by id, whatever its state.
	#[tracing::instrument(skip(self), fields(grant_id = %id))]
	pub async fn get_grant(&self, id: GrantId) -> Result<Option<DelegationGrant>, DbError> {
		let sql = format!("SELECT {GRANT_COLUMNS} FROM patient_proxy_assignments a WHERE a.id = ?");
		let row = sqlx::query(&sql)
			.bind(id.to_string())
			.fetch_optional(&self.pool)
			.await?;

		row.map(|r| row_to_grant(&r)).transpose()
	}

	/// Replace the permission bits of an active grant.
	///
	/// # Errors
	/// - `DbError::NotFound` if the grant does not exist
	/// - `DbError::Conflict` if the grant is revoked or expired
	#[tracing::instrument(skip(self), fields(grant_id = %id))]
	pub async fn update_permissions(
		&self,
		id: GrantId,
		permissions: PermissionSet,
	) -> Result<DelegationGrant, DbError> {
		let now_text = time::encode(&Utc::now());
		let assignments = PERMISSION_COLUMNS
			.iter()
			.map(|(_, column)| format!("{column} = ?"))
			.collect::<Vec<_>>()
			.join(", ");
		let sql = format!(
			"UPDATE patient_proxy_assignments SET {assignments}, updated_at = ? \
			 WHERE id = ? AND revoked_at IS NULL AND (expires_at IS NULL OR expires_at > ?)"
		);

		let mut query = sqlx::query(&sql);
		for (permission, _) in PERMISSION_COLUMNS {
			query = query.bind(permissions.contains(permission));
		}
		let result = query
			.bind(&now_text)
			.bind(id.to_string())
			.bind(&now_text)
			.execute(&self.pool)
			.await?;

		if result.rows_affected() == 0 {
			return Err(self.missing_or_inactive(id).await);
		}

		tracing::debug!(permissions = ?permissions, "delegation permissions updated");
		self
			.get_grant(id)
			.await?
			.ok_or_else(|| DbError::NotFound(format!("grant {id}")))
	}

	/// Revoke a grant. Takes effect for the very next lookup.
	///
	/// # Errors
	/// - `DbError::NotFound` if the grant does not exist
	/// - `DbError::Conflict` if the grant was already revoked
	#[tracing::instrument(skip(self), fields(grant_id = %id))]
	pub async fn revoke(&self, id: GrantId) -> Result<DelegationGrant, DbError> {
		let now_text = time::encode(&Utc::now());
		let result = sqlx::query(
			r#"
			UPDATE patient_proxy_assignments
			SET revoked_at = ?, updated_at = ?
			WHERE id = ? AND revoked_at IS NULL
			"#,
		)
		.bind(&now_text)
		.bind(&now_text)
		.bind(id.to_string())
		.execute(&self.pool)
		.await?;

		if result.rows_affected() == 0 {
			return Err(match self.get_grant(id).await? {
				Some(_) => DbError::Conflict(format!("grant {id} is already revoked")),
				None => DbError::NotFound(format!("grant {id}")),
			});
		}

		tracing::info!("delegation grant revoked");
		self
			.get_grant(id)
			.await?
			.ok_or_else(|| DbError::NotFound(format!("grant {id}")))
	}

	#[tracing::instrument(skip(self), fields(proxy_user_id = %proxy_user_id, patient_id = %patient_id))]
	pub async fn find_active(
		&self,
		proxy_user_id: UserId,
		patient_id: PatientId,
	) -> Result<Option<DelegationGrant>, DbError> {
		let sql = format!(
			"SELECT {GRANT_COLUMNS} FROM patient_proxy_assignments a \
			 WHERE a.proxy_user_id = ? AND a.patient_id = ? AND {ACTIVE} \
			 ORDER BY a.granted_at DESC LIMIT 1"
		);
		let row = sqlx::query(&sql)
			.bind(proxy_user_id.to_string())
			.bind(patient_id.to_string())
			.bind(time::encode(&Utc::now()))
			.fetch_optional(&self.pool)
			.await?;

		row.map(|r| row_to_grant(&r)).transpose()
	}

	#[tracing::instrument(skip(self), fields(proxy_user_id = %proxy_user_id, org_id = %org_id))]
	pub async fn find_active_in_org(
		&self,
		proxy_user_id: UserId,
		org_id: OrgId,
	) -> Result<Vec<DelegationGrant>, DbError> {
		let sql = format!(
			"SELECT {GRANT_COLUMNS} FROM patient_proxy_assignments a \
			 JOIN patients p ON p.id = a.patient_id \
			 WHERE a.proxy_user_id = ? AND p.organization_id = ? AND p.deleted_at IS NULL AND {ACTIVE} \
			 ORDER BY a.granted_at"
		);
		let rows = sqlx::query(&sql)
			.bind(proxy_user_id.to_string())
			.bind(org_id.to_string())
			.bind(time::encode(&Utc::now()))
			.fetch_all(&self.pool)
			.await?;

		rows.iter().map(row_to_grant).collect()
	}

	async fn missing_or_inactive(&self, id: GrantId) -> DbError {
		match self.get_grant(id).await {
			Ok(Some(_)) => DbError::Conflict(format!("grant {id} is no longer active")),
			Ok(None) => DbError::NotFound(format!("grant {id}")),
			Err(e) => e,
		}
	}
}

#[async_trait]
impl DelegationStore for DelegationRepository {
	async fn active_delegation(
		&self,
		proxy_user_id: UserId,
		patient_id: PatientId,
	) -> Result<Option<DelegationGrant>, LookupError> {
		self
			.find_active(proxy_user_id, patient_id)
			.await
			.map_err(|e| e.into_lookup("delegation_store"))
	}

	async fn active_delegations(
		&self,
		proxy_user_id: UserId,
		org_id: OrgId,
	) -> Result<Vec<DelegationGrant>, LookupError> {
		self
			.find_active_in_org(proxy_user_id, org_id)
			.await
			.map_err(|e| e.into_lookup("delegation_store"))
	}
}

fn row_to_grant(row: &sqlx::sqlite::SqliteRow) -> Result<DelegationGrant, DbError> {
	let id: String = row.get("id");
	let proxy_user_id: String = row.get("proxy_user_id");
	let patient_id: String = row.get("patient_id");
	let granted_at: String = row.get("granted_at");

	let permissions = PERMISSION_COLUMNS
		.iter()
		.filter(|(_, column)| row.get::<bool, _>(*column))
		.map(|(permission, _)| *permission)
		.collect::<PermissionSet>();

	Ok(DelegationGrant {
		id: parse_id(&id, "grant id")?,
		proxy_user_id: parse_id(&proxy_user_id, "proxy_user_id")?,
		patient_id: parse_id(&patient_id, "patient_id")?,
		relationship: row.get("relationship"),
		permissions,
		granted_at: time::decode(&granted_at, "granted_at")?,
		expires_at: time::decode_opt(row.get("expires_at"), "expires_at")?,
		revoked_at: time::decode_opt(row.get("revoked_at"), "revoked_at")?,
	})
}
