// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Patient repository.

use async_trait::async_trait;
use chrono::Utc;
use phi_server_auth::{
	LookupError, OrgId, PatientId, PatientLinkStore, PatientScope, ResourceKind, ResourceRef,
	UserId,
};
use sqlx::{sqlite::SqlitePool, QueryBuilder, Row, Sqlite};
use uuid::Uuid;

use crate::error::DbError;
use crate::time;

/// A patient enrolled in one organization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatientRecord {
	pub id: PatientId,
	pub organization_id: OrgId,
	/// The patient's own login, if they have one.
	pub user_id: Option<UserId>,
}

impl PatientRecord {
	/// Resource attributes for authorizing access to this patient's data.
	pub fn resource(&self, kind: ResourceKind) -> ResourceRef {
		ResourceRef::of_patient(kind, self.organization_id, self.id)
	}
}

#[derive(Clone)]
pub struct PatientRepository {
	pool: SqlitePool,
}

impl PatientRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	#[tracing::instrument(skip(self), fields(org_id = %org_id))]
	pub async fn create_patient(
		&self,
		org_id: OrgId,
		user_id: Option<UserId>,
	) -> Result<PatientRecord, DbError> {
		let record = PatientRecord {
			id: PatientId::generate(),
			organization_id: org_id,
			user_id,
		};

		sqlx::query(
			r#"
			INSERT INTO patients (id, organization_id, user_id, created_at)
			VALUES (?, ?, ?, ?)
			"#,
		)
		.bind(record.id.to_string())
		.bind(org_id.to_string())
		.bind(user_id.map(|u| u.to_string()))
		.bind(time::encode(&Utc::now()))
		.execute(&self.pool)
		.await?;

		tracing::debug!(patient_id = %record.id, "patient created");
		Ok(record)
	}

	#[tracing::instrument(skip(self), fields(patient_id = %id))]
	pub async fn get_patient(&self, id: PatientId) -> Result<Option<PatientRecord>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, organization_id, user_id FROM patients
			WHERE id = ? AND deleted_at IS NULL
			"#,
		)
		.bind(id.to_string())
		.fetch_optional(&self.pool)
		.await?;

		row.map(|r| row_to_patient(&r)).transpose()
	}

	#[tracing::instrument(skip(self), fields(user_id = %user_id, org_id = %org_id))]
	pub async fn find_for_user(
		&self,
		user_id: UserId,
		org_id: OrgId,
	) -> Result<Option<PatientId>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id FROM patients
			WHERE organization_id = ? AND user_id = ? AND deleted_at IS NULL
			LIMIT 1
			"#,
		)
		.bind(org_id.to_string())
		.bind(user_id.to_string())
		.fetch_optional(&self.pool)
		.await?;

		row.map(|r| parse_id::<PatientId>(&r.get::<String, _>("id"), "patient id"))
			.transpose()
	}

	#[tracing::instrument(skip(self), fields(patient_id = %id))]
	pub async fn organization_of(&self, id: PatientId) -> Result<Option<OrgId>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT organization_id FROM patients
			WHERE id = ? AND deleted_at IS NULL
			"#,
		)
		.bind(id.to_string())
		.fetch_optional(&self.pool)
		.await?;

		row.map(|r| parse_id::<OrgId>(&r.get::<String, _>("organization_id"), "organization_id"))
			.transpose()
	}

	/// Patients of `org_id` restricted to `scope`, ordered by id.
	///
	/// An empty explicit scope returns no rows without touching the database.
	#[tracing::instrument(skip(self, scope), fields(org_id = %org_id))]
	pub async fn list_in_scope(
		&self,
		org_id: OrgId,
		scope: &PatientScope,
		limit: i64,
		offset: i64,
	) -> Result<Vec<PatientRecord>, DbError> {
		if scope.is_empty() {
			return Ok(Vec::new());
		}

		let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
			"SELECT id, organization_id, user_id FROM patients WHERE deleted_at IS NULL AND organization_id = ",
		);
		qb.push_bind(org_id.to_string());

		if let Some(ids) = scope.ids() {
			qb.push(" AND id IN (");
			let mut separated = qb.separated(", ");
			for id in ids {
				separated.push_bind(id.to_string());
			}
			separated.push_unseparated(")");
		}

		qb.push(" ORDER BY id LIMIT ")
			.push_bind(limit.clamp(1, 1000))
			.push(" OFFSET ")
			.push_bind(offset.max(0));

		let rows = qb.build().fetch_all(&self.pool).await?;
		rows.iter().map(row_to_patient).collect()
	}
}

#[async_trait]
impl PatientLinkStore for PatientRepository {
	async fn patient_for_user(
		&self,
		user_id: UserId,
		org_id: OrgId,
	) -> Result<Option<PatientId>, LookupError> {
		self
			.find_for_user(user_id, org_id)
			.await
			.map_err(|e| e.into_lookup("patient_link_store"))
	}

	async fn organization_of(&self, patient_id: PatientId) -> Result<Option<OrgId>, LookupError> {
		PatientRepository::organization_of(self, patient_id)
			.await
			.map_err(|e| e.into_lookup("patient_link_store"))
	}
}

pub(crate) fn parse_id<T: From<Uuid>>(value: &str, what: &str) -> Result<T, DbError> {
	Uuid::parse_str(value)
		.map(T::from)
		.map_err(|e| DbError::Internal(format!("Invalid {what}: {e}")))
}

fn row_to_patient(row: &sqlx::sqlite::SqliteRow) -> Result<PatientRecord, DbError> {
	let id: String = row.get("id");
	let org_id: String = row.get("organization_id");
	let user_id: Option<String> = row.get("user_id");

	Ok(PatientRecord {
		id: parse_id(&id, "patient id")?,
		organization_id: parse_id(&org_id, "organization_id")?,
		user_id: user_id
			.map(|u| parse_id(&u, "user_id"))
			.transpose()?,
	})
}
