// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Organization membership repository.
//!
//! Memberships are soft-deleted only. A removed member has no role.

use async_trait::async_trait;
use chrono::Utc;
use phi_server_auth::{LookupError, OrgId, Role, RoleStore, UserId};
use sqlx::{sqlite::SqlitePool, Row};
use uuid::Uuid;

use crate::error::DbError;
use crate::time;

#[derive(Clone)]
pub struct MembershipRepository {
	pool: SqlitePool,
}

impl MembershipRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Add a live membership.
	///
	/// # Errors
	/// Returns `DbError::Conflict` if the user already has a live membership in the organization.
	#[tracing::instrument(skip(self), fields(org_id = %org_id, user_id = %user_id, role = %role))]
	pub async fn add_member(&self, org_id: OrgId, user_id: UserId, role: Role) -> Result<(), DbError> {
		let result = sqlx::query(
			r#"
			INSERT INTO organization_memberships (id, organization_id, user_id, role, created_at)
			VALUES (?, ?, ?, ?, ?)
			"#,
		)
		.bind(Uuid::new_v4().to_string())
		.bind(org_id.to_string())
		.bind(user_id.to_string())
		.bind(role.as_str())
		.bind(time::encode(&Utc::now()))
		.execute(&self.pool)
		.await;

		match result {
			Ok(_) => {
				tracing::debug!("member added");
				Ok(())
			}
			Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(DbError::Conflict(
				format!("user {user_id} is already a member of {org_id}"),
			)),
			Err(e) => Err(e.into()),
		}
	}

	/// Soft-delete the live membership. Returns false when there was none.
	#[tracing::instrument(skip(self), fields(org_id = %org_id, user_id = %user_id))]
	pub async fn remove_member(&self, org_id: OrgId, user_id: UserId) -> Result<bool, DbError> {
		let result = sqlx::query(
			r#"
			UPDATE organization_memberships
			SET deleted_at = ?
			WHERE organization_id = ? AND user_id = ? AND deleted_at IS NULL
			"#,
		)
		.bind(time::encode(&Utc::now()))
		.bind(org_id.to_string())
		.bind(user_id.to_string())
		.execute(&self.pool)
		.await?;

		Ok(result.rows_affected() > 0)
	}

	/// Role of the user's live membership, if any.
	///
	/// # Errors
	/// Returns `DbError::Internal` if the stored role is not a known role.
	#[tracing::instrument(skip(self), fields(org_id = %org_id, user_id = %user_id))]
	pub async fn get_role(&self, user_id: UserId, org_id: OrgId) -> Result<Option<Role>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT role FROM organization_memberships
			WHERE organization_id = ? AND user_id = ? AND deleted_at IS NULL
			"#,
		)
		.bind(org_id.to_string())
		.bind(user_id.to_string())
		.fetch_optional(&self.pool)
		.await?;

		row
			.map(|r| {
				let role: String = r.get("role");
				role
					.parse::<Role>()
					.map_err(|e| DbError::Internal(e.to_string()))
			})
			.transpose()
	}
}

#[async_trait]
impl RoleStore for MembershipRepository {
	async fn role_of(&self, user_id: UserId, org_id: OrgId) -> Result<Option<Role>, LookupError> {
		self
			.get_role(user_id, org_id)
			.await
			.map_err(|e| e.into_lookup("role_store"))
	}
}
