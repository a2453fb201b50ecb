// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Tenant context binding for connection-level row filtering.
//!
//! SQLite has no row-level security, so the policy is restated as a temp view
//! over a connection-local `tenant_context` table. A [`TenantSession`] owns one
//! pooled connection for its lifetime; the context it sets is visible only to
//! queries issued through that connection.
//!
//! The view answers the same question as `ScopeFilter`: clinical roles see
//! every live patient in the bound organization, a patient sees their own
//! record, and a proxy sees patients who delegated `view_profile` through an
//! active grant. With no context row the view is empty.
//!
//! The context row is wiped on acquire and on release, so a connection handed
//! back to the pool never carries a previous request's identity.

use phi_server_auth::{IdentityContext, OrgId, PatientId, UserId};
use sqlx::{pool::PoolConnection, sqlite::SqlitePool, Row, Sqlite};

use crate::error::DbError;
use crate::patient::parse_id;
use crate::time::SQL_NOW;

const CREATE_CONTEXT_TABLE: &str = r#"
	CREATE TEMP TABLE IF NOT EXISTS tenant_context (
		singleton INTEGER PRIMARY KEY CHECK (singleton = 1),
		user_id TEXT NOT NULL,
		organization_id TEXT NOT NULL
	)
"#;

fn create_visibility_view() -> String {
	format!(
		r#"
		CREATE TEMP VIEW IF NOT EXISTS tenant_visible_patients AS
		SELECT p.id, p.organization_id, p.user_id
		FROM patients p
		JOIN tenant_context c ON p.organization_id = c.organization_id
		WHERE p.deleted_at IS NULL
		  AND (
			EXISTS (
				SELECT 1 FROM organization_memberships m
				WHERE m.organization_id = c.organization_id
				  AND m.user_id = c.user_id
				  AND m.deleted_at IS NULL
				  AND m.role IN ('staff', 'admin', 'provider')
			)
			OR p.user_id = c.user_id
			OR EXISTS (
				SELECT 1 FROM patient_proxy_assignments a
				WHERE a.patient_id = p.id
				  AND a.proxy_user_id = c.user_id
				  AND a.can_view_profile = 1
				  AND a.revoked_at IS NULL
				  AND (a.expires_at IS NULL OR a.expires_at > {SQL_NOW})
			)
		  )
		"#
	)
}

/// A pooled connection with an optional bound `(user, organization)`.
pub struct TenantSession {
	conn: PoolConnection<Sqlite>,
	bound: Option<(UserId, OrgId)>,
}

impl TenantSession {
	/// Acquire a connection with no tenant context.
	#[tracing::instrument(skip(pool))]
	pub async fn acquire(pool: &SqlitePool) -> Result<Self, DbError> {
		let mut conn = pool.acquire().await?;
		sqlx::query(CREATE_CONTEXT_TABLE).execute(&mut *conn).await?;
		sqlx::query(&create_visibility_view())
			.execute(&mut *conn)
			.await?;
		sqlx::query("DELETE FROM tenant_context")
			.execute(&mut *conn)
			.await?;

		Ok(Self { conn, bound: None })
	}

	/// Acquire a connection bound to the request's user and organization.
	///
	/// A context without an organization leaves the session unbound.
	#[tracing::instrument(skip(pool, ctx), fields(user_id = %ctx.user_id()))]
	pub async fn bind(pool: &SqlitePool, ctx: &IdentityContext) -> Result<Self, DbError> {
		let mut session = Self::acquire(pool).await?;
		match ctx.org_id() {
			Some(org_id) => session.set_context(ctx.user_id(), org_id).await?,
			None => tracing::debug!("no organization on identity, tenant session left unbound"),
		}
		Ok(session)
	}

	pub fn bound(&self) -> Option<(UserId, OrgId)> {
		self.bound
	}

	#[tracing::instrument(skip(self), fields(user_id = %user_id, org_id = %org_id))]
	pub async fn set_context(&mut self, user_id: UserId, org_id: OrgId) -> Result<(), DbError> {
		sqlx::query(
			r#"
			INSERT INTO tenant_context (singleton, user_id, organization_id)
			VALUES (1, ?, ?)
			ON CONFLICT (singleton) DO UPDATE SET
				user_id = excluded.user_id,
				organization_id = excluded.organization_id
			"#,
		)
		.bind(user_id.to_string())
		.bind(org_id.to_string())
		.execute(&mut *self.conn)
		.await?;

		self.bound = Some((user_id, org_id));
		Ok(())
	}

	pub async fn clear(&mut self) -> Result<(), DbError> {
		sqlx::query("DELETE FROM tenant_context")
			.execute(&mut *self.conn)
			.await?;
		self.bound = None;
		Ok(())
	}

	/// Patients visible under the bound context, ordered by id.
	pub async fn visible_patients(&mut self) -> Result<Vec<PatientId>, DbError> {
		let rows = sqlx::query("SELECT id FROM tenant_visible_patients ORDER BY id")
			.fetch_all(&mut *self.conn)
			.await?;

		rows
			.iter()
			.map(|r| parse_id(&r.get::<String, _>("id"), "patient id"))
			.collect()
	}

	pub async fn can_view_patient(&mut self, patient_id: PatientId) -> Result<bool, DbError> {
		let row = sqlx::query("SELECT 1 FROM tenant_visible_patients WHERE id = ?")
			.bind(patient_id.to_string())
			.fetch_optional(&mut *self.conn)
			.await?;
		Ok(row.is_some())
	}

	/// Clear the context and hand the connection back to the pool.
	pub async fn release(mut self) -> Result<(), DbError> {
		self.clear().await
	}
}
