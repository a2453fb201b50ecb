// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Schema bootstrap.
//!
//! Idempotent: every statement is `IF NOT EXISTS`. `audit_events` carries
//! triggers that abort any UPDATE or DELETE, independent of application code.

use sqlx::sqlite::SqlitePool;

use crate::error::DbError;

const STATEMENTS: &[&str] = &[
	r#"
	CREATE TABLE IF NOT EXISTS organization_memberships (
		id TEXT PRIMARY KEY NOT NULL,
		organization_id TEXT NOT NULL,
		user_id TEXT NOT NULL,
		role TEXT NOT NULL CHECK (role IN ('staff', 'admin', 'provider', 'patient', 'proxy')),
		created_at TEXT NOT NULL,
		deleted_at TEXT
	)
	"#,
	r#"
	CREATE UNIQUE INDEX IF NOT EXISTS idx_memberships_live
		ON organization_memberships (organization_id, user_id)
		WHERE deleted_at IS NULL
	"#,
	r#"
	CREATE TABLE IF NOT EXISTS patients (
		id TEXT PRIMARY KEY NOT NULL,
		organization_id TEXT NOT NULL,
		user_id TEXT,
		created_at TEXT NOT NULL,
		deleted_at TEXT
	)
	"#,
	r#"
	CREATE INDEX IF NOT EXISTS idx_patients_org_user
		ON patients (organization_id, user_id)
	"#,
	r#"
	CREATE TABLE IF NOT EXISTS patient_proxy_assignments (
		id TEXT PRIMARY KEY NOT NULL,
		proxy_user_id TEXT NOT NULL,
		patient_id TEXT NOT NULL REFERENCES patients(id),
		relationship TEXT NOT NULL,
		can_view_profile INTEGER NOT NULL DEFAULT 0,
		can_view_appointments INTEGER NOT NULL DEFAULT 0,
		can_schedule_appointments INTEGER NOT NULL DEFAULT 0,
		can_view_clinical_notes INTEGER NOT NULL DEFAULT 0,
		can_view_billing INTEGER NOT NULL DEFAULT 0,
		can_message_providers INTEGER NOT NULL DEFAULT 0,
		granted_at TEXT NOT NULL,
		expires_at TEXT,
		revoked_at TEXT,
		updated_at TEXT NOT NULL
	)
	"#,
	r#"
	CREATE INDEX IF NOT EXISTS idx_proxy_assignments_pair
		ON patient_proxy_assignments (proxy_user_id, patient_id, revoked_at, expires_at)
	"#,
	r#"
	CREATE TABLE IF NOT EXISTS audit_events (
		id TEXT PRIMARY KEY NOT NULL,
		actor_user_id TEXT,
		organization_id TEXT,
		resource_type TEXT NOT NULL,
		resource_id TEXT,
		action_type TEXT NOT NULL CHECK (action_type IN ('READ', 'CREATE', 'UPDATE', 'DELETE')),
		ip_address TEXT,
		user_agent TEXT,
		impersonator_id TEXT,
		request_id TEXT,
		changes TEXT,
		occurred_at TEXT NOT NULL
	)
	"#,
	r#"
	CREATE INDEX IF NOT EXISTS idx_audit_events_org_time
		ON audit_events (organization_id, occurred_at)
	"#,
	r#"
	CREATE INDEX IF NOT EXISTS idx_audit_events_actor_time
		ON audit_events (actor_user_id, occurred_at)
	"#,
	r#"
	CREATE INDEX IF NOT EXISTS idx_audit_events_resource
		ON audit_events (resource_type, resource_id)
	"#,
	r#"
	CREATE TRIGGER IF NOT EXISTS audit_events_no_update
	BEFORE UPDATE ON audit_events
	BEGIN
		SELECT RAISE(ABORT, 'audit_events is append-only');
	END
	"#,
	r#"
	CREATE TRIGGER IF NOT EXISTS audit_events_no_delete
	BEFORE DELETE ON audit_events
	BEGIN
		SELECT RAISE(ABORT, 'audit_events is append-only');
	END
	"#,
];

/// Create tables, indexes and triggers if they do not exist yet.
#[tracing::instrument(skip(pool))]
pub async fn ensure_schema(pool: &SqlitePool) -> Result<(), DbError> {
	for statement in STATEMENTS {
		sqlx::query(statement).execute(pool).await?;
	}
	tracing::debug!(statements = STATEMENTS.len(), "schema ensured");
	Ok(())
}
