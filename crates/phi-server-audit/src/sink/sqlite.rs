// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use async_trait::async_trait;
use chrono::SecondsFormat;
use sqlx::SqlitePool;

use crate::error::AuditSinkError;
use crate::event::AuditEvent;
use crate::sink::{AuditAck, AuditSink};

/// Inserts events into the `audit_events` table. Insert-only.
pub struct SqliteAuditSink {
	pool: SqlitePool,
	name: String,
}

impl SqliteAuditSink {
	pub fn new(pool: SqlitePool) -> Self {
		Self {
			pool,
			name: "sqlite".to_string(),
		}
	}
}

#[async_trait]
impl AuditSink for SqliteAuditSink {
	fn name(&self) -> &str {
		&self.name
	}

	async fn append(&self, event: Arc<AuditEvent>) -> Result<AuditAck, AuditSinkError> {
		let changes_json = event
			.changes
			.as_ref()
			.map(serde_json::to_string)
			.transpose()
			.map_err(|e| AuditSinkError::Permanent(format!("failed to serialize changes: {e}")))?;

		sqlx::query(
			r#"
			INSERT INTO audit_events (
				id, actor_user_id, organization_id, resource_type, resource_id,
				action_type, ip_address, user_agent, impersonator_id, request_id,
				changes, occurred_at
			) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(event.id.to_string())
		.bind(event.actor_user_id.map(|u| u.to_string()))
		.bind(event.organization_id.map(|o| o.to_string()))
		.bind(&event.resource_type)
		.bind(event.resource_id.map(|r| r.to_string()))
		.bind(event.action_type.as_str())
		.bind(&event.ip_address)
		.bind(&event.user_agent)
		.bind(event.impersonator_id.map(|u| u.to_string()))
		.bind(&event.request_id)
		.bind(&changes_json)
		.bind(event.occurred_at.to_rfc3339_opts(SecondsFormat::Millis, true))
		.execute(&self.pool)
		.await
		.map_err(|e| {
			if is_transient_error(&e) {
				AuditSinkError::Transient(format!("database error: {e}"))
			} else {
				AuditSinkError::Permanent(format!("database error: {e}"))
			}
		})?;

		Ok(AuditAck { event_id: event.id })
	}

	async fn health_check(&self) -> Result<(), AuditSinkError> {
		sqlx::query("SELECT 1")
			.execute(&self.pool)
			.await
			.map_err(|e| AuditSinkError::Transient(format!("health check failed: {e}")))?;
		Ok(())
	}
}

fn is_transient_error(e: &sqlx::Error) -> bool {
	match e {
		sqlx::Error::Io(_) => true,
		sqlx::Error::PoolTimedOut => true,
		sqlx::Error::PoolClosed => true,
		sqlx::Error::Database(db_err) => {
			let msg = db_err.message().to_lowercase();
			msg.contains("busy") || msg.contains("locked") || msg.contains("timeout")
		}
		_ => false,
	}
}
