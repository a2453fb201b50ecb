// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::AuditSinkError;
use crate::event::AuditEvent;
use crate::sink::{AuditAck, AuditSink};

/// Emits each event as a structured log line on the `phi_audit` target.
///
/// Change summaries are not logged, only whether one was present.
pub struct TracingAuditSink {
	name: String,
}

impl TracingAuditSink {
	pub fn new() -> Self {
		Self {
			name: "tracing".to_string(),
		}
	}
}

impl Default for TracingAuditSink {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl AuditSink for TracingAuditSink {
	fn name(&self) -> &str {
		&self.name
	}

	async fn append(&self, event: Arc<AuditEvent>) -> Result<AuditAck, AuditSinkError> {
		tracing::info!(
			target: "phi_audit",
			event_id = %event.id,
			action = %event.action_type,
			resource_type = %event.resource_type,
			resource_id = ?event.resource_id,
			actor_user_id = ?event.actor_user_id,
			organization_id = ?event.organization_id,
			impersonator_id = ?event.impersonator_id,
			ip_address = ?event.ip_address,
			request_id = ?event.request_id,
			has_changes = event.changes.is_some(),
			occurred_at = %event.occurred_at.to_rfc3339(),
			"phi access"
		);
		Ok(AuditAck { event_id: event.id })
	}
}
