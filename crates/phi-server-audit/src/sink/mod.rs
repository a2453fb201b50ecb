// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Append-only audit destinations.
//!
//! The [`AuditSink`] contract has exactly one write operation. There is no way
//! to update or delete an event through it.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::event::AuditEvent;

#[cfg(feature = "sink-sqlite")]
pub mod sqlite;

#[cfg(feature = "sink-tracing")]
pub mod tracing;

/// Acknowledgement that a sink durably accepted an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditAck {
	pub event_id: Uuid,
}

#[async_trait]
pub trait AuditSink: Send + Sync {
	fn name(&self) -> &str;

	async fn append(&self, event: Arc<AuditEvent>) -> Result<AuditAck>;

	async fn health_check(&self) -> Result<()> {
		Ok(())
	}
}
