// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Append-only audit trail of PHI access.
//!
//! Every completed request on a PHI route produces exactly one
//! [`AuditEvent`]. Routes are audited by default once they match an inclusion
//! prefix; an explicit exclusion list (health checks, static assets,
//! webhooks, admin panel) always wins.

pub mod classify;
pub mod error;
pub mod event;
pub mod recorder;
pub mod sink;

pub use classify::{ResourceDescriptor, RouteClass, RouteRules};
pub use error::{AuditError, AuditSinkError};
pub use event::{AuditAction, AuditEvent, AuditEventBuilder};
pub use recorder::{
	AuditHealth, AuditRecorder, DispatchReport, RecordOutcome, SinkHealth, SkipReason,
};
pub use sink::{AuditAck, AuditSink};

pub use phi_server_config::{AuditConfig, AuditSinkKind};

#[cfg(feature = "sink-sqlite")]
pub use sink::sqlite::SqliteAuditSink;

#[cfg(feature = "sink-tracing")]
pub use sink::tracing::TracingAuditSink;
