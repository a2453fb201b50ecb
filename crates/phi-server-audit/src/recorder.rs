// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Per-request audit recording.
//!
//! [`AuditRecorder::maybe_record`] is called once per completed request. It
//! classifies the route, builds at most one [`AuditEvent`] and hands it to
//! every sink on a background task, so the response is never held up by the
//! audit store. Each append is bounded by its own timeout.
//!
//! Sink failures never reach the caller. They are logged, counted per sink,
//! and escalated to an alert-level event once a sink keeps failing. A broken
//! sink stays in rotation and is retried on every event.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use http::{Method, StatusCode};
use tracing::{debug, error, instrument, warn};

use phi_server_auth::IdentityContext;
use phi_server_config::AuditConfig;

use crate::classify::{RouteClass, RouteRules};
use crate::error::{AuditError, AuditSinkError};
use crate::event::{AuditAction, AuditEvent};
use crate::sink::AuditSink;

/// Why a request produced no audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
	ExcludedRoute,
	UnmatchedRoute,
	ErrorStatus,
	UnauditedMethod,
}

#[derive(Debug)]
pub enum RecordOutcome {
	Skipped(SkipReason),
	/// Handed to a background task.
	Dispatched,
	/// Appended inline; see [`AuditRecorder::record`].
	Recorded(DispatchReport),
	/// Could not be dispatched. Counted as a failure and alerted on.
	Dropped,
}

impl RecordOutcome {
	pub fn is_skipped(&self) -> bool {
		matches!(self, RecordOutcome::Skipped(_))
	}
}

#[derive(Debug, Default)]
pub struct DispatchReport {
	pub delivered: usize,
	pub failures: Vec<AuditError>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkHealth {
	pub name: String,
	pub consecutive_failures: u64,
	pub alerting: bool,
}

/// Point-in-time counters for operational dashboards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditHealth {
	pub events_dispatched: u64,
	pub append_failures: u64,
	pub sinks: Vec<SinkHealth>,
}

impl AuditHealth {
	pub fn is_healthy(&self) -> bool {
		self.sinks.iter().all(|s| !s.alerting)
	}
}

struct SinkSlot {
	sink: Arc<dyn AuditSink>,
	consecutive_failures: AtomicU64,
}

struct Inner {
	rules: RouteRules,
	sinks: Vec<SinkSlot>,
	append_timeout: Duration,
	alert_after: u64,
	events_dispatched: AtomicU64,
	append_failures: AtomicU64,
}

#[derive(Clone)]
pub struct AuditRecorder {
	inner: Arc<Inner>,
}

impl AuditRecorder {
	pub fn new(
		rules: RouteRules,
		sinks: Vec<Arc<dyn AuditSink>>,
		append_timeout: Duration,
		alert_after: u64,
	) -> Self {
		let sinks = sinks
			.into_iter()
			.map(|sink| SinkSlot {
				sink,
				consecutive_failures: AtomicU64::new(0),
			})
			.collect();

		Self {
			inner: Arc::new(Inner {
				rules,
				sinks,
				append_timeout,
				alert_after: alert_after.max(1),
				events_dispatched: AtomicU64::new(0),
				append_failures: AtomicU64::new(0),
			}),
		}
	}

	pub fn from_config(config: &AuditConfig, sinks: Vec<Arc<dyn AuditSink>>) -> Self {
		Self::new(
			RouteRules::from_config(config),
			sinks,
			Duration::from_millis(config.append_timeout_ms),
			config.alert_after_failures,
		)
	}

	/// Builds the event for a completed request, or says why there is none.
	pub fn prepare(
		&self,
		ctx: &IdentityContext,
		method: &Method,
		path: &str,
		status: StatusCode,
		changes: Option<serde_json::Value>,
	) -> Result<AuditEvent, SkipReason> {
		let descriptor = match self.inner.rules.classify(path) {
			RouteClass::Excluded => return Err(SkipReason::ExcludedRoute),
			RouteClass::Unmatched => return Err(SkipReason::UnmatchedRoute),
			RouteClass::Audited(d) => d,
		};

		if status.as_u16() >= 400 {
			return Err(SkipReason::ErrorStatus);
		}

		let action = AuditAction::from_method(method).ok_or(SkipReason::UnauditedMethod)?;

		Ok(AuditEvent::builder(descriptor.resource_type, action)
			.context(ctx)
			.organization_fallback(descriptor.organization_id)
			.resource_id(descriptor.resource_id)
			.changes(changes)
			.build())
	}

	/// Records the request without waiting for the sinks.
	#[instrument(skip(self, ctx, changes), fields(user_id = %ctx.user_id(), status = status.as_u16()))]
	pub fn maybe_record(
		&self,
		ctx: &IdentityContext,
		method: &Method,
		path: &str,
		status: StatusCode,
		changes: Option<serde_json::Value>,
	) -> RecordOutcome {
		let event = match self.prepare(ctx, method, path, status, changes) {
			Ok(event) => event,
			Err(reason) => {
				debug!(?reason, "request not audited");
				return RecordOutcome::Skipped(reason);
			}
		};

		let inner = Arc::clone(&self.inner);
		match tokio::runtime::Handle::try_current() {
			Ok(handle) => {
				handle.spawn(async move {
					dispatch(&inner, Arc::new(event)).await;
				});
				RecordOutcome::Dispatched
			}
			Err(e) => {
				inner.append_failures.fetch_add(1, Ordering::Relaxed);
				error!(
					alert = true,
					event_id = %event.id,
					error = %e,
					"no async runtime available for audit dispatch"
				);
				RecordOutcome::Dropped
			}
		}
	}

	/// Records the request and waits for every sink to answer.
	pub async fn record(
		&self,
		ctx: &IdentityContext,
		method: &Method,
		path: &str,
		status: StatusCode,
		changes: Option<serde_json::Value>,
	) -> RecordOutcome {
		match self.prepare(ctx, method, path, status, changes) {
			Ok(event) => RecordOutcome::Recorded(dispatch(&self.inner, Arc::new(event)).await),
			Err(reason) => RecordOutcome::Skipped(reason),
		}
	}

	pub fn health(&self) -> AuditHealth {
		let inner = &self.inner;
		AuditHealth {
			events_dispatched: inner.events_dispatched.load(Ordering::Relaxed),
			append_failures: inner.append_failures.load(Ordering::Relaxed),
			sinks: inner
				.sinks
				.iter()
				.map(|slot| {
					let consecutive = slot.consecutive_failures.load(Ordering::Relaxed);
					SinkHealth {
						name: slot.sink.name().to_string(),
						consecutive_failures: consecutive,
						alerting: consecutive >= inner.alert_after,
					}
				})
				.collect(),
		}
	}

	pub fn sink_names(&self) -> Vec<String> {
		self
			.inner
			.sinks
			.iter()
			.map(|s| s.sink.name().to_string())
			.collect()
	}

	/// Probe every sink once. Unreachable sinks are logged and stay in rotation.
	pub async fn check_sinks(&self) -> Vec<(String, Result<(), AuditSinkError>)> {
		let checks = self.inner.sinks.iter().map(|slot| async move {
			let name = slot.sink.name().to_string();
			let result = slot.sink.health_check().await;
			if let Err(e) = &result {
				warn!(sink = %name, error = %e, "audit sink health check failed");
			}
			(name, result)
		});
		join_all(checks).await
	}
}

async fn dispatch(inner: &Inner, event: Arc<AuditEvent>) -> DispatchReport {
	inner.events_dispatched.fetch_add(1, Ordering::Relaxed);
	let timeout_ms = inner.append_timeout.as_millis() as u64;

	let appends = inner.sinks.iter().map(|slot| {
		let event = Arc::clone(&event);
		async move {
			let result = match tokio::time::timeout(inner.append_timeout, slot.sink.append(event)).await
			{
				Ok(result) => result,
				Err(_) => Err(AuditSinkError::Timeout(timeout_ms)),
			};
			(slot, result)
		}
	});

	let mut report = DispatchReport::default();
	for (slot, result) in join_all(appends).await {
		match result {
			Ok(_) => {
				slot.consecutive_failures.store(0, Ordering::Relaxed);
				report.delivered += 1;
			}
			Err(e) => {
				inner.append_failures.fetch_add(1, Ordering::Relaxed);
				let consecutive = slot.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
				warn!(
					sink = slot.sink.name(),
					event_id = %event.id,
					consecutive_failures = consecutive,
					error = %e,
					"audit sink append failed"
				);
				if consecutive % inner.alert_after == 0 {
					error!(
						alert = true,
						sink = slot.sink.name(),
						consecutive_failures = consecutive,
						"audit sink is failing repeatedly"
					);
				}
				report.failures.push(AuditError::SinkError {
					sink: slot.sink.name().to_string(),
					source: e,
				});
			}
		}
	}

	report
}
