// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Engine assembly.
//!
//! [`PhiEngine`] owns one SQLite pool and wires the repositories into the
//! resolver, the scope filter and the audit recorder. Everything it holds is
//! cheap to clone and safe to share across request tasks.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use http::{Method, StatusCode};
use phi_server_audit::{
	AuditRecorder, AuditSink, AuditSinkKind, RecordOutcome, SqliteAuditSink, TracingAuditSink,
};
use phi_server_auth::{
	Action, AuthorizationResolver, Decision, IdentityContext, ResourceRef, ScopeFilter,
};
use phi_server_config::{AuditConfig, ServerConfig};
use phi_server_db::{
	create_pool, ensure_schema, AuditRepository, DelegationRepository, MembershipRepository,
	PatientRepository, TenantSession,
};
use sqlx::sqlite::SqlitePool;
use tracing::info;

use crate::error::ServerError;
use crate::gate::AccessGate;
use crate::telemetry::init_tracing;

#[derive(Clone)]
pub struct PhiEngine {
	pub pool: SqlitePool,
	pub config: ServerConfig,
	pub memberships: Arc<MembershipRepository>,
	pub patients: Arc<PatientRepository>,
	pub delegations: Arc<DelegationRepository>,
	pub audit_log: Arc<AuditRepository>,
	pub gate: AccessGate,
	pub recorder: AuditRecorder,
}

impl PhiEngine {
	/// Open the configured database, bootstrap the schema, assemble and check
	/// the audit sinks.
	pub async fn from_config(config: ServerConfig) -> Result<Self, ServerError> {
		let pool = create_pool(&config.database.url, config.database.max_connections).await?;
		ensure_schema(&pool).await?;
		let engine = Self::new(pool, config);
		engine.recorder.check_sinks().await;
		Ok(engine)
	}

	/// Assemble over an existing pool with the sinks named in `config.audit.sinks`.
	pub fn new(pool: SqlitePool, config: ServerConfig) -> Self {
		let sinks = build_sinks(&config.audit, &pool);
		Self::with_sinks(pool, config, sinks)
	}

	pub fn with_sinks(pool: SqlitePool, config: ServerConfig, sinks: Vec<Arc<dyn AuditSink>>) -> Self {
		let memberships = Arc::new(MembershipRepository::new(pool.clone()));
		let patients = Arc::new(PatientRepository::new(pool.clone()));
		let delegations = Arc::new(DelegationRepository::new(pool.clone()));
		let audit_log = Arc::new(AuditRepository::new(pool.clone()));

		let resolver =
			AuthorizationResolver::new(memberships.clone(), delegations.clone(), patients.clone());
		let scope = ScopeFilter::new(memberships.clone(), delegations.clone(), patients.clone());
		let recorder = AuditRecorder::from_config(&config.audit, sinks);

		info!(sinks = ?recorder.sink_names(), "PHI engine assembled");

		Self {
			pool,
			config,
			memberships,
			patients,
			delegations,
			audit_log,
			gate: AccessGate::new(resolver, scope),
			recorder,
		}
	}

	/// Gate a single-resource access and hand back a connection already bound
	/// to the same `(user, organization)` the decision was made for.
	///
	/// The session is bound to the resource's organization, which the resolver
	/// has already checked the patient is enrolled in, so connection-level
	/// filtering checks the same tenant the decision was made for.
	pub async fn authorized_session(
		&self,
		ctx: &IdentityContext,
		action: Action,
		resource: &ResourceRef,
	) -> Result<(Decision, TenantSession), ServerError> {
		let decision = self.gate.require(ctx, action, resource).await?;
		let mut session = TenantSession::acquire(&self.pool).await?;
		session.set_context(ctx.user_id(), resource.org_id).await?;
		Ok((decision, session))
	}

	/// Record the completed request and return its status untouched.
	///
	/// Audit dispatch runs in the background; its outcome never changes what
	/// the caller sees.
	pub fn finish_request(
		&self,
		ctx: &IdentityContext,
		method: &Method,
		path: &str,
		status: StatusCode,
		changes: Option<serde_json::Value>,
	) -> StatusCode {
		let outcome = self.recorder.maybe_record(ctx, method, path, status, changes);
		if let RecordOutcome::Skipped(reason) = outcome {
			tracing::trace!(?reason, path, "request not audited");
		}
		status
	}
}

/// Build one sink per configured kind, in order.
pub fn build_sinks(config: &AuditConfig, pool: &SqlitePool) -> Vec<Arc<dyn AuditSink>> {
	config
		.sinks
		.iter()
		.map(|kind| -> Arc<dyn AuditSink> {
			match kind {
				AuditSinkKind::Sqlite => Arc::new(SqliteAuditSink::new(pool.clone())),
				AuditSinkKind::Tracing => Arc::new(TracingAuditSink::new()),
			}
		})
		.collect()
}

/// Load configuration, install tracing and open the engine.
pub async fn bootstrap(config_path: Option<PathBuf>) -> anyhow::Result<PhiEngine> {
	let config = match config_path {
		Some(path) => phi_server_config::load_config_from(path),
		None => phi_server_config::load_config(),
	}
	.context("failed to load configuration")?;

	init_tracing(&config.logging).context("failed to initialise tracing")?;

	info!(database = %config.database.url, "starting PHI engine");
	PhiEngine::from_config(config)
		.await
		.context("failed to open PHI engine")
}
