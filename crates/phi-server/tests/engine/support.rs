// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use phi_server::PhiEngine;
use phi_server_audit::{AuditAck, AuditEvent, AuditSink, AuditSinkError, SqliteAuditSink};
use phi_server_auth::{
	DelegationGrant, IdentityContext, OrgId, PermissionSet, RequestMeta, ResourceKind, ResourceRef,
	Role, UserId, VerifiedIdentity,
};
use phi_server_config::ServerConfig;
use phi_server_db::{create_pool, ensure_schema, AuditPage, AuditQuery, NewGrant, PatientRecord};
use tempfile::TempDir;
use uuid::Uuid;

/// Organization O with patient P (linked to `patient_user`), provider R and
/// proxy X, backed by a temporary database file.
pub struct World {
	pub engine: PhiEngine,
	pub org: OrgId,
	pub patient: PatientRecord,
	pub patient_user: UserId,
	pub provider: UserId,
	pub proxy: UserId,
	_dir: TempDir,
}

impl World {
	pub async fn new() -> Self {
		Self::build(ServerConfig::default(), Vec::new()).await
	}

	/// SQLite sink first, then `extra`.
	pub async fn build(config: ServerConfig, extra: Vec<Arc<dyn AuditSink>>) -> Self {
		let dir = tempfile::tempdir().unwrap();
		let url = format!("sqlite:{}", dir.path().join("phi.db").display());
		let pool = create_pool(&url, 4).await.unwrap();
		ensure_schema(&pool).await.unwrap();

		let mut sinks: Vec<Arc<dyn AuditSink>> = vec![Arc::new(SqliteAuditSink::new(pool.clone()))];
		sinks.extend(extra);
		let engine = PhiEngine::with_sinks(pool, config, sinks);

		let org = OrgId::generate();
		let patient_user = UserId::generate();
		let provider = UserId::generate();
		let proxy = UserId::generate();

		engine
			.memberships
			.add_member(org, provider, Role::Provider)
			.await
			.unwrap();
		engine
			.memberships
			.add_member(org, patient_user, Role::Patient)
			.await
			.unwrap();
		engine
			.memberships
			.add_member(org, proxy, Role::Proxy)
			.await
			.unwrap();
		let patient = engine
			.patients
			.create_patient(org, Some(patient_user))
			.await
			.unwrap();

		Self {
			engine,
			org,
			patient,
			patient_user,
			provider,
			proxy,
			_dir: dir,
		}
	}

	pub fn ctx(&self, user: UserId) -> IdentityContext {
		ctx_in(user, self.org)
	}

	pub fn patient_resource(&self, kind: ResourceKind) -> ResourceRef {
		self.patient.resource(kind)
	}

	pub async fn grant(&self, proxy: UserId, patient: &PatientRecord, permissions: PermissionSet) -> DelegationGrant {
		self.grant_until(proxy, patient, permissions, None).await
	}

	pub async fn grant_until(
		&self,
		proxy: UserId,
		patient: &PatientRecord,
		permissions: PermissionSet,
		expires_at: Option<DateTime<Utc>>,
	) -> DelegationGrant {
		self
			.engine
			.delegations
			.create_grant(NewGrant {
				proxy_user_id: proxy,
				patient_id: patient.id,
				relationship: "parent".to_string(),
				permissions,
				expires_at,
			})
			.await
			.unwrap()
	}

	/// Poll the audit table until `expected` rows match, or give up.
	pub async fn wait_for_events(&self, query: &AuditQuery, expected: i64) -> AuditPage {
		for _ in 0..100 {
			let page = self.engine.audit_log.query_events(query).await.unwrap();
			if page.total >= expected {
				return page;
			}
			tokio::time::sleep(Duration::from_millis(10)).await;
		}
		self.engine.audit_log.query_events(query).await.unwrap()
	}
}

pub fn ctx_in(user: UserId, org: OrgId) -> IdentityContext {
	IdentityContext::new(
		VerifiedIdentity::new(user).in_org(org),
		RequestMeta {
			request_id: Some(format!("req-{}", Uuid::new_v4())),
			client_ip: Some(IpAddr::V4(Ipv4Addr::new(10, 1, 2, 3))),
			user_agent: Some("phi-tests/1.0".to_string()),
		},
	)
}

/// A sink whose store is down.
#[derive(Default)]
pub struct BrokenSink {
	pub calls: AtomicUsize,
}

impl BrokenSink {
	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl AuditSink for BrokenSink {
	fn name(&self) -> &str {
		"broken"
	}

	async fn append(&self, _event: Arc<AuditEvent>) -> Result<AuditAck, AuditSinkError> {
		self.calls.fetch_add(1, Ordering::SeqCst);
		Err(AuditSinkError::Transient("store offline".to_string()))
	}
}
