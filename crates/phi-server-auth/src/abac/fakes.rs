// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-memory stores for unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use super::{AuthorizationResolver, ScopeFilter};
use crate::error::LookupError;
use crate::store::{DelegationGrant, DelegationStore, PatientLinkStore, RoleStore};
use crate::types::{OrgId, PatientId, Role, UserId};

#[derive(Default)]
struct State {
	roles: HashMap<(UserId, OrgId), Role>,
	grants: Vec<DelegationGrant>,
	patient_orgs: HashMap<PatientId, OrgId>,
	links: HashMap<(UserId, OrgId), PatientId>,
}

#[derive(Clone, Default)]
pub struct MemoryStores {
	state: Arc<Mutex<State>>,
}

impl MemoryStores {
	pub fn set_role(&self, user_id: UserId, org_id: OrgId, role: Role) {
		self.state.lock().unwrap().roles.insert((user_id, org_id), role);
	}

	pub fn enroll(&self, patient_id: PatientId, org_id: OrgId) {
		self.state.lock().unwrap().patient_orgs.insert(patient_id, org_id);
	}

	pub fn link(&self, user_id: UserId, org_id: OrgId, patient_id: PatientId) {
		self.enroll(patient_id, org_id);
		self.state.lock().unwrap().links.insert((user_id, org_id), patient_id);
	}

	pub fn add_grant(&self, grant: DelegationGrant) {
		self.state.lock().unwrap().grants.push(grant);
	}

	pub fn resolver(&self) -> AuthorizationResolver {
		AuthorizationResolver::new(
			Arc::new(self.clone()),
			Arc::new(self.clone()),
			Arc::new(self.clone()),
		)
	}

	pub fn scope_filter(&self) -> ScopeFilter {
		ScopeFilter::new(
			Arc::new(self.clone()),
			Arc::new(self.clone()),
			Arc::new(self.clone()),
		)
	}
}

#[async_trait]
impl RoleStore for MemoryStores {
	async fn role_of(&self, user_id: UserId, org_id: OrgId) -> Result<Option<Role>, LookupError> {
		Ok(self.state.lock().unwrap().roles.get(&(user_id, org_id)).copied())
	}
}

#[async_trait]
impl DelegationStore for MemoryStores {
	async fn active_delegation(
		&self,
		proxy_user_id: UserId,
		patient_id: PatientId,
	) -> Result<Option<DelegationGrant>, LookupError> {
		let now = Utc::now();
		Ok(self
			.state
			.lock()
			.unwrap()
			.grants
			.iter()
			.find(|g| {
				g.proxy_user_id == proxy_user_id && g.patient_id == patient_id && g.is_active_at(now)
			})
			.cloned())
	}

	async fn active_delegations(
		&self,
		proxy_user_id: UserId,
		org_id: OrgId,
	) -> Result<Vec<DelegationGrant>, LookupError> {
		let now = Utc::now();
		let state = self.state.lock().unwrap();
		Ok(state
			.grants
			.iter()
			.filter(|g| {
				g.proxy_user_id == proxy_user_id
					&& g.is_active_at(now)
					&& state.patient_orgs.get(&g.patient_id) == Some(&org_id)
			})
			.cloned()
			.collect())
	}
}

#[async_trait]
impl PatientLinkStore for MemoryStores {
	async fn patient_for_user(
		&self,
		user_id: UserId,
		org_id: OrgId,
	) -> Result<Option<PatientId>, LookupError> {
		Ok(self.state.lock().unwrap().links.get(&(user_id, org_id)).copied())
	}

	async fn organization_of(&self, patient_id: PatientId) -> Result<Option<OrgId>, LookupError> {
		Ok(self.state.lock().unwrap().patient_orgs.get(&patient_id).copied())
	}
}

/// Stores whose backing storage is always unavailable.
#[derive(Clone, Copy, Default)]
pub struct FailingStores;

impl FailingStores {
	pub fn resolver() -> AuthorizationResolver {
		AuthorizationResolver::new(
			Arc::new(FailingStores),
			Arc::new(FailingStores),
			Arc::new(FailingStores),
		)
	}
}

#[async_trait]
impl RoleStore for FailingStores {
	async fn role_of(&self, _: UserId, _: OrgId) -> Result<Option<Role>, LookupError> {
		Err(LookupError::new("role_store", "connection refused"))
	}
}

#[async_trait]
impl DelegationStore for FailingStores {
	async fn active_delegation(
		&self,
		_: UserId,
		_: PatientId,
	) -> Result<Option<DelegationGrant>, LookupError> {
		Err(LookupError::new("delegation_store", "connection refused"))
	}

	async fn active_delegations(
		&self,
		_: UserId,
		_: OrgId,
	) -> Result<Vec<DelegationGrant>, LookupError> {
		Err(LookupError::new("delegation_store", "connection refused"))
	}
}

#[async_trait]
impl PatientLinkStore for FailingStores {
	async fn patient_for_user(&self, _: UserId, _: OrgId) -> Result<Option<PatientId>, LookupError> {
		Err(LookupError::new("patient_link_store", "connection refused"))
	}

	async fn organization_of(&self, _: PatientId) -> Result<Option<OrgId>, LookupError> {
		Err(LookupError::new("patient_link_store", "connection refused"))
	}
}
