// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Patient scoping for list queries.
//!
//! Where the resolver gates a single resource, [`ScopeFilter`] answers "which
//! patients may this actor see at all" so list endpoints can filter before
//! paginating. Clinical roles get [`PatientScope::All`] rather than a
//! materialized id set.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::error::LookupError;
use crate::identity::IdentityContext;
use crate::permission::Permission;
use crate::store::{DelegationStore, PatientLinkStore, RoleStore};
use crate::types::{OrgId, PatientId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatientScope {
	/// Every patient in the organization.
	All,
	/// Exactly these patients. May be empty.
	Only(BTreeSet<PatientId>),
}

impl PatientScope {
	pub fn none() -> Self {
		PatientScope::Only(BTreeSet::new())
	}

	/// An empty scope must short-circuit to "no results" without querying.
	pub fn is_empty(&self) -> bool {
		matches!(self, PatientScope::Only(ids) if ids.is_empty())
	}

	pub fn contains(&self, patient_id: &PatientId) -> bool {
		match self {
			PatientScope::All => true,
			PatientScope::Only(ids) => ids.contains(patient_id),
		}
	}

	/// The explicit id set, or `None` for [`PatientScope::All`].
	pub fn ids(&self) -> Option<&BTreeSet<PatientId>> {
		match self {
			PatientScope::All => None,
			PatientScope::Only(ids) => Some(ids),
		}
	}
}

#[derive(Clone)]
pub struct ScopeFilter {
	roles: Arc<dyn RoleStore>,
	delegations: Arc<dyn DelegationStore>,
	patients: Arc<dyn PatientLinkStore>,
}

impl ScopeFilter {
	pub fn new(
		roles: Arc<dyn RoleStore>,
		delegations: Arc<dyn DelegationStore>,
		patients: Arc<dyn PatientLinkStore>,
	) -> Self {
		Self {
			roles,
			delegations,
			patients,
		}
	}

	/// Patients in `org_id` the request's actor may see.
	///
	/// The actor's own patient record, plus every patient who has delegated
	/// at least `view_profile` to the actor through an active grant.
	#[instrument(level = "debug", skip(self, ctx), fields(user_id = %ctx.user_id(), org_id = %org_id))]
	pub async fn accessible_patient_ids(
		&self,
		ctx: &IdentityContext,
		org_id: OrgId,
	) -> Result<PatientScope, LookupError> {
		let actor = ctx.user_id();

		if let Some(role) = self.roles.role_of(actor, org_id).await? {
			if role.sees_all_org_phi() {
				debug!(role = %role, "scope covers all patients");
				return Ok(PatientScope::All);
			}
		}

		let mut ids = BTreeSet::new();

		if let Some(own) = self.patients.patient_for_user(actor, org_id).await? {
			ids.insert(own);
		}

		ids.extend(
			self
				.delegations
				.active_delegations(actor, org_id)
				.await?
				.into_iter()
				.filter(|g| g.proxy_user_id == actor && g.permissions.contains(Permission::ViewProfile))
				.map(|g| g.patient_id),
		);

		debug!(patients = ids.len(), "scope resolved to explicit patient set");
		Ok(PatientScope::Only(ids))
	}
}
