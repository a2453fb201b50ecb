// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! PHI access decision engine.
//!
//! [`decide`] is the pure combinator. Evaluation is ordered and the first
//! matching rule wins:
//!
//! 0. **Enrollment**: a patient-scoped resource whose patient is not enrolled
//!    in the named organization is denied outright
//! 1. **Org role**: `staff`, `admin` or `provider` in the resource's organization
//! 2. **Self-access**: the actor's own patient record in that organization
//! 3. **Delegation**: an active grant whose permissions include the action's bit
//! 4. Otherwise deny
//!
//! [`AuthorizationResolver`] loads the [`AccessFacts`] [`decide`] needs from
//! the stores. Nothing about ownership or enrollment is taken from the caller.
//! Expiry and revocation are filtered by the [`DelegationStore`]; any grant
//! handed to [`decide`] is taken to be active.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use super::types::{Action, AllowRule, Decision, DenyReason, ResourceRef};
use crate::error::LookupError;
use crate::identity::IdentityContext;
use crate::store::{DelegationGrant, DelegationStore, PatientLinkStore, RoleStore};
use crate::types::{OrgId, PatientId, Role, UserId};

/// Stored facts about one actor and one resource.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessFacts {
	/// Organization the resource's patient is enrolled in.
	pub patient_org: Option<OrgId>,
	/// The actor's role in `resource.org_id`.
	pub role: Option<Role>,
	/// The actor's own patient record in `resource.org_id`.
	pub own_patient: Option<PatientId>,
	/// Active delegation from the resource's patient to the actor.
	pub grant: Option<DelegationGrant>,
}

/// Evaluates whether `actor` may perform `action` on `resource`.
pub fn decide(actor: UserId, action: Action, resource: &ResourceRef, facts: &AccessFacts) -> Decision {
	if resource.patient_id.is_some() && facts.patient_org != Some(resource.org_id) {
		return Decision::deny(DenyReason::PatientNotInOrg);
	}

	if let Some(role) = facts.role.filter(Role::sees_all_org_phi) {
		return Decision::allow(AllowRule::OrgRole { role });
	}

	let Some(patient_id) = resource.patient_id else {
		return Decision::deny(DenyReason::NoRole);
	};

	if facts.own_patient == Some(patient_id) {
		return Decision::allow(AllowRule::SelfAccess);
	}

	match &facts.grant {
		Some(g) if g.proxy_user_id == actor && g.patient_id == patient_id => {
			let permission = action.required_permission();
			if g.permissions.contains(permission) {
				Decision::allow(AllowRule::Delegation { grant_id: g.id })
			} else {
				Decision::deny(DenyReason::MissingPermission { permission })
			}
		}
		_ => Decision::deny(DenyReason::NoActiveGrant),
	}
}

/// Returns true when the org-role and self-access rules did not match and a
/// delegation lookup is needed to finish the decision.
pub fn requires_delegation(facts: &AccessFacts, resource: &ResourceRef) -> bool {
	!facts.role.is_some_and(|r| r.sees_all_org_phi())
		&& resource.patient_id.is_some()
		&& facts.own_patient != resource.patient_id
}

/// Resolves access decisions against live role, enrollment and delegation
/// storage.
#[derive(Clone)]
pub struct AuthorizationResolver {
	roles: Arc<dyn RoleStore>,
	delegations: Arc<dyn DelegationStore>,
	patients: Arc<dyn PatientLinkStore>,
}

impl AuthorizationResolver {
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

	/// Decides whether the request's actor may perform `action` on `resource`.
	///
	/// Store failures produce `Deny(LookupFailed)`, never an allow.
	#[instrument(
		level = "debug",
		skip(self, ctx, resource),
		fields(
			user_id = %ctx.user_id(),
			org_id = %resource.org_id,
			action = ?action,
			resource_kind = ?resource.kind,
		)
	)]
	pub async fn authorize(
		&self,
		ctx: &IdentityContext,
		action: Action,
		resource: &ResourceRef,
	) -> Decision {
		let actor = ctx.user_id();

		let decision = match self.load_facts(actor, resource).await {
			Ok(facts) => decide(actor, action, resource, &facts),
			Err(e) => {
				warn!(store = e.store, error = %e, "authorization lookup failed, denying");
				Decision::deny(DenyReason::LookupFailed)
			}
		};
		self.log_decision(ctx, action, decision)
	}

	/// Loads facts in rule order, stopping once the outcome is settled.
	async fn load_facts(
		&self,
		actor: UserId,
		resource: &ResourceRef,
	) -> Result<AccessFacts, LookupError> {
		let mut facts = AccessFacts::default();

		if let Some(patient_id) = resource.patient_id {
			facts.patient_org = self.patients.organization_of(patient_id).await?;
			if facts.patient_org != Some(resource.org_id) {
				return Ok(facts);
			}
		}

		facts.role = self.roles.role_of(actor, resource.org_id).await?;

		let Some(patient_id) = resource.patient_id else {
			return Ok(facts);
		};
		if facts.role.is_some_and(|r| r.sees_all_org_phi()) {
			return Ok(facts);
		}

		facts.own_patient = self.patients.patient_for_user(actor, resource.org_id).await?;
		if requires_delegation(&facts, resource) {
			facts.grant = self.delegations.active_delegation(actor, patient_id).await?;
		}

		Ok(facts)
	}

	fn log_decision(&self, ctx: &IdentityContext, action: Action, decision: Decision) -> Decision {
		match &decision {
			Decision::Allow { rule } => {
				debug!(user_id = %ctx.user_id(), action = ?action, rule = ?rule, "PHI access allowed");
			}
			Decision::Deny { reason } => {
				info!(
					user_id = %ctx.user_id(),
					request_id = ctx.request_id().unwrap_or_default(),
					action = ?action,
					reason = %reason,
					"PHI access denied"
				);
			}
		}
		decision
	}
}
