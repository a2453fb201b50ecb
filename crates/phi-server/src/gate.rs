// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Request-boundary access checks.
//!
//! Handlers call [`AccessGate::require`] before touching a single resource and
//! [`AccessGate::scoped`] before running a list query. Both collapse every
//! denial into [`AccessError::Forbidden`]; the reason stays in the logs.

use std::future::Future;

use phi_server_auth::{
	AccessError, Action, AuthorizationResolver, Decision, IdentityContext, OrgId, PatientScope,
	ResourceRef, ScopeFilter,
};
use tracing::{debug, warn};

#[derive(Clone)]
pub struct AccessGate {
	resolver: AuthorizationResolver,
	scope: ScopeFilter,
}

impl AccessGate {
	pub fn new(resolver: AuthorizationResolver, scope: ScopeFilter) -> Self {
		Self { resolver, scope }
	}

	/// Allow or `Forbidden`. The allow carries the matched rule for callers
	/// that log it.
	pub async fn require(
		&self,
		ctx: &IdentityContext,
		action: Action,
		resource: &ResourceRef,
	) -> Result<Decision, AccessError> {
		self.resolver.authorize(ctx, action, resource).await.into_result()
	}

	/// Resolve the actor's patient scope in `org_id` and run `query` with it.
	///
	/// An empty scope returns no rows without calling `query`. A scope lookup
	/// failure is a denial.
	pub async fn scoped<T, E, F, Fut>(
		&self,
		ctx: &IdentityContext,
		org_id: OrgId,
		query: F,
	) -> Result<Vec<T>, E>
	where
		E: From<AccessError>,
		F: FnOnce(PatientScope) -> Fut,
		Fut: Future<Output = Result<Vec<T>, E>>,
	{
		let scope = match self.scope.accessible_patient_ids(ctx, org_id).await {
			Ok(scope) => scope,
			Err(e) => {
				warn!(user_id = %ctx.user_id(), org_id = %org_id, error = %e, "scope lookup failed, denying");
				return Err(AccessError::Forbidden.into());
			}
		};

		if scope.is_empty() {
			debug!(user_id = %ctx.user_id(), org_id = %org_id, "empty patient scope, skipping query");
			return Ok(Vec::new());
		}

		query(scope).await
	}
}
