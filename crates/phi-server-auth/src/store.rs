// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Read-only lookup contracts backing authorization.
//!
//! Implementations must apply the "active" predicate for delegation grants at
//! query time, so a revocation that has committed is visible to the very next
//! lookup. Nothing here is cached across requests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::LookupError;
use crate::permission::PermissionSet;
use crate::types::{GrantId, OrgId, PatientId, Role, UserId};

/// A delegation (proxy) grant letting one user act for a patient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationGrant {
	pub id: GrantId,
	pub proxy_user_id: UserId,
	pub patient_id: PatientId,
	/// Free-form relationship label, e.g. "parent" or "spouse".
	pub relationship: String,
	pub permissions: PermissionSet,
	pub granted_at: DateTime<Utc>,
	pub expires_at: Option<DateTime<Utc>>,
	pub revoked_at: Option<DateTime<Utc>>,
}

impl DelegationGrant {
	/// `revoked_at IS NULL AND (expires_at IS NULL OR expires_at > now)`.
	pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
		self.revoked_at.is_none() && self.expires_at.map(|e| e > now).unwrap_or(true)
	}
}

#[async_trait]
pub trait RoleStore: Send + Sync {
	/// Role of `user_id` in `org_id`; `None` when there is no live membership row.
	async fn role_of(&self, user_id: UserId, org_id: OrgId) -> Result<Option<Role>, LookupError>;
}

#[async_trait]
pub trait DelegationStore: Send + Sync {
	/// The active grant from `patient_id` to `proxy_user_id`, if any.
	async fn active_delegation(
		&self,
		proxy_user_id: UserId,
		patient_id: PatientId,
	) -> Result<Option<DelegationGrant>, LookupError>;

	/// All active grants held by `proxy_user_id` for patients enrolled in `org_id`.
	async fn active_delegations(
		&self,
		proxy_user_id: UserId,
		org_id: OrgId,
	) -> Result<Vec<DelegationGrant>, LookupError>;
}

#[async_trait]
pub trait PatientLinkStore: Send + Sync {
	/// The patient record in `org_id` linked to `user_id`, if the user is a patient there.
	async fn patient_for_user(
		&self,
		user_id: UserId,
		org_id: OrgId,
	) -> Result<Option<PatientId>, LookupError>;

	/// The organization `patient_id` is enrolled in; `None` for unknown or
	/// removed patients.
	async fn organization_of(&self, patient_id: PatientId) -> Result<Option<OrgId>, LookupError>;
}
