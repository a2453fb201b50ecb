// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authorization for Protected Health Information.
//!
//! This crate decides who may read or modify patient data inside an
//! organization. Decisions combine three sources of authority, in order:
//!
//! 1. Clinical staff roles (`staff`, `admin`, `provider`) in the resource's organization
//! 2. Self-access by the patient's own linked user
//! 3. An active, time-bounded delegation ("proxy") grant carrying the required permission
//!
//! Storage is abstracted behind [`RoleStore`], [`DelegationStore`] and
//! [`PatientLinkStore`]. Any storage failure resolves to a denial.

pub mod abac;
pub mod error;
pub mod identity;
pub mod permission;
pub mod store;
pub mod types;

pub use abac::{
	decide, requires_delegation, AccessFacts, Action, AllowRule, AuthorizationResolver, Decision,
	DenyReason, PatientScope, ResourceKind, ResourceRef, ScopeFilter,
};
pub use error::{AccessError, LookupError, ParseError};
pub use identity::{IdentityContext, RequestMeta, VerifiedIdentity};
pub use permission::{Permission, PermissionSet};
pub use store::{DelegationGrant, DelegationStore, PatientLinkStore, RoleStore};
pub use types::{GrantId, OrgId, PatientId, Role, UserId};
