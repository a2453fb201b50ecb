// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Attribute-based access decisions for PHI.
//!
//! - [`engine`]: the ordered allow rules and the store-backed resolver
//! - [`scope`]: patient scoping for list endpoints
//! - [`types`]: actions, resource references and decisions

pub mod engine;
pub mod scope;
pub mod types;

#[cfg(test)]
pub(crate) mod fakes;

pub use engine::{decide, requires_delegation, AccessFacts, AuthorizationResolver};
pub use scope::{PatientScope, ScopeFilter};
pub use types::{Action, AllowRule, Decision, DenyReason, ResourceKind, ResourceRef};
