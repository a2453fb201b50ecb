// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SQLite persistence for the PHI engine.
//!
//! Repositories implement the store contracts from `phi-server-auth`, so the
//! resolver and scope filter read live membership, patient and delegation
//! rows. Storage failures cross that seam as `LookupError` and are denied.

pub mod audit;
pub mod delegation;
pub mod error;
pub mod membership;
pub mod patient;
pub mod pool;
pub mod schema;
pub mod tenant;
mod time;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use audit::{AuditPage, AuditQuery, AuditRepository};
pub use delegation::{DelegationRepository, NewGrant};
pub use error::{DbError, Result};
pub use membership::MembershipRepository;
pub use patient::{PatientRecord, PatientRepository};
pub use pool::create_pool;
pub use schema::ensure_schema;
pub use tenant::TenantSession;
