// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core type definitions for PHI authorization.
//!
//! - **ID newtypes**: Type-safe wrappers around UUIDs ([`UserId`], [`OrgId`],
//!   [`PatientId`], [`GrantId`]) so a patient id can never be passed where a
//!   user id is expected
//! - **Organization roles**: the closed [`Role`] enum; unknown role names fail
//!   at construction time instead of silently evaluating to a denial

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ParseError;

// =============================================================================
// ID Newtypes
// =============================================================================

macro_rules! define_id_type {
	($name:ident, $doc:expr) => {
		#[doc = $doc]
		#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(transparent)]
		pub struct $name(Uuid);

		impl $name {
			/// Create a new ID from a UUID.
			pub fn new(id: Uuid) -> Self {
				Self(id)
			}

			/// Generate a new random ID.
			pub fn generate() -> Self {
				Self(Uuid::new_v4())
			}

			/// Get the inner UUID value.
			pub fn into_inner(self) -> Uuid {
				self.0
			}

			/// Get a reference to the inner UUID.
			pub fn as_uuid(&self) -> &Uuid {
				&self.0
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				write!(f, "{}", self.0)
			}
		}

		impl From<Uuid> for $name {
			fn from(id: Uuid) -> Self {
				Self(id)
			}
		}

		impl From<$name> for Uuid {
			fn from(id: $name) -> Self {
				id.0
			}
		}

		impl FromStr for $name {
			type Err = uuid::Error;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Uuid::parse_str(s).map(Self)
			}
		}
	};
}

define_id_type!(UserId, "Unique identifier for a user account.");
define_id_type!(OrgId, "Unique identifier for an organization (tenant).");
define_id_type!(PatientId, "Unique identifier for a patient record.");
define_id_type!(GrantId, "Unique identifier for a delegation (proxy) grant.");

// =============================================================================
// Organization Roles
// =============================================================================

/// Membership role of a user within one organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
	/// Front-desk and operations staff.
	Staff,
	/// Organization administrator.
	Admin,
	/// Licensed care provider.
	Provider,
	/// A patient enrolled in the organization.
	Patient,
	/// A caregiver acting for one or more patients through delegation grants.
	Proxy,
}

impl Role {
	/// Returns all available roles.
	pub fn all() -> &'static [Role] {
		&[
			Role::Staff,
			Role::Admin,
			Role::Provider,
			Role::Patient,
			Role::Proxy,
		]
	}

	/// Returns true for roles that may see all PHI in their organization.
	pub fn sees_all_org_phi(&self) -> bool {
		matches!(self, Role::Staff | Role::Admin | Role::Provider)
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			Role::Staff => "staff",
			Role::Admin => "admin",
			Role::Provider => "provider",
			Role::Patient => "patient",
			Role::Proxy => "proxy",
		}
	}
}

impl fmt::Display for Role {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.as_str())
	}
}

impl FromStr for Role {
	type Err = ParseError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"staff" => Ok(Role::Staff),
			"admin" => Ok(Role::Admin),
			"provider" => Ok(Role::Provider),
			"patient" => Ok(Role::Patient),
			"proxy" => Ok(Role::Proxy),
			_ => Err(ParseError::UnknownRole(s.to_string())),
		}
	}
}
