// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Type definitions for PHI access decisions.
//!
//! - [`Action`]: the operation being attempted and the delegation bit it needs
//! - [`ResourceRef`]: where the resource lives (organization and patient)
//! - [`Decision`]: ALLOW with the matched rule, or DENY with a server-side reason

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::AccessError;
use crate::permission::Permission;
use crate::types::{GrantId, OrgId, PatientId, Role};

/// Operations on patient data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
	ViewProfile,
	ViewAppointments,
	ScheduleAppointment,
	CancelAppointment,
	ViewClinicalNotes,
	ViewBilling,
	MessageProvider,
}

impl Action {
	pub fn all() -> &'static [Action] {
		&[
			Action::ViewProfile,
			Action::ViewAppointments,
			Action::ScheduleAppointment,
			Action::CancelAppointment,
			Action::ViewClinicalNotes,
			Action::ViewBilling,
			Action::MessageProvider,
		]
	}

	/// The delegation permission a proxy must hold to perform this action.
	pub fn required_permission(&self) -> Permission {
		match self {
			Action::ViewProfile => Permission::ViewProfile,
			Action::ViewAppointments => Permission::ViewAppointments,
			Action::ScheduleAppointment | Action::CancelAppointment => {
				Permission::ScheduleAppointments
			}
			Action::ViewClinicalNotes => Permission::ViewClinicalNotes,
			Action::ViewBilling => Permission::ViewBilling,
			Action::MessageProvider => Permission::MessageProviders,
		}
	}
}

/// Kinds of PHI-bearing resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
	Patient,
	Appointment,
	ClinicalNote,
	Invoice,
	Message,
	Document,
}

/// Describes the resource being accessed.
///
/// Only identifiers. Enrollment of the patient in `org_id` and the patient's
/// linked user are resolved from storage at decision time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceRef {
	pub kind: ResourceKind,
	pub org_id: OrgId,
	/// The patient the resource belongs to. `None` for org-level resources,
	/// which can only be reached through a staff role.
	pub patient_id: Option<PatientId>,
}

impl ResourceRef {
	/// Resource attributes for a patient record.
	pub fn patient(org_id: OrgId, patient_id: PatientId) -> Self {
		Self {
			kind: ResourceKind::Patient,
			org_id,
			patient_id: Some(patient_id),
		}
	}

	/// Resource attributes for any PHI resource of a patient.
	pub fn of_patient(kind: ResourceKind, org_id: OrgId, patient_id: PatientId) -> Self {
		Self {
			kind,
			org_id,
			patient_id: Some(patient_id),
		}
	}

	/// Resource attributes for an org-level resource with no owning patient.
	pub fn org_level(kind: ResourceKind, org_id: OrgId) -> Self {
		Self {
			kind,
			org_id,
			patient_id: None,
		}
	}
}

/// The rule that produced an ALLOW.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum AllowRule {
	OrgRole { role: Role },
	SelfAccess,
	Delegation { grant_id: GrantId },
}

/// Why a request was denied. Server-side only: never rendered to end users.
///
/// The reason names the last check evaluated before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DenyReason {
	/// No clinical role and the resource is not patient-scoped.
	NoRole,
	/// The patient is not enrolled in the organization the request names.
	PatientNotInOrg,
	/// No active grant for this proxy and patient.
	NoActiveGrant,
	/// An active grant exists but lacks the permission the action needs.
	MissingPermission { permission: Permission },
	/// A store could not answer. Fail-closed.
	LookupFailed,
}

impl fmt::Display for DenyReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			DenyReason::NoRole => write!(f, "no_role"),
			DenyReason::PatientNotInOrg => write!(f, "patient_not_in_org"),
			DenyReason::NoActiveGrant => write!(f, "no_active_grant"),
			DenyReason::MissingPermission { permission } => {
				write!(f, "missing_permission:{permission}")
			}
			DenyReason::LookupFailed => write!(f, "lookup_failed"),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
	Allow { rule: AllowRule },
	Deny { reason: DenyReason },
}

impl Decision {
	pub fn allow(rule: AllowRule) -> Self {
		Decision::Allow { rule }
	}

	pub fn deny(reason: DenyReason) -> Self {
		Decision::Deny { reason }
	}

	pub fn is_allowed(&self) -> bool {
		matches!(self, Decision::Allow { .. })
	}

	pub fn deny_reason(&self) -> Option<DenyReason> {
		match self {
			Decision::Deny { reason } => Some(*reason),
			Decision::Allow { .. } => None,
		}
	}

	/// `Ok(self)` when allowed, otherwise the uniform [`AccessError::Forbidden`].
	pub fn into_result(self) -> crate::error::Result<Self> {
		if self.is_allowed() {
			Ok(self)
		} else {
			Err(AccessError::Forbidden)
		}
	}
}
