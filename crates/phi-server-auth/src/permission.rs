// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Delegation permissions.
//!
//! A delegation grant carries a fixed [`PermissionSet`] bitset. Each bit is a
//! [`Permission`]; names outside this closed set are rejected when parsed.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;

/// A single delegable permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
	ViewProfile,
	ViewAppointments,
	ScheduleAppointments,
	ViewClinicalNotes,
	ViewBilling,
	MessageProviders,
}

impl Permission {
	pub fn all() -> &'static [Permission] {
		&[
			Permission::ViewProfile,
			Permission::ViewAppointments,
			Permission::ScheduleAppointments,
			Permission::ViewClinicalNotes,
			Permission::ViewBilling,
			Permission::MessageProviders,
		]
	}

	fn bit(self) -> u8 {
		match self {
			Permission::ViewProfile => 1 << 0,
			Permission::ViewAppointments => 1 << 1,
			Permission::ScheduleAppointments => 1 << 2,
			Permission::ViewClinicalNotes => 1 << 3,
			Permission::ViewBilling => 1 << 4,
			Permission::MessageProviders => 1 << 5,
		}
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			Permission::ViewProfile => "view_profile",
			Permission::ViewAppointments => "view_appointments",
			Permission::ScheduleAppointments => "schedule_appointments",
			Permission::ViewClinicalNotes => "view_clinical_notes",
			Permission::ViewBilling => "view_billing",
			Permission::MessageProviders => "message_providers",
		}
	}
}

impl fmt::Display for Permission {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.as_str())
	}
}

impl FromStr for Permission {
	type Err = ParseError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Permission::all()
			.iter()
			.copied()
			.find(|p| p.as_str() == s)
			.ok_or_else(|| ParseError::UnknownPermission(s.to_string()))
	}
}

/// Fixed-size set of [`Permission`]s.
///
/// Serialized as a list of permission names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "Vec<Permission>", from = "Vec<Permission>")]
pub struct PermissionSet(u8);

impl PermissionSet {
	pub const fn empty() -> Self {
		Self(0)
	}

	pub fn all() -> Self {
		Permission::all().iter().copied().collect()
	}

	pub fn contains(&self, permission: Permission) -> bool {
		self.0 & permission.bit() != 0
	}

	pub fn insert(&mut self, permission: Permission) {
		self.0 |= permission.bit();
	}

	pub fn remove(&mut self, permission: Permission) {
		self.0 &= !permission.bit();
	}

	/// Builder: add a permission.
	pub fn with(mut self, permission: Permission) -> Self {
		self.insert(permission);
		self
	}

	pub fn is_empty(&self) -> bool {
		self.0 == 0
	}

	pub fn iter(&self) -> impl Iterator<Item = Permission> + '_ {
		Permission::all()
			.iter()
			.copied()
			.filter(move |p| self.contains(*p))
	}

	/// Parses a list of permission names, failing on the first unknown name.
	pub fn parse_names<I, S>(names: I) -> Result<Self, ParseError>
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		names
			.into_iter()
			.map(|n| n.as_ref().parse::<Permission>())
			.collect()
	}
}

impl FromIterator<Permission> for PermissionSet {
	fn from_iter<T: IntoIterator<Item = Permission>>(iter: T) -> Self {
		let mut set = PermissionSet::empty();
		for p in iter {
			set.insert(p);
		}
		set
	}
}

impl From<Vec<Permission>> for PermissionSet {
	fn from(permissions: Vec<Permission>) -> Self {
		permissions.into_iter().collect()
	}
}

impl From<PermissionSet> for Vec<Permission> {
	fn from(set: PermissionSet) -> Self {
		set.iter().collect()
	}
}
