// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Audit recording configuration section.
//!
//! There is no switch to turn auditing off. Route classification can be
//! extended, and sinks chosen, but at least one sink is always configured.

use serde::Deserialize;

const DEFAULT_APPEND_TIMEOUT_MS: u64 = 250;
const DEFAULT_ALERT_AFTER_FAILURES: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditSinkKind {
	Sqlite,
	Tracing,
}

impl AuditSinkKind {
	fn parse(s: &str) -> Option<Self> {
		match s.trim().to_lowercase().as_str() {
			"sqlite" => Some(AuditSinkKind::Sqlite),
			"tracing" => Some(AuditSinkKind::Tracing),
			_ => None,
		}
	}

	/// Parses a comma-separated sink list, returning the first unknown name on failure.
	pub fn parse_list(s: &str) -> Result<Vec<Self>, String> {
		s.split(',')
			.filter(|part| !part.trim().is_empty())
			.map(|part| Self::parse(part).ok_or_else(|| part.trim().to_string()))
			.collect()
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditConfig {
	/// Upper bound for a single sink append, independent of the request deadline.
	pub append_timeout_ms: u64,
	/// Consecutive failed appends before an alert-level event is emitted.
	pub alert_after_failures: u64,
	pub extra_excluded_prefixes: Vec<String>,
	pub extra_included_prefixes: Vec<String>,
	pub sinks: Vec<AuditSinkKind>,
}

impl Default for AuditConfig {
	fn default() -> Self {
		AuditConfigLayer::default().finalize()
	}
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct AuditConfigLayer {
	#[serde(default)]
	pub append_timeout_ms: Option<u64>,
	#[serde(default)]
	pub alert_after_failures: Option<u64>,
	#[serde(default)]
	pub extra_excluded_prefixes: Option<Vec<String>>,
	#[serde(default)]
	pub extra_included_prefixes: Option<Vec<String>>,
	#[serde(default)]
	pub sinks: Option<Vec<AuditSinkKind>>,
}

impl AuditConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.append_timeout_ms.is_some() {
			self.append_timeout_ms = other.append_timeout_ms;
		}
		if other.alert_after_failures.is_some() {
			self.alert_after_failures = other.alert_after_failures;
		}
		if other.extra_excluded_prefixes.is_some() {
			self.extra_excluded_prefixes = other.extra_excluded_prefixes;
		}
		if other.extra_included_prefixes.is_some() {
			self.extra_included_prefixes = other.extra_included_prefixes;
		}
		if other.sinks.is_some() {
			self.sinks = other.sinks;
		}
	}

	pub fn finalize(self) -> AuditConfig {
		AuditConfig {
			append_timeout_ms: self
				.append_timeout_ms
				.filter(|ms| *ms > 0)
				.unwrap_or(DEFAULT_APPEND_TIMEOUT_MS),
			alert_after_failures: self
				.alert_after_failures
				.filter(|n| *n > 0)
				.unwrap_or(DEFAULT_ALERT_AFTER_FAILURES),
			extra_excluded_prefixes: self.extra_excluded_prefixes.unwrap_or_default(),
			extra_included_prefixes: self.extra_included_prefixes.unwrap_or_default(),
			sinks: self
				.sinks
				.filter(|s| !s.is_empty())
				.unwrap_or_else(|| vec![AuditSinkKind::Sqlite, AuditSinkKind::Tracing]),
		}
	}
}
