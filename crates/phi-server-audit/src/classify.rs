// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Route classification for audit eligibility.
//!
//! Exclusions are checked first and always win. Paths matching an inclusion
//! prefix are audited; everything else is left alone. Prefixes match whole
//! path segments, so `/health` covers `/health/live` but not `/healthcare`.

use uuid::Uuid;

use phi_server_auth::OrgId;
use phi_server_config::AuditConfig;

pub const DEFAULT_EXCLUDED_PREFIXES: &[&str] = &[
	"/health",
	"/healthz",
	"/ready",
	"/metrics",
	"/docs",
	"/openapi.json",
	"/static/",
	"/assets/",
	"/favicon.ico",
	"/webhooks/",
	"/api/webhooks/",
	"/admin/",
	"/api/admin/",
];

pub const DEFAULT_INCLUDED_PREFIXES: &[&str] = &[
	"/api/organizations/",
	"/api/patients/",
	"/api/proxy/",
	"/api/me/",
];

/// Resource type recorded when no known collection appears in the path.
pub const UNKNOWN_RESOURCE_TYPE: &str = "unknown";

/// Collection segment → recorded resource type.
const COLLECTIONS: &[(&str, &str)] = &[
	("organizations", "organization"),
	("patients", "patient"),
	("appointments", "appointment"),
	("clinical-notes", "clinical_note"),
	("invoices", "invoice"),
	("messages", "message"),
	("documents", "document"),
	("proxies", "delegation"),
	("delegations", "delegation"),
	("prescriptions", "prescription"),
	("me", "patient"),
];

/// The resource a route refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
	pub resource_type: String,
	pub resource_id: Option<Uuid>,
	/// Organization named in the path, if any.
	pub organization_id: Option<OrgId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteClass {
	Excluded,
	Audited(ResourceDescriptor),
	Unmatched,
}

#[derive(Debug, Clone)]
pub struct RouteRules {
	excluded: Vec<String>,
	included: Vec<String>,
}

impl Default for RouteRules {
	fn default() -> Self {
		Self::new(Vec::new(), Vec::new())
	}
}

impl RouteRules {
	/// Default prefixes plus the given extras.
	pub fn new(extra_excluded: Vec<String>, extra_included: Vec<String>) -> Self {
		let excluded = DEFAULT_EXCLUDED_PREFIXES
			.iter()
			.map(|p| normalize(p).to_string())
			.chain(extra_excluded.iter().map(|p| normalize(p).to_string()))
			.collect();
		let included = DEFAULT_INCLUDED_PREFIXES
			.iter()
			.map(|p| normalize(p).to_string())
			.chain(extra_included.iter().map(|p| normalize(p).to_string()))
			.collect();
		Self { excluded, included }
	}

	pub fn from_config(config: &AuditConfig) -> Self {
		Self::new(
			config.extra_excluded_prefixes.clone(),
			config.extra_included_prefixes.clone(),
		)
	}

	pub fn classify(&self, path: &str) -> RouteClass {
		let path = normalize(path);

		if self.excluded.iter().any(|p| matches_prefix(path, p)) {
			return RouteClass::Excluded;
		}

		if self.included.iter().any(|p| matches_prefix(path, p)) {
			return RouteClass::Audited(describe(path));
		}

		RouteClass::Unmatched
	}
}

/// Strips query string, fragment and trailing slashes.
fn normalize(path: &str) -> &str {
	let path = path.split(['?', '#']).next().unwrap_or(path);
	let trimmed = path.trim_end_matches('/');
	if trimmed.is_empty() {
		"/"
	} else {
		trimmed
	}
}

fn matches_prefix(path: &str, prefix: &str) -> bool {
	if prefix == "/" {
		return true;
	}
	match path.strip_prefix(prefix) {
		Some(rest) => rest.is_empty() || rest.starts_with('/'),
		None => false,
	}
}

/// Derives the resource from the last known collection segment in the path.
fn describe(path: &str) -> ResourceDescriptor {
	let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

	let mut resource_type = UNKNOWN_RESOURCE_TYPE;
	let mut resource_id = None;
	let mut organization_id = None;

	for (i, segment) in segments.iter().enumerate() {
		let Some((_, kind)) = COLLECTIONS.iter().find(|(name, _)| name == segment) else {
			continue;
		};
		let id = segments.get(i + 1).and_then(|s| Uuid::parse_str(s).ok());

		if *segment == "organizations" {
			organization_id = id.map(OrgId::new);
		}

		resource_type = *kind;
		resource_id = id;
	}

	ResourceDescriptor {
		resource_type: resource_type.to_string(),
		resource_id,
		organization_id,
	}
}
