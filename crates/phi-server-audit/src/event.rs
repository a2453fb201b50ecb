// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Audit event model.
//!
//! An [`AuditEvent`] is written once and never changed. Nothing in this crate
//! can update or delete one after it reaches a sink.

use chrono::{DateTime, Utc};
use http::Method;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use phi_server_auth::{IdentityContext, OrgId, UserId};

/// What the request did to the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
	Read,
	Create,
	Update,
	Delete,
}

impl AuditAction {
	pub fn all() -> &'static [AuditAction] {
		&[
			AuditAction::Read,
			AuditAction::Create,
			AuditAction::Update,
			AuditAction::Delete,
		]
	}

	/// GET→READ, POST→CREATE, PUT/PATCH→UPDATE, DELETE→DELETE.
	///
	/// Every other method (HEAD, OPTIONS, ...) has no action and is not audited.
	pub fn from_method(method: &Method) -> Option<Self> {
		match *method {
			Method::GET => Some(AuditAction::Read),
			Method::POST => Some(AuditAction::Create),
			Method::PUT | Method::PATCH => Some(AuditAction::Update),
			Method::DELETE => Some(AuditAction::Delete),
			_ => None,
		}
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			AuditAction::Read => "READ",
			AuditAction::Create => "CREATE",
			AuditAction::Update => "UPDATE",
			AuditAction::Delete => "DELETE",
		}
	}

	pub fn is_write(&self) -> bool {
		!matches!(self, AuditAction::Read)
	}
}

impl fmt::Display for AuditAction {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for AuditAction {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"READ" => Ok(AuditAction::Read),
			"CREATE" => Ok(AuditAction::Create),
			"UPDATE" => Ok(AuditAction::Update),
			"DELETE" => Ok(AuditAction::Delete),
			other => Err(format!("unknown audit action: {other}")),
		}
	}
}

/// One recorded PHI access.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
	pub id: Uuid,
	/// `None` for system-initiated actions.
	pub actor_user_id: Option<UserId>,
	pub organization_id: Option<OrgId>,
	/// e.g. "patient", "appointment", "clinical_note".
	pub resource_type: String,
	/// `None` when the route carried no parseable id.
	pub resource_id: Option<Uuid>,
	pub action_type: AuditAction,
	pub ip_address: Option<String>,
	pub user_agent: Option<String>,
	/// The administrator acting as `actor_user_id`, if any.
	pub impersonator_id: Option<UserId>,
	pub request_id: Option<String>,
	/// Change summary for writes. Always `None` for reads.
	pub changes: Option<serde_json::Value>,
	pub occurred_at: DateTime<Utc>,
}

impl AuditEvent {
	pub fn builder(resource_type: impl Into<String>, action_type: AuditAction) -> AuditEventBuilder {
		AuditEventBuilder::new(resource_type, action_type)
	}
}

pub struct AuditEventBuilder {
	actor_user_id: Option<UserId>,
	organization_id: Option<OrgId>,
	resource_type: String,
	resource_id: Option<Uuid>,
	action_type: AuditAction,
	ip_address: Option<String>,
	user_agent: Option<String>,
	impersonator_id: Option<UserId>,
	request_id: Option<String>,
	changes: Option<serde_json::Value>,
}

impl AuditEventBuilder {
	pub fn new(resource_type: impl Into<String>, action_type: AuditAction) -> Self {
		Self {
			actor_user_id: None,
			organization_id: None,
			resource_type: resource_type.into(),
			resource_id: None,
			action_type,
			ip_address: None,
			user_agent: None,
			impersonator_id: None,
			request_id: None,
			changes: None,
		}
	}

	/// Copy actor, impersonator and HTTP metadata from the request identity.
	pub fn context(mut self, ctx: &IdentityContext) -> Self {
		self.actor_user_id = Some(ctx.user_id());
		self.organization_id = ctx.org_id();
		self.impersonator_id = ctx.impersonator_id();
		self.ip_address = ctx.client_ip().map(|ip| ip.to_string());
		self.user_agent = ctx.user_agent().map(str::to_string);
		self.request_id = ctx.request_id().map(str::to_string);
		self
	}

	pub fn actor(mut self, user_id: UserId) -> Self {
		self.actor_user_id = Some(user_id);
		self
	}

	pub fn organization(mut self, org_id: OrgId) -> Self {
		self.organization_id = Some(org_id);
		self
	}

	/// Fill the organization only when none is set yet.
	pub fn organization_fallback(mut self, org_id: Option<OrgId>) -> Self {
		if self.organization_id.is_none() {
			self.organization_id = org_id;
		}
		self
	}

	pub fn resource_id(mut self, id: Option<Uuid>) -> Self {
		self.resource_id = id;
		self
	}

	pub fn ip_address(mut self, ip: impl Into<String>) -> Self {
		self.ip_address = Some(ip.into());
		self
	}

	pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
		self.user_agent = Some(ua.into());
		self
	}

	pub fn request_id(mut self, request_id: impl Into<String>) -> Self {
		self.request_id = Some(request_id.into());
		self
	}

	pub fn changes(mut self, changes: Option<serde_json::Value>) -> Self {
		self.changes = changes;
		self
	}

	pub fn build(self) -> AuditEvent {
		let changes = if self.action_type.is_write() {
			self.changes.filter(|c| !c.is_null())
		} else {
			None
		};

		AuditEvent {
			id: Uuid::new_v4(),
			actor_user_id: self.actor_user_id,
			organization_id: self.organization_id,
			resource_type: self.resource_type,
			resource_id: self.resource_id,
			action_type: self.action_type,
			ip_address: self.ip_address,
			user_agent: self.user_agent,
			impersonator_id: self.impersonator_id,
			request_id: self.request_id,
			changes,
			occurred_at: Utc::now(),
		}
	}
}
