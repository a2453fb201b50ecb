// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Per-request identity snapshot.
//!
//! An [`IdentityContext`] is built once per inbound request from identity
//! claims that were already verified upstream, plus request metadata taken
//! from the HTTP headers. It has no setters: every downstream call receives
//! the same value by reference.
//!
//! ```text
//! verified claims ─┐
//!                  ├─► IdentityContext ─► resolver / scope filter / audit recorder
//! HTTP headers ────┘
//! ```

use http::header::USER_AGENT;
use http::HeaderMap;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use uuid::Uuid;

use crate::types::{OrgId, UserId};

pub const REQUEST_ID_HEADER: &str = "x-request-id";
const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";
const REAL_IP_HEADER: &str = "x-real-ip";

/// Identity claims supplied by the (external) identity verification layer.
///
/// Trusted as-is; tokens are not re-validated here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedIdentity {
	pub user_id: UserId,
	pub org_id: Option<OrgId>,
	/// Set when an administrator is acting as `user_id`.
	pub impersonator_id: Option<UserId>,
}

impl VerifiedIdentity {
	pub fn new(user_id: UserId) -> Self {
		Self {
			user_id,
			org_id: None,
			impersonator_id: None,
		}
	}

	/// Builder: set the active organization.
	pub fn in_org(mut self, org_id: OrgId) -> Self {
		self.org_id = Some(org_id);
		self
	}

	/// Builder: record the impersonating administrator.
	pub fn impersonated_by(mut self, admin_id: UserId) -> Self {
		self.impersonator_id = Some(admin_id);
		self
	}
}

/// HTTP-level metadata attached to the request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RequestMeta {
	pub request_id: Option<String>,
	pub client_ip: Option<IpAddr>,
	pub user_agent: Option<String>,
}

impl RequestMeta {
	/// Extracts request id, client IP and user agent from the headers.
	///
	/// Client IP precedence: first `x-forwarded-for` hop, then `x-real-ip`,
	/// then the peer address. A request id is generated when none is supplied.
	pub fn from_headers(headers: &HeaderMap, peer_addr: Option<SocketAddr>) -> Self {
		let request_id = header_str(headers, REQUEST_ID_HEADER)
			.map(|s| s.to_string())
			.unwrap_or_else(|| Uuid::new_v4().to_string());

		let client_ip = header_str(headers, FORWARDED_FOR_HEADER)
			.and_then(|s| s.split(',').next())
			.and_then(|s| s.trim().parse::<IpAddr>().ok())
			.or_else(|| {
				header_str(headers, REAL_IP_HEADER).and_then(|s| s.trim().parse::<IpAddr>().ok())
			})
			.or_else(|| peer_addr.map(|a| a.ip()));

		let user_agent = headers
			.get(USER_AGENT)
			.and_then(|v| v.to_str().ok())
			.map(|s| s.to_string());

		Self {
			request_id: Some(request_id),
			client_ip,
			user_agent,
		}
	}
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
	headers
		.get(name)
		.and_then(|v| v.to_str().ok())
		.filter(|s| !s.trim().is_empty())
}

/// Immutable identity of the actor behind one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityContext {
	identity: VerifiedIdentity,
	meta: RequestMeta,
}

impl IdentityContext {
	pub fn new(identity: VerifiedIdentity, meta: RequestMeta) -> Self {
		Self { identity, meta }
	}

	/// Builds the context from verified claims and raw request parts.
	pub fn from_request_parts(
		identity: VerifiedIdentity,
		headers: &HeaderMap,
		peer_addr: Option<SocketAddr>,
	) -> Self {
		Self::new(identity, RequestMeta::from_headers(headers, peer_addr))
	}

	/// The acting user. Authorization is always evaluated for this user.
	pub fn user_id(&self) -> UserId {
		self.identity.user_id
	}

	pub fn org_id(&self) -> Option<OrgId> {
		self.identity.org_id
	}

	pub fn impersonator_id(&self) -> Option<UserId> {
		self.identity.impersonator_id
	}

	pub fn is_impersonated(&self) -> bool {
		self.identity.impersonator_id.is_some()
	}

	pub fn request_id(&self) -> Option<&str> {
		self.meta.request_id.as_deref()
	}

	pub fn client_ip(&self) -> Option<IpAddr> {
		self.meta.client_ip
	}

	pub fn user_agent(&self) -> Option<&str> {
		self.meta.user_agent.as_deref()
	}
}
