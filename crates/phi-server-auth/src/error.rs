// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;

/// Storage was unavailable while resolving a role, delegation or patient link.
///
/// Never interpreted as "nothing found"; every consumer fails closed.
#[derive(Error, Debug)]
#[error("lookup failed in {store}: {message}")]
pub struct LookupError {
	pub store: &'static str,
	pub message: String,
}

impl LookupError {
	pub fn new(store: &'static str, message: impl Into<String>) -> Self {
		Self {
			store,
			message: message.into(),
		}
	}
}

/// The only error handed back to request handlers.
///
/// Its message is intentionally uniform. Which check failed (or whether the
/// patient exists at all) is kept in server-side logs.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessError {
	#[error("not authorized")]
	Forbidden,
}

pub type Result<T> = std::result::Result<T, AccessError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
	#[error("unknown role: {0}")]
	UnknownRole(String),

	#[error("unknown permission: {0}")]
	UnknownPermission(String),
}
