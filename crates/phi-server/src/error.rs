// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use phi_server_auth::AccessError;
use phi_server_config::ConfigError;
use phi_server_db::DbError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
	/// Uniform denial. Never carries the reason.
	#[error(transparent)]
	Access(#[from] AccessError),

	#[error("configuration error: {0}")]
	Config(#[from] ConfigError),

	#[error("database error: {0}")]
	Database(#[from] DbError),

	#[error("telemetry setup failed: {0}")]
	Telemetry(String),
}

impl ServerError {
	pub fn is_forbidden(&self) -> bool {
		matches!(self, ServerError::Access(AccessError::Forbidden))
	}
}

pub type Result<T> = std::result::Result<T, ServerError>;
