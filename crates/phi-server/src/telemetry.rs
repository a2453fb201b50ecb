// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Tracing subscriber setup.
//!
//! `RUST_LOG` overrides `logging.level` when set.

use phi_server_config::{LogFormat, LoggingConfig};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::ServerError;

/// Install the global subscriber. Fails if one is already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), ServerError> {
	let filter = env_filter(&config.level)?;
	let registry = tracing_subscriber::registry().with(filter);

	let installed = match config.format {
		LogFormat::Plain => registry.with(fmt::layer()).try_init(),
		LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
	};
	installed.map_err(|e| ServerError::Telemetry(e.to_string()))
}

fn env_filter(level: &str) -> Result<EnvFilter, ServerError> {
	match EnvFilter::try_from_default_env() {
		Ok(filter) => Ok(filter),
		Err(_) => EnvFilter::try_new(level)
			.map_err(|e| ServerError::Telemetry(format!("invalid log level {level:?}: {e}"))),
	}
}
