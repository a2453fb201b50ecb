// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Layered configuration for the PHI access control and audit engine.
//!
//! Sources, lowest to highest precedence: built-in defaults, a TOML file,
//! then `PHI_SERVER_*` environment variables.
//!
//! ```ignore
//! use phi_server_config::load_config;
//!
//! let config = load_config()?;
//! println!("audit sinks: {:?}", config.audit.sinks);
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::{ConfigError, Result};
pub use layer::ServerConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use std::path::PathBuf;

use tracing::{debug, info};

/// Fully resolved server configuration.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
	pub database: DatabaseConfig,
	pub audit: AuditConfig,
	pub logging: LoggingConfig,
}

/// Load configuration from defaults, `/etc/phi/server.toml` and the environment.
pub fn load_config() -> Result<ServerConfig> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration with a custom config file path.
pub fn load_config_from(config_path: impl Into<PathBuf>) -> Result<ServerConfig> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

fn load_from_sources(
	mut sources: Vec<Box<dyn ConfigSource>>,
) -> Result<ServerConfig> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ServerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		merged.merge(source.load()?);
	}

	finalize(merged)
}

/// Finalize a merged layer into resolved config.
pub fn finalize(layer: ServerConfigLayer) -> Result<ServerConfig> {
	let database = layer.database.unwrap_or_default().finalize();
	let audit = layer.audit.unwrap_or_default().finalize();
	let logging = layer.logging.unwrap_or_default().finalize();

	validate_audit(&audit)?;

	info!(
		database = %database.url,
		max_connections = database.max_connections,
		audit_sinks = ?audit.sinks,
		append_timeout_ms = audit.append_timeout_ms,
		alert_after_failures = audit.alert_after_failures,
		log_format = ?logging.format,
		"Server configuration loaded"
	);

	Ok(ServerConfig {
		database,
		audit,
		logging,
	})
}

/// Route prefixes must be absolute paths.
fn validate_audit(audit: &AuditConfig) -> Result<()> {
	let prefixes = audit
		.extra_excluded_prefixes
		.iter()
		.map(|p| ("audit.extra_excluded_prefixes", p))
		.chain(
			audit
				.extra_included_prefixes
				.iter()
				.map(|p| ("audit.extra_included_prefixes", p)),
		);

	for (key, prefix) in prefixes {
		if !prefix.starts_with('/') {
			return Err(ConfigError::InvalidValue {
				key: key.to_string(),
				message: format!("route prefix '{prefix}' must start with '/'"),
			});
		}
	}

	Ok(())
}
