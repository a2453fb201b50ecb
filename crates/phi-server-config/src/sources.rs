// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: environment variables and TOML files.

use std::path::PathBuf;
use std::str::FromStr;

use tracing::{debug, trace};

use crate::error::{ConfigError, Result};
use crate::layer::ServerConfigLayer;
use crate::sections::{
	AuditConfigLayer, AuditSinkKind, DatabaseConfigLayer, LogFormat, LoggingConfigLayer,
};

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<ServerConfigLayer>;
}

pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<ServerConfigLayer> {
		debug!("loading defaults");
		Ok(ServerConfigLayer::default())
	}
}

/// TOML file configuration source. A missing file is not an error.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new("/etc/phi/server.toml")
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<ServerConfigLayer> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(ServerConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: ServerConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: PHI_SERVER_<SECTION>_<FIELD>
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ServerConfigLayer> {
		debug!("loading environment variables");
		Ok(ServerConfigLayer {
			database: Some(load_database_from_env()?),
			audit: Some(load_audit_from_env()?),
			logging: Some(load_logging_from_env()?),
		})
	}
}

fn env_var(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_parse<T: FromStr>(name: &str) -> Result<Option<T>> {
	env_var(name)
		.map(|v| {
			v.parse().map_err(|_| ConfigError::InvalidValue {
				key: name.to_string(),
				message: format!("cannot parse '{v}'"),
			})
		})
		.transpose()
}

fn env_list(name: &str) -> Option<Vec<String>> {
	env_var(name).map(|s| {
		s.split(',')
			.map(|s| s.trim().to_string())
			.filter(|s| !s.is_empty())
			.collect()
	})
}

fn load_database_from_env() -> Result<DatabaseConfigLayer> {
	Ok(DatabaseConfigLayer {
		url: env_var("PHI_SERVER_DATABASE_URL"),
		max_connections: env_parse("PHI_SERVER_DATABASE_MAX_CONNECTIONS")?,
	})
}

fn load_audit_from_env() -> Result<AuditConfigLayer> {
	let sinks = match env_var("PHI_SERVER_AUDIT_SINKS") {
		Some(v) => Some(AuditSinkKind::parse_list(&v).map_err(|unknown| {
			ConfigError::InvalidValue {
				key: "PHI_SERVER_AUDIT_SINKS".to_string(),
				message: format!("unknown audit sink '{unknown}'"),
			}
		})?),
		None => None,
	};

	Ok(AuditConfigLayer {
		append_timeout_ms: env_parse("PHI_SERVER_AUDIT_APPEND_TIMEOUT_MS")?,
		alert_after_failures: env_parse("PHI_SERVER_AUDIT_ALERT_AFTER_FAILURES")?,
		extra_excluded_prefixes: env_list("PHI_SERVER_AUDIT_EXTRA_EXCLUDED_PREFIXES"),
		extra_included_prefixes: env_list("PHI_SERVER_AUDIT_EXTRA_INCLUDED_PREFIXES"),
		sinks,
	})
}

fn load_logging_from_env() -> Result<LoggingConfigLayer> {
	let format = match env_var("PHI_SERVER_LOGGING_FORMAT") {
		Some(v) => Some(parse_log_format(&v).ok_or_else(|| ConfigError::InvalidValue {
			key: "PHI_SERVER_LOGGING_FORMAT".to_string(),
			message: format!("expected 'plain' or 'json', got '{v}'"),
		})?),
		None => None,
	};

	Ok(LoggingConfigLayer {
		level: env_var("PHI_SERVER_LOGGING_LEVEL"),
		format,
	})
}

fn parse_log_format(s: &str) -> Option<LogFormat> {
	match s.to_lowercase().as_str() {
		"plain" | "text" => Some(LogFormat::Plain),
		"json" => Some(LogFormat::Json),
		_ => None,
	}
}
