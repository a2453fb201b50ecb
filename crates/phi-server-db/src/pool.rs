// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use sqlx::sqlite::{
	SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::str::FromStr;

use crate::error::DbError;

/// Create a SqlitePool with WAL mode and common settings.
///
/// In-memory databases are limited to a single long-lived connection, since
/// every SQLite connection to `:memory:` opens a separate database.
#[tracing::instrument(skip(database_url))]
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<SqlitePool, DbError> {
	let in_memory = database_url.contains(":memory:");

	let mut options = SqliteConnectOptions::from_str(database_url)
		.map_err(|e| DbError::Internal(format!("Invalid database URL: {e}")))?
		.foreign_keys(true)
		.create_if_missing(true);
	if !in_memory {
		options = options
			.journal_mode(SqliteJournalMode::Wal)
			.synchronous(SqliteSynchronous::Normal);
	}

	let mut pool_options = SqlitePoolOptions::new().max_connections(max_connections.max(1));
	if in_memory {
		pool_options = pool_options
			.max_connections(1)
			.idle_timeout(None)
			.max_lifetime(None);
	}

	let pool = pool_options.connect_with(options).await?;

	tracing::debug!(in_memory, "database pool created");
	Ok(pool)
}
