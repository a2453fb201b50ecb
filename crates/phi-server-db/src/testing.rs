// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use sqlx::sqlite::SqlitePool;

use crate::pool::create_pool;
use crate::schema::ensure_schema;

/// Single-connection in-memory pool with the full schema applied.
pub async fn create_test_pool() -> SqlitePool {
	let pool = create_pool("sqlite::memory:", 1).await.unwrap();
	ensure_schema(&pool).await.unwrap();
	pool
}
