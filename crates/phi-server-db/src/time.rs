// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Timestamp text encoding.
//!
//! Every timestamp is stored as RFC 3339 UTC with millisecond precision and a
//! `Z` suffix, the same shape as `strftime('%Y-%m-%dT%H:%M:%fZ', 'now')`, so
//! text comparison in SQL orders correctly.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::DbError;

/// SQL expression for the current time in the stored format.
pub(crate) const SQL_NOW: &str = "strftime('%Y-%m-%dT%H:%M:%fZ', 'now')";

pub(crate) fn encode(dt: &DateTime<Utc>) -> String {
	dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn decode(value: &str, column: &str) -> Result<DateTime<Utc>, DbError> {
	DateTime::parse_from_rfc3339(value)
		.map(|dt| dt.with_timezone(&Utc))
		.map_err(|e| DbError::Internal(format!("Invalid {column}: {e}")))
}

pub(crate) fn decode_opt(value: Option<String>, column: &str) -> Result<Option<DateTime<Utc>>, DbError> {
	value.map(|v| decode(&v, column)).transpose()
}
