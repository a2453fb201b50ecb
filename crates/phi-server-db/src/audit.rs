// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Read side of the audit trail.
//!
//! Rows are written only by the audit sink. This repository has no update or
//! delete operation.

use chrono::{DateTime, Utc};
use phi_server_audit::{AuditAction, AuditEvent};
use phi_server_auth::{OrgId, UserId};
use sqlx::{sqlite::SqlitePool, QueryBuilder, Row, Sqlite};
use uuid::Uuid;

use crate::error::DbError;
use crate::patient::parse_id;
use crate::time;

pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 1000;

/// Filters for [`AuditRepository::query_events`]. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
	pub actor_user_id: Option<UserId>,
	pub organization_id: Option<OrgId>,
	pub resource_type: Option<String>,
	pub resource_id: Option<Uuid>,
	pub action_type: Option<AuditAction>,
	/// Inclusive lower bound on `occurred_at`.
	pub from: Option<DateTime<Utc>>,
	/// Exclusive upper bound on `occurred_at`.
	pub to: Option<DateTime<Utc>>,
	pub limit: Option<i64>,
	pub offset: Option<i64>,
}

/// One page of events, newest first, plus the unpaginated match count.
#[derive(Debug, Clone)]
pub struct AuditPage {
	pub events: Vec<AuditEvent>,
	pub total: i64,
}

#[derive(Clone)]
pub struct AuditRepository {
	pool: SqlitePool,
}

impl AuditRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	#[tracing::instrument(skip(self, query))]
	pub async fn query_events(&self, query: &AuditQuery) -> Result<AuditPage, DbError> {
		let limit = query
			.limit
			.unwrap_or(DEFAULT_PAGE_SIZE)
			.clamp(1, MAX_PAGE_SIZE);
		let offset = query.offset.unwrap_or(0).max(0);

		let mut count: QueryBuilder<Sqlite> =
			QueryBuilder::new("SELECT COUNT(*) AS total FROM audit_events WHERE 1 = 1");
		push_filters(&mut count, query);
		let total: i64 = count.build().fetch_one(&self.pool).await?.get("total");

		let mut select: QueryBuilder<Sqlite> = QueryBuilder::new(
			"SELECT id, actor_user_id, organization_id, resource_type, resource_id, action_type, \
			 ip_address, user_agent, impersonator_id, request_id, changes, occurred_at \
			 FROM audit_events WHERE 1 = 1",
		);
		push_filters(&mut select, query);
		select
			.push(" ORDER BY occurred_at DESC, id DESC LIMIT ")
			.push_bind(limit)
			.push(" OFFSET ")
			.push_bind(offset);

		let rows = select.build().fetch_all(&self.pool).await?;
		let events = rows.iter().map(row_to_event).collect::<Result<Vec<_>, _>>()?;

		tracing::debug!(returned = events.len(), total, "audit events queried");
		Ok(AuditPage { events, total })
	}

	#[tracing::instrument(skip(self), fields(event_id = %id))]
	pub async fn get_event(&self, id: Uuid) -> Result<Option<AuditEvent>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, actor_user_id, organization_id, resource_type, resource_id, action_type,
			       ip_address, user_agent, impersonator_id, request_id, changes, occurred_at
			FROM audit_events
			WHERE id = ?
			"#,
		)
		.bind(id.to_string())
		.fetch_optional(&self.pool)
		.await?;

		row.map(|r| row_to_event(&r)).transpose()
	}
}

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, query: &AuditQuery) {
	if let Some(actor) = query.actor_user_id {
		qb.push(" AND actor_user_id = ").push_bind(actor.to_string());
	}
	if let Some(org) = query.organization_id {
		qb.push(" AND organization_id = ").push_bind(org.to_string());
	}
	if let Some(resource_type) = &query.resource_type {
		qb.push(" AND resource_type = ").push_bind(resource_type.clone());
	}
	if let Some(resource_id) = query.resource_id {
		qb.push(" AND resource_id = ").push_bind(resource_id.to_string());
	}
	if let Some(action) = query.action_type {
		qb.push(" AND action_type = ").push_bind(action.as_str());
	}
	if let Some(from) = &query.from {
		qb.push(" AND occurred_at >= ").push_bind(time::encode(from));
	}
	if let Some(to) = &query.to {
		qb.push(" AND occurred_at < ").push_bind(time::encode(to));
	}
}

fn row_to_event(row: &sqlx::sqlite::SqliteRow) -> Result<AuditEvent, DbError> {
	let id: String = row.get("id");
	let actor: Option<String> = row.get("actor_user_id");
	let org: Option<String> = row.get("organization_id");
	let resource_id: Option<String> = row.get("resource_id");
	let action: String = row.get("action_type");
	let impersonator: Option<String> = row.get("impersonator_id");
	let changes: Option<String> = row.get("changes");
	let occurred_at: String = row.get("occurred_at");

	Ok(AuditEvent {
		id: parse_id(&id, "audit event id")?,
		actor_user_id: actor.map(|a| parse_id(&a, "actor_user_id")).transpose()?,
		organization_id: org.map(|o| parse_id(&o, "organization_id")).transpose()?,
		resource_type: row.get("resource_type"),
		resource_id: resource_id
			.map(|r| parse_id(&r, "resource_id"))
			.transpose()?,
		action_type: action.parse().map_err(DbError::Internal)?,
		ip_address: row.get("ip_address"),
		user_agent: row.get("user_agent"),
		impersonator_id: impersonator
			.map(|i| parse_id(&i, "impersonator_id"))
			.transpose()?,
		request_id: row.get("request_id"),
		changes: changes.map(|c| serde_json::from_str(&c)).transpose()?,
		occurred_at: time::decode(&occurred_at, "occurred_at")?,
	})
}
