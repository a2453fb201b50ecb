// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use http::{Method, StatusCode};
use phi_server_audit::{AuditAction, AuditSink, RecordOutcome};
use phi_server_config::ServerConfig;
use phi_server_db::AuditQuery;
use serde_json::json;

use super::support::{BrokenSink, World};

#[tokio::test]
async fn patient_read_is_recorded_with_request_context() {
	let world = World::new().await;
	let ctx = world.ctx(world.provider);
	let path = format!("/api/patients/{}", world.patient.id);

	let status = world
		.engine
		.finish_request(&ctx, &Method::GET, &path, StatusCode::OK, Some(json!({"ignored": true})));
	assert_eq!(status, StatusCode::OK);

	let query = AuditQuery {
		actor_user_id: Some(world.provider),
		..AuditQuery::default()
	};
	let page = world.wait_for_events(&query, 1).await;
	assert_eq!(page.total, 1);

	let event = &page.events[0];
	assert_eq!(event.action_type, AuditAction::Read);
	assert_eq!(event.resource_type, "patient");
	assert_eq!(event.resource_id, Some(*world.patient.id.as_uuid()));
	assert_eq!(event.organization_id, Some(world.org));
	assert_eq!(event.ip_address.as_deref(), Some("10.1.2.3"));
	assert_eq!(event.user_agent.as_deref(), Some("phi-tests/1.0"));
	assert_eq!(event.request_id.as_deref(), ctx.request_id());
	assert_eq!(event.changes, None);
}

#[tokio::test]
async fn write_carries_its_change_summary() {
	let world = World::new().await;
	let ctx = world.ctx(world.proxy);
	let path = format!(
		"/api/organizations/{}/patients/{}/appointments",
		world.org, world.patient.id
	);

	world.engine.finish_request(
		&ctx,
		&Method::POST,
		&path,
		StatusCode::CREATED,
		Some(json!({"scheduled_for": "2026-11-02T09:00:00Z"})),
	);

	let query = AuditQuery {
		action_type: Some(AuditAction::Create),
		..AuditQuery::default()
	};
	let page = world.wait_for_events(&query, 1).await;
	let event = &page.events[0];
	assert_eq!(event.resource_type, "appointment");
	assert_eq!(event.resource_id, None);
	assert_eq!(
		event.changes,
		Some(json!({"scheduled_for": "2026-11-02T09:00:00Z"}))
	);
}

#[tokio::test]
async fn excluded_route_and_failed_request_leave_no_trace() {
	let world = World::new().await;
	let ctx = world.ctx(world.provider);

	let health = world
		.engine
		.recorder
		.record(&ctx, &Method::GET, "/health", StatusCode::OK, None)
		.await;
	assert!(health.is_skipped());

	let failed = world
		.engine
		.recorder
		.record(
			&ctx,
			&Method::GET,
			&format!("/api/patients/{}", world.patient.id),
			StatusCode::INTERNAL_SERVER_ERROR,
			None,
		)
		.await;
	assert!(failed.is_skipped());

	assert_eq!(
		world.engine.finish_request(&ctx, &Method::GET, "/healthz", StatusCode::OK, None),
		StatusCode::OK
	);

	let page = world
		.engine
		.audit_log
		.query_events(&AuditQuery::default())
		.await
		.unwrap();
	assert_eq!(page.total, 0);
	assert_eq!(world.engine.recorder.health().events_dispatched, 0);
}

#[tokio::test]
async fn failing_sink_does_not_change_the_response() {
	let broken = Arc::new(BrokenSink::default());
	let world = World::build(
		ServerConfig::default(),
		vec![broken.clone() as Arc<dyn AuditSink>],
	)
	.await;
	let ctx = world.ctx(world.patient_user);

	let status = world.engine.finish_request(
		&ctx,
		&Method::GET,
		"/api/me/appointments",
		StatusCode::OK,
		None,
	);
	assert_eq!(status, StatusCode::OK);

	let page = world.wait_for_events(&AuditQuery::default(), 1).await;
	assert_eq!(page.total, 1);

	let outcome = world
		.engine
		.recorder
		.record(&ctx, &Method::GET, "/api/me/appointments", StatusCode::OK, None)
		.await;
	match outcome {
		RecordOutcome::Recorded(report) => {
			assert_eq!(report.delivered, 1);
			assert_eq!(report.failures.len(), 1);
		}
		other => panic!("expected an inline record, got {other:?}"),
	}

	assert_eq!(broken.calls(), 2);

	// the background dispatch settles its counters after the row is visible
	let mut consecutive = 0;
	for _ in 0..100 {
		let health = world.engine.recorder.health();
		consecutive = health
			.sinks
			.iter()
			.find(|s| s.name == "broken")
			.map(|s| s.consecutive_failures)
			.unwrap_or_default();
		if consecutive == 2 {
			break;
		}
		tokio::time::sleep(std::time::Duration::from_millis(10)).await;
	}
	assert_eq!(consecutive, 2);
}

#[tokio::test]
async fn persistent_sink_failure_raises_an_alert_and_keeps_retrying() {
	let broken = Arc::new(BrokenSink::default());
	let mut config = ServerConfig::default();
	config.audit.alert_after_failures = 2;
	let world = World::build(config, vec![broken.clone() as Arc<dyn AuditSink>]).await;
	let ctx = world.ctx(world.provider);
	let path = format!("/api/patients/{}", world.patient.id);

	for _ in 0..3 {
		world
			.engine
			.recorder
			.record(&ctx, &Method::GET, &path, StatusCode::OK, None)
			.await;
	}

	let health = world.engine.recorder.health();
	assert!(!health.is_healthy());
	assert_eq!(health.append_failures, 3);
	assert_eq!(broken.calls(), 3);

	let sqlite = health.sinks.iter().find(|s| s.name == "sqlite").unwrap();
	assert_eq!(sqlite.consecutive_failures, 0);
	assert!(!sqlite.alerting);
}

#[tokio::test]
async fn stored_events_reject_tampering() {
	let world = World::new().await;
	let ctx = world.ctx(world.provider);
	world
		.engine
		.recorder
		.record(
			&ctx,
			&Method::DELETE,
			&format!("/api/patients/{}", world.patient.id),
			StatusCode::NO_CONTENT,
			None,
		)
		.await;

	let update = sqlx::query("UPDATE audit_events SET action_type = 'READ'")
		.execute(&world.engine.pool)
		.await;
	assert!(update.is_err());
	let delete = sqlx::query("DELETE FROM audit_events")
		.execute(&world.engine.pool)
		.await;
	assert!(delete.is_err());

	let page = world
		.engine
		.audit_log
		.query_events(&AuditQuery::default())
		.await
		.unwrap();
	assert_eq!(page.total, 1);
	assert_eq!(page.events[0].action_type, AuditAction::Delete);
}
