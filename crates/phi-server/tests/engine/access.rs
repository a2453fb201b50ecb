// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{Duration, Utc};
use phi_server::ServerError;
use phi_server_auth::{
	AccessError, Action, AllowRule, Decision, GrantId, OrgId, PatientId, PatientScope, Permission,
	PermissionSet, ResourceKind, ResourceRef, Role, UserId,
};

use super::support::{ctx_in, World};

#[tokio::test]
async fn provider_is_allowed_every_action_whatever_the_delegation_state() {
	let world = World::new().await;
	let grant = world
		.grant(world.provider, &world.patient, PermissionSet::empty())
		.await;
	world.engine.delegations.revoke(grant.id).await.unwrap();

	let ctx = world.ctx(world.provider);
	for action in Action::all() {
		let decision = world
			.engine
			.gate
			.require(&ctx, *action, &world.patient_resource(ResourceKind::Patient))
			.await
			.unwrap();
		assert_eq!(
			decision,
			Decision::allow(AllowRule::OrgRole {
				role: Role::Provider
			})
		);
	}
}

#[tokio::test]
async fn linked_patient_is_allowed_on_their_own_record() {
	let world = World::new().await;
	let ctx = world.ctx(world.patient_user);

	for action in Action::all() {
		let resource = world.patient_resource(ResourceKind::ClinicalNote);
		assert!(world.engine.gate.require(&ctx, *action, &resource).await.is_ok());
	}
}

#[tokio::test]
async fn linked_patient_is_recognised_from_plain_identifiers() {
	let world = World::new().await;
	let ctx = world.ctx(world.patient_user);
	let resource = ResourceRef::patient(world.org, world.patient.id);

	for action in Action::all() {
		assert_eq!(
			world.engine.gate.require(&ctx, *action, &resource).await,
			Ok(Decision::allow(AllowRule::SelfAccess))
		);
	}
}

#[tokio::test]
async fn patient_cannot_claim_another_patients_record() {
	let world = World::new().await;
	let neighbour = UserId::generate();
	world
		.engine
		.memberships
		.add_member(world.org, neighbour, Role::Patient)
		.await
		.unwrap();
	let own = world
		.engine
		.patients
		.create_patient(world.org, Some(neighbour))
		.await
		.unwrap();

	let ctx = world.ctx(neighbour);
	let gate = &world.engine.gate;
	assert!(gate
		.require(&ctx, Action::ViewProfile, &own.resource(ResourceKind::Patient))
		.await
		.is_ok());
	assert_eq!(
		gate.require(&ctx, Action::ViewClinicalNotes, &world.patient_resource(ResourceKind::ClinicalNote))
			.await,
		Err(AccessError::Forbidden)
	);
}

#[tokio::test]
async fn revoked_grant_is_denied_before_its_expiry() {
	let world = World::new().await;
	let grant = world
		.grant_until(
			world.proxy,
			&world.patient,
			PermissionSet::all(),
			Some(Utc::now() + Duration::days(30)),
		)
		.await;
	world.engine.delegations.revoke(grant.id).await.unwrap();

	let ctx = world.ctx(world.proxy);
	for action in Action::all() {
		let result = world
			.engine
			.gate
			.require(&ctx, *action, &world.patient_resource(ResourceKind::Patient))
			.await;
		assert_eq!(result, Err(AccessError::Forbidden));
	}
}

#[tokio::test]
async fn expired_grant_is_denied_like_a_revoked_one() {
	let world = World::new().await;
	let past = (Utc::now() - Duration::hours(2)).to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
	sqlx::query(
		"INSERT INTO patient_proxy_assignments \
		 (id, proxy_user_id, patient_id, relationship, can_view_profile, can_view_appointments, \
		  granted_at, expires_at, updated_at) \
		 VALUES (?, ?, ?, 'parent', 1, 1, ?, ?, ?)",
	)
	.bind(GrantId::generate().to_string())
	.bind(world.proxy.to_string())
	.bind(world.patient.id.to_string())
	.bind(&past)
	.bind(&past)
	.bind(&past)
	.execute(&world.engine.pool)
	.await
	.unwrap();

	let ctx = world.ctx(world.proxy);
	let resource = world.patient_resource(ResourceKind::Patient);
	assert_eq!(
		world.engine.gate.require(&ctx, Action::ViewProfile, &resource).await,
		Err(AccessError::Forbidden)
	);
}

#[tokio::test]
async fn granted_bits_allow_and_missing_bit_denies() {
	let world = World::new().await;
	world
		.grant(
			world.proxy,
			&world.patient,
			PermissionSet::empty()
				.with(Permission::ViewAppointments)
				.with(Permission::ViewBilling),
		)
		.await;

	let ctx = world.ctx(world.proxy);
	let gate = &world.engine.gate;
	let appointments = world.patient_resource(ResourceKind::Appointment);
	let invoices = world.patient_resource(ResourceKind::Invoice);

	assert!(gate.require(&ctx, Action::ViewAppointments, &appointments).await.is_ok());
	assert!(gate.require(&ctx, Action::ViewBilling, &invoices).await.is_ok());
	assert_eq!(
		gate.require(&ctx, Action::ViewClinicalNotes, &appointments).await,
		Err(AccessError::Forbidden)
	);
}

#[tokio::test]
async fn scheduling_scenario_with_view_only_proxy() {
	let world = World::new().await;
	let grant = world
		.grant(
			world.proxy,
			&world.patient,
			PermissionSet::empty().with(Permission::ViewProfile),
		)
		.await;
	let gate = &world.engine.gate;
	let appointment = world.patient_resource(ResourceKind::Appointment);
	let profile = world.patient_resource(ResourceKind::Patient);

	assert!(gate
		.require(&world.ctx(world.provider), Action::ScheduleAppointment, &appointment)
		.await
		.is_ok());
	assert_eq!(
		gate.require(&world.ctx(world.proxy), Action::ScheduleAppointment, &appointment)
			.await,
		Err(AccessError::Forbidden)
	);
	assert!(gate
		.require(&world.ctx(world.proxy), Action::ViewProfile, &profile)
		.await
		.is_ok());

	world.engine.delegations.revoke(grant.id).await.unwrap();
	assert_eq!(
		gate.require(&world.ctx(world.proxy), Action::ViewProfile, &profile)
			.await,
		Err(AccessError::Forbidden)
	);
}

#[tokio::test]
async fn proxy_scope_contains_exactly_the_active_grants() {
	let world = World::new().await;
	let patients = &world.engine.patients;
	let a = patients.create_patient(world.org, None).await.unwrap();
	let b = patients.create_patient(world.org, None).await.unwrap();
	let c = patients.create_patient(world.org, None).await.unwrap();
	patients.create_patient(world.org, None).await.unwrap();

	let view = PermissionSet::empty().with(Permission::ViewProfile);
	world.grant(world.proxy, &a, view).await;
	world.grant(world.proxy, &b, view).await;
	let revoked = world.grant(world.proxy, &c, view).await;
	world.engine.delegations.revoke(revoked.id).await.unwrap();

	let ctx = world.ctx(world.proxy);
	let org = world.org;
	let listed = world
		.engine
		.gate
		.scoped(&ctx, org, |scope: PatientScope| async move {
			patients
				.list_in_scope(org, &scope, 50, 0)
				.await
				.map_err(ServerError::from)
		})
		.await
		.unwrap();

	let mut expected = vec![a.id, b.id];
	expected.sort();
	let ids: Vec<_> = listed.iter().map(|p| p.id).collect();
	assert_eq!(ids, expected);
}

#[tokio::test]
async fn provider_scope_lists_every_patient_in_the_org() {
	let world = World::new().await;
	world
		.engine
		.patients
		.create_patient(world.org, None)
		.await
		.unwrap();
	world
		.engine
		.patients
		.create_patient(OrgId::generate(), None)
		.await
		.unwrap();

	let ctx = world.ctx(world.provider);
	let patients = world.engine.patients.clone();
	let org = world.org;
	let listed = world
		.engine
		.gate
		.scoped(&ctx, org, |scope| async move {
			assert_eq!(scope, PatientScope::All);
			patients
				.list_in_scope(org, &scope, 50, 0)
				.await
				.map_err(ServerError::from)
		})
		.await
		.unwrap();
	assert_eq!(listed.len(), 2);
}

#[tokio::test]
async fn empty_scope_never_runs_the_query() {
	let world = World::new().await;
	let stranger = UserId::generate();
	let ran = AtomicBool::new(false);

	let listed: Vec<()> = world
		.engine
		.gate
		.scoped(&world.ctx(stranger), world.org, |_scope| async {
			ran.store(true, Ordering::SeqCst);
			Ok::<_, ServerError>(vec![()])
		})
		.await
		.unwrap();

	assert!(listed.is_empty());
	assert!(!ran.load(Ordering::SeqCst));
}

#[tokio::test]
async fn denial_does_not_reveal_whether_the_patient_exists() {
	let world = World::new().await;
	let stranger = ctx_in(UserId::generate(), world.org);
	let gate = &world.engine.gate;

	let real = gate
		.require(&stranger, Action::ViewProfile, &world.patient_resource(ResourceKind::Patient))
		.await
		.unwrap_err();
	let missing = gate
		.require(
			&stranger,
			Action::ViewProfile,
			&ResourceRef::patient(world.org, PatientId::generate()),
		)
		.await
		.unwrap_err();

	assert_eq!(real, missing);
	assert_eq!(real.to_string(), "not authorized");
	assert!(ServerError::from(real).is_forbidden());
}

#[tokio::test]
async fn storage_outage_fails_closed() {
	let world = World::new().await;
	world.engine.pool.close().await;

	let result = world
		.engine
		.gate
		.require(
			&world.ctx(world.provider),
			Action::ViewProfile,
			&world.patient_resource(ResourceKind::Patient),
		)
		.await;
	assert_eq!(result, Err(AccessError::Forbidden));

	let listed = world
		.engine
		.gate
		.scoped(&world.ctx(world.provider), world.org, |_scope| async {
			Ok::<Vec<()>, ServerError>(vec![()])
		})
		.await;
	assert!(matches!(listed, Err(e) if e.is_forbidden()));
}
