// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Application decisions against connection-level tenant filtering.

use phi_server_auth::{
	AccessError, Action, OrgId, Permission, PermissionSet, ResourceKind, ResourceRef, Role, UserId,
};
use phi_server_db::TenantSession;

use super::support::{ctx_in, World};

#[tokio::test]
async fn allowed_access_comes_with_a_bound_session_that_agrees() {
	let world = World::new().await;
	let ctx = world.ctx(world.provider);
	let resource = world.patient_resource(ResourceKind::Patient);

	let (decision, mut session) = world
		.engine
		.authorized_session(&ctx, Action::ViewProfile, &resource)
		.await
		.unwrap();

	assert!(decision.is_allowed());
	assert_eq!(session.bound(), Some((world.provider, world.org)));
	assert!(session.can_view_patient(world.patient.id).await.unwrap());
	session.release().await.unwrap();
}

/// Whether a connection bound to `(user, resource.org_id)` can see the
/// resource's patient.
async fn db_allows(world: &World, user: UserId, resource: &ResourceRef) -> bool {
	let patient_id = resource.patient_id.unwrap();
	let mut session = TenantSession::acquire(&world.engine.pool).await.unwrap();
	session.set_context(user, resource.org_id).await.unwrap();
	let visible = session.can_view_patient(patient_id).await.unwrap();
	session.release().await.unwrap();
	visible
}

#[tokio::test]
async fn both_layers_agree_on_profile_access() {
	let world = World::new().await;
	world
		.grant(
			world.proxy,
			&world.patient,
			PermissionSet::empty().with(Permission::ViewProfile),
		)
		.await;
	let billing_proxy = UserId::generate();
	world
		.grant(
			billing_proxy,
			&world.patient,
			PermissionSet::empty().with(Permission::ViewBilling),
		)
		.await;
	let stranger = UserId::generate();

	// A patient of the same organization with their own record.
	let neighbour = UserId::generate();
	world
		.engine
		.memberships
		.add_member(world.org, neighbour, Role::Patient)
		.await
		.unwrap();
	world
		.engine
		.patients
		.create_patient(world.org, Some(neighbour))
		.await
		.unwrap();

	// Staff of another organization.
	let other_org = OrgId::generate();
	let outsider = UserId::generate();
	world
		.engine
		.memberships
		.add_member(other_org, outsider, Role::Staff)
		.await
		.unwrap();

	let resources = [
		world.patient_resource(ResourceKind::Patient),
		ResourceRef::patient(world.org, world.patient.id),
		ResourceRef::patient(other_org, world.patient.id),
	];
	let users = [
		world.provider,
		world.patient_user,
		world.proxy,
		billing_proxy,
		stranger,
		neighbour,
		outsider,
	];

	for resource in &resources {
		for user in users {
			let app_allows = world
				.engine
				.gate
				.require(&ctx_in(user, resource.org_id), Action::ViewProfile, resource)
				.await
				.is_ok();
			let db_visible = db_allows(&world, user, resource).await;

			assert_eq!(
				app_allows, db_visible,
				"layers disagree for {user} on patient in {}",
				resource.org_id
			);
		}
	}

	// The linked user reaches their record from identifiers alone.
	let plain = ResourceRef::patient(world.org, world.patient.id);
	assert!(world
		.engine
		.gate
		.require(&world.ctx(world.patient_user), Action::ViewProfile, &plain)
		.await
		.is_ok());
}

#[tokio::test]
async fn forged_organization_is_denied_by_both_layers() {
	let world = World::new().await;

	// Staff in a different organization.
	let other_org = OrgId::generate();
	let attacker = UserId::generate();
	world
		.engine
		.memberships
		.add_member(other_org, attacker, Role::Staff)
		.await
		.unwrap();
	let ctx = ctx_in(attacker, other_org);

	let honest = world.patient_resource(ResourceKind::ClinicalNote);
	assert_eq!(
		world
			.engine
			.gate
			.require(&ctx, Action::ViewClinicalNotes, &honest)
			.await,
		Err(AccessError::Forbidden)
	);

	// Naming the attacker's own organization for the patient does not help.
	let forged = ResourceRef::of_patient(ResourceKind::ClinicalNote, other_org, world.patient.id);
	assert_eq!(
		world
			.engine
			.gate
			.require(&ctx, Action::ViewClinicalNotes, &forged)
			.await,
		Err(AccessError::Forbidden)
	);
	let denied = world
		.engine
		.authorized_session(&ctx, Action::ViewClinicalNotes, &forged)
		.await;
	assert!(matches!(denied, Err(e) if e.is_forbidden()));

	// A connection bound to the attacker's tenant hides the row as well.
	let mut session = TenantSession::bind(&world.engine.pool, &ctx).await.unwrap();
	assert!(!session.can_view_patient(world.patient.id).await.unwrap());
	assert!(!session
		.visible_patients()
		.await
		.unwrap()
		.contains(&world.patient.id));
	session.release().await.unwrap();
}

#[tokio::test]
async fn revocation_closes_both_layers_at_once() {
	let world = World::new().await;
	let grant = world
		.grant(world.proxy, &world.patient, PermissionSet::all())
		.await;
	let ctx = world.ctx(world.proxy);
	let resource = world.patient_resource(ResourceKind::Patient);

	let (_, mut session) = world
		.engine
		.authorized_session(&ctx, Action::ViewProfile, &resource)
		.await
		.unwrap();
	assert!(session.can_view_patient(world.patient.id).await.unwrap());

	world.engine.delegations.revoke(grant.id).await.unwrap();

	assert!(!session.can_view_patient(world.patient.id).await.unwrap());
	let denied = world
		.engine
		.authorized_session(&ctx, Action::ViewProfile, &resource)
		.await;
	assert!(matches!(denied, Err(e) if e.is_forbidden()));
}
