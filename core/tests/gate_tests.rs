// tests/gate_tests.rs
mod common;
use common::*;
use serial_test::serial;
use shopfront::gate::{DenyReason, RoleUpdate, ADMIN_LOGIN_PATH};
use shopfront::models::Role;
use shopfront::{AuthEvent, GateDecision, RoleGate};

#[tokio::test]
#[serial]
async fn unknown_token_is_sent_to_login() {
  setup_tracing();
  let (_memory, backend) = memory();
  let gate = RoleGate::new(&backend);

  let decision = gate.authorize("not-a-token").await.unwrap();

  assert_eq!(
    decision,
    GateDecision::RedirectToLogin {
      reason: DenyReason::NoSession
    }
  );
  assert_eq!(decision.redirect_path(), Some(ADMIN_LOGIN_PATH));
}

#[tokio::test]
#[serial]
async fn admin_is_let_in_and_cached() {
  setup_tracing();
  let (memory, backend) = memory();
  let admin = seed_admin(&memory);
  let session = backend
    .identity
    .sign_in_with_password("admin@shop.test", "admin-pass")
    .await
    .unwrap();
  let gate = RoleGate::new(&backend);

  let decision = gate.authorize(&session.access_token).await.unwrap();

  assert!(decision.is_allowed());
  assert_eq!(decision.redirect_path(), None);
  assert_eq!(gate.cached_role(admin.id), Some(Role::Admin));
}

#[tokio::test]
#[serial]
async fn customer_is_signed_out_and_redirected() {
  setup_tracing();
  let (_memory, backend) = memory();
  let storefront = customer_storefront(&backend).await;
  let token = storefront.session().unwrap().access_token.clone();
  let mut auth_events = backend.identity.subscribe();
  let gate = RoleGate::new(&backend);

  let decision = gate.authorize(&token).await.unwrap();

  assert_eq!(
    decision,
    GateDecision::RedirectToLogin {
      reason: DenyReason::NotAdmin
    }
  );
  assert!(backend.identity.get_session(&token).await.unwrap().is_none());
  assert_eq!(
    auth_events.recv().await.unwrap(),
    AuthEvent::SignedOut {
      user_id: storefront.user_id().unwrap()
    }
  );
}

#[tokio::test]
#[serial]
async fn account_without_profile_counts_as_customer() {
  setup_tracing();
  let (_memory, backend) = memory();
  let session = backend.identity.sign_up("nobody@example.com", "secret1").await.unwrap();
  let gate = RoleGate::new(&backend);

  let decision = gate.authorize(&session.access_token).await.unwrap();

  assert!(!decision.is_allowed());
  assert_eq!(gate.cached_role(session.user.id), Some(Role::Customer));
}

#[tokio::test]
#[serial]
async fn demoted_admin_is_caught_by_background_revalidation() {
  setup_tracing();
  let (memory, backend) = memory();
  let admin = seed_admin(&memory);
  let session = backend
    .identity
    .sign_in_with_password("admin@shop.test", "admin-pass")
    .await
    .unwrap();
  let gate = RoleGate::new(&backend);
  let mut updates = gate.subscribe();

  assert!(gate.authorize(&session.access_token).await.unwrap().is_allowed());

  backend
    .store
    .upsert_profile(admin.id, &admin.email, Role::Customer)
    .await
    .unwrap();

  // The cached role still answers, the refresh runs behind it.
  assert!(gate.authorize(&session.access_token).await.unwrap().is_allowed());
  settle().await;

  assert_eq!(
    updates.try_recv().unwrap(),
    RoleUpdate {
      user_id: admin.id,
      role: Role::Customer
    }
  );
  assert_eq!(gate.cached_role(admin.id), Some(Role::Customer));
  assert_eq!(
    gate.authorize(&session.access_token).await.unwrap(),
    GateDecision::RedirectToLogin {
      reason: DenyReason::NoSession
    }
  );
}

#[tokio::test]
#[serial]
async fn revalidation_with_unchanged_role_is_silent() {
  setup_tracing();
  let (memory, backend) = memory();
  let admin = seed_admin(&memory);
  let session = backend
    .identity
    .sign_in_with_password("admin@shop.test", "admin-pass")
    .await
    .unwrap();
  let gate = RoleGate::new(&backend);
  gate.authorize(&session.access_token).await.unwrap();
  let mut updates = gate.subscribe();

  let role = gate.revalidate(admin.id, &session.access_token).await.unwrap();

  assert_eq!(role, Role::Admin);
  assert!(updates.try_recv().is_err());
  assert!(backend.identity.get_session(&session.access_token).await.unwrap().is_some());
}

#[tokio::test]
#[serial]
async fn fresh_check_refuses_a_demoted_admin_at_once() {
  setup_tracing();
  let (memory, backend) = memory();
  let admin = seed_admin(&memory);
  let session = backend
    .identity
    .sign_in_with_password("admin@shop.test", "admin-pass")
    .await
    .unwrap();
  let gate = RoleGate::new(&backend);
  assert!(gate.authorize_fresh(&session.access_token).await.unwrap().is_allowed());
  assert_eq!(gate.cached_role(admin.id), Some(Role::Admin));
  let mut updates = gate.subscribe();

  backend
    .store
    .upsert_profile(admin.id, &admin.email, Role::Customer)
    .await
    .unwrap();

  assert_eq!(
    gate.authorize_fresh(&session.access_token).await.unwrap(),
    GateDecision::RedirectToLogin {
      reason: DenyReason::NotAdmin
    }
  );
  assert_eq!(gate.cached_role(admin.id), Some(Role::Customer));
  assert_eq!(
    updates.try_recv().unwrap(),
    RoleUpdate {
      user_id: admin.id,
      role: Role::Customer
    }
  );
  assert!(backend.identity.get_session(&session.access_token).await.unwrap().is_none());
}
