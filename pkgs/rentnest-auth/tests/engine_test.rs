//! Login control flow against a scripted backend
//!
//! Covers payload normalization through the engine, the role probe cascade,
//! the ambiguous-role prompt, and single-flight protection of `login`.

mod common;

use common::{memory_store, FakeApi, Reply};
use rentnest_auth::keys;
use rentnest_auth::{
    AuthConfig, AuthError, LoginOutcome, Role, RoleProbe, RoleResolution, RoleResolver,
    SessionEngine,
};
use rentnest_store::{KeyValueStore, StoreOp};
use serde_json::json;
use std::sync::Arc;

fn engine(api: Arc<FakeApi>) -> (SessionEngine, Arc<rentnest_store::MemoryKeyValueStore>) {
    let kv = memory_store();
    let engine = SessionEngine::new(AuthConfig::default(), api, kv.clone());
    (engine, kv)
}

fn authenticated(outcome: LoginOutcome) -> rentnest_auth::Session {
    match outcome {
        LoginOutcome::Authenticated(session) => session,
        other => panic!("expected an authenticated login, got {:?}", other),
    }
}

#[tokio::test]
async fn test_enveloped_tenant_login() {
    let api = FakeApi::new();
    api.answer_login(Reply::Json(json!({
        "data": {"tenant": {"name": "Amy"}, "access_token": "t1"}
    })));
    api.answer_probe(RoleProbe::TenantProfile, json!({"name": "Amy"}));
    let (engine, kv) = engine(api.clone());

    let session = authenticated(engine.login("amy@example.com", "pw").await.unwrap());

    assert_eq!(session.token, "t1");
    assert_eq!(session.name, "Amy");
    assert_eq!(session.role, Role::Tenant);
    assert!(session.verified);
    assert_eq!(kv.get(keys::ACCESS_TOKEN).await.unwrap().as_deref(), Some("t1"));
    assert_eq!(kv.get(keys::ROLE).await.unwrap().as_deref(), Some("tenant"));
}

#[tokio::test]
async fn test_embedded_role_skips_probes() {
    let api = FakeApi::new();
    api.answer_login(Reply::Json(json!({
        "user": {"_id": "u1", "name": "Lee", "role": "landlord"},
        "token": "t2"
    })));
    // A probe that would contradict the embedded role
    api.answer_probe(RoleProbe::Users, json!({"role": "tenant"}));
    let (engine, _kv) = engine(api.clone());

    let session = authenticated(engine.login("lee@example.com", "pw").await.unwrap());

    assert_eq!(session.role, Role::Landlord);
    assert!(api.probed().is_empty());
}

#[tokio::test]
async fn test_invalid_response_writes_nothing() {
    let api = FakeApi::new();
    api.answer_login(Reply::Json(json!({"message": "ok"})));
    let (engine, kv) = engine(api);

    let err = engine.login("amy@example.com", "pw").await.unwrap_err();

    assert!(matches!(err, AuthError::InvalidResponse(_)));
    assert_eq!(kv.write_count(), 0);
    assert!(engine.restore().await.unwrap().is_none());
}

#[tokio::test]
async fn test_login_wipes_previous_account_first() {
    let api = FakeApi::new();
    api.answer_login(Reply::Json(json!({
        "landlord": {"name": "Lee"}, "token": "old", "role": "landlord"
    })));
    let (engine, kv) = engine(api.clone());
    engine.login("lee@example.com", "pw").await.unwrap();
    assert!(kv.get(keys::LANDLORD_INFO).await.unwrap().is_some());

    api.answer_login(Reply::Reject(401, "Invalid credentials"));
    let err = engine.login("amy@example.com", "bad").await.unwrap_err();

    assert_eq!(err.user_message(), "Invalid credentials");
    assert!(kv.keys().is_empty());
    assert!(engine.sessions().current().is_none());
    assert!(kv
        .ops()
        .iter()
        .any(|op| matches!(op, StoreOp::RemoveAll(removed) if removed.len() == 12)));
}

#[tokio::test]
async fn test_role_switch_replaces_profile_slot() {
    let api = FakeApi::new();
    let (engine, kv) = engine(api.clone());

    api.answer_login(Reply::Json(json!({
        "landlord": {"name": "Lee"}, "token": "t1", "role": "landlord"
    })));
    engine.login("lee@example.com", "pw").await.unwrap();

    api.answer_login(Reply::Json(json!({
        "tenant": {"name": "Lee"}, "token": "t2", "role": "tenant"
    })));
    engine.login("lee@example.com", "pw").await.unwrap();

    assert!(kv.get(keys::LANDLORD_INFO).await.unwrap().is_none());
    assert!(kv.get(keys::TENANT_INFO).await.unwrap().is_some());
}

#[tokio::test]
async fn test_both_role_payloads_prompt_for_a_choice() {
    let api = FakeApi::new();
    api.answer_login(Reply::Json(json!({
        "landlord": {"name": "Lee (owner)"},
        "tenant": {"name": "Lee (renter)"},
        "token": "t3"
    })));
    let (engine, kv) = engine(api.clone());

    let pending = match engine.login("lee@example.com", "pw").await.unwrap() {
        LoginOutcome::ChooseRole(pending) => pending,
        other => panic!("expected a role prompt, got {:?}", other),
    };
    assert_eq!(pending.candidates(), vec![Role::Landlord, Role::Tenant]);
    assert_eq!(kv.write_count(), 0);
    assert!(api.probed().is_empty());

    let session = engine
        .complete_role_choice(pending, Role::Tenant)
        .await
        .unwrap();
    assert_eq!(session.role, Role::Tenant);
    assert_eq!(session.name, "Lee (renter)");

    let restored = engine.restore().await.unwrap().unwrap();
    assert_eq!(restored.role, Role::Tenant);
    assert_eq!(restored.token, "t3");
}

#[tokio::test]
async fn test_newer_login_supersedes_open_role_choice() {
    let api = FakeApi::new();
    api.answer_login(Reply::Json(json!({
        "landlord": {"name": "A-owner"},
        "tenant": {"name": "A-renter"},
        "token": "tokA"
    })));
    let (engine, kv) = engine(api.clone());

    let LoginOutcome::ChooseRole(pending) = engine.login("a@example.com", "pw").await.unwrap()
    else {
        panic!("expected a role prompt");
    };

    api.answer_login(Reply::Json(json!({
        "tenant": {"name": "B"}, "token": "tokB", "role": "tenant"
    })));
    engine.login("b@example.com", "pw").await.unwrap();

    let err = engine
        .complete_role_choice(pending, Role::Landlord)
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::LoginSuperseded));
    let restored = engine.restore().await.unwrap().unwrap();
    assert_eq!(restored.token, "tokB");
    assert_eq!(restored.name, "B");
    assert!(kv.get(keys::LANDLORD_INFO).await.unwrap().is_none());
}

#[tokio::test]
async fn test_role_choice_completes_once_and_clears_stale_keys() {
    let api = FakeApi::new();
    api.answer_login(Reply::Json(json!({
        "landlord": {"name": "Lee"}, "tenant": {"name": "Lee"}, "token": "t5"
    })));
    let (engine, kv) = engine(api);

    let LoginOutcome::ChooseRole(pending) = engine.login("lee@example.com", "pw").await.unwrap()
    else {
        panic!("expected a role prompt");
    };
    // Written by another screen while the prompt was open
    kv.set(keys::SAVED_PROPERTIES, "[\"p9\"]").await.unwrap();

    engine
        .complete_role_choice(pending.clone(), Role::Landlord)
        .await
        .unwrap();
    assert!(kv.get(keys::SAVED_PROPERTIES).await.unwrap().is_none());

    let err = engine
        .complete_role_choice(pending, Role::Tenant)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::LoginSuperseded));
    assert_eq!(engine.restore().await.unwrap().unwrap().role, Role::Landlord);
}

#[tokio::test]
async fn test_concurrent_login_is_rejected() {
    let api = FakeApi::new();
    api.answer_login(Reply::Json(json!({
        "user": {"name": "Amy", "role": "tenant"}, "token": "t1"
    })));
    let gate = api.gate_login();
    let (engine, _kv) = engine(api.clone());

    let (first, second, _) = tokio::join!(
        engine.login("amy@example.com", "pw"),
        engine.login("amy@example.com", "pw"),
        async {
            tokio::task::yield_now().await;
            gate.notify_one();
        }
    );

    assert!(first.is_ok());
    assert!(matches!(second, Err(AuthError::InFlight("login"))));
    assert_eq!(api.calls(), vec!["login"]);

    // The guard is released once the first call finishes
    gate.notify_one();
    assert!(engine.login("amy@example.com", "pw").await.is_ok());
}

#[tokio::test]
async fn test_defaulted_role_is_marked_unverified() {
    let api = FakeApi::new();
    api.answer_login(Reply::Json(json!({"user": {"name": "Amy"}, "token": "t1"})));
    let (engine, _kv) = engine(api.clone());

    let session = authenticated(engine.login("amy@example.com", "pw").await.unwrap());

    assert_eq!(session.role, Role::Tenant);
    assert!(!session.verified);
    assert_eq!(api.probed(), RoleProbe::CASCADE.to_vec());
}

#[tokio::test]
async fn test_resolver_defaults_to_tenant_when_every_probe_fails() {
    let api = FakeApi::new();
    let resolver = RoleResolver::new(api.clone());

    let resolution = resolver.resolve("t1").await;

    assert_eq!(resolution, RoleResolution::Defaulted(Role::Tenant));
    assert_eq!(api.probed().len(), 4);
}

#[tokio::test]
async fn test_resolver_respects_cascade_order() {
    let api = FakeApi::new();
    api.answer_probe(RoleProbe::LandlordProperties, json!([]));
    let resolver = RoleResolver::new(api.clone());

    let resolution = resolver.resolve("t1").await;

    assert_eq!(
        resolution,
        RoleResolution::Resolved {
            role: Role::Landlord,
            probe: RoleProbe::LandlordProperties
        }
    );
    assert_eq!(api.probed(), RoleProbe::CASCADE.to_vec());
}

#[tokio::test]
async fn test_generic_profile_without_role_falls_through() {
    let api = FakeApi::new();
    api.answer_probe(RoleProbe::Users, json!({"name": "Amy"}));
    api.answer_probe(RoleProbe::TenantProfile, json!({}));
    api.answer_probe(RoleProbe::LandlordProperties, json!([]));
    let resolver = RoleResolver::new(api.clone());

    let resolution = resolver.try_resolve("t1").await.unwrap();

    assert_eq!(resolution.role(), Role::Tenant);
    assert!(resolution.is_confident());
    assert_eq!(
        api.probed(),
        vec![RoleProbe::Users, RoleProbe::LandlordProfile, RoleProbe::TenantProfile]
    );
}
