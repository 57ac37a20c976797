mod common;

use std::sync::Arc;
use std::time::Duration;

use axion::authorization::{AuthorizationEngine, POLICY_UPDATE_TOPIC};
use axion_config::PolicyConfig;
use axion_core::ManualClock;
use axion_models::{Actor, AuditEvent};
use axion_store::{DataStore, MemoryKv, MemoryPubSub, PolicyStore, PubSub, keys};
use axum::http::StatusCode;
use common::{OTHER_SCHOOL_ID, SCHOOL_ID, spawn_app};
use serde_json::json;

fn engines() -> (AuthorizationEngine, AuthorizationEngine, DataStore, Arc<ManualClock>) {
    let clock = ManualClock::starting_now();
    let store = DataStore::new(Arc::new(MemoryKv::new(clock.clone())), clock.clone());
    let pubsub: Arc<dyn PubSub> = Arc::new(MemoryPubSub::new());
    let config = PolicyConfig::default();

    let build = || {
        AuthorizationEngine::new(Arc::new(store.clone()), clock.clone(), &config)
            .with_audit(Arc::new(store.clone()))
            .with_pubsub(pubsub.clone())
    };
    (build(), build(), store, clock)
}

fn school_admin(school: &str) -> Actor {
    Actor::new("admin-1", "school_admin", Some(school.to_string()))
}

fn superadmin() -> Actor {
    Actor::new("root-1", "superadmin", None)
}

#[tokio::test]
async fn test_defaults_are_seeded_on_first_read() {
    let (engine, _, store, _) = engines();

    assert!(engine.has_permission(&superadmin(), "school", "config").await.unwrap());
    assert!(engine.has_permission(&school_admin(SCHOOL_ID), "classroom", "create").await.unwrap());
    assert!(!engine.has_permission(&school_admin(SCHOOL_ID), "user", "create").await.unwrap());

    let docs = store.list_role_permissions().await.unwrap();
    assert_eq!(docs.len(), 2);
    assert!(store.policy_version().await.unwrap().is_some());
}

#[tokio::test]
async fn test_global_permission_requires_superadmin() {
    let (engine, _, _, _) = engines();
    engine
        .set_role_permissions("school_admin", &["school:create".to_string()], None)
        .await
        .unwrap();

    let admin = school_admin(SCHOOL_ID);
    assert!(engine.has_permission(&admin, "school", "create").await.unwrap());
    assert!(!engine.has_global_permission(&admin, "school", "create").await.unwrap());
    assert!(engine.has_global_permission(&superadmin(), "school", "create").await.unwrap());
}

#[tokio::test]
async fn test_school_scope() {
    let (engine, _, _, _) = engines();
    let admin = school_admin(SCHOOL_ID);

    assert!(engine.can_access_classroom(&admin, Some(SCHOOL_ID), "read").await.unwrap());
    assert!(!engine.can_access_classroom(&admin, Some(OTHER_SCHOOL_ID), "read").await.unwrap());
    assert!(!engine.can_access_student(&admin, None, "read").await.unwrap());
    assert!(engine.can_access_school(&superadmin(), Some(OTHER_SCHOOL_ID), "config").await.unwrap());
    assert!(engine.can_list_users_in_school(&admin, Some(SCHOOL_ID)).await.unwrap());
    assert!(!engine.can_list_users_in_school(&admin, Some(OTHER_SCHOOL_ID)).await.unwrap());
}

#[tokio::test]
async fn test_set_role_permissions_validates_and_dedups() {
    let (engine, _, store, _) = engines();

    let err = engine.set_role_permissions("", &["school:read".to_string()], None).await.unwrap_err();
    assert_eq!(err.to_string(), "role is required");

    let err = engine.set_role_permissions("school_admin", &[], None).await.unwrap_err();
    assert_eq!(err.to_string(), "permissions must be a non-empty array");

    let before = store.policy_version().await.unwrap();
    let write = engine
        .set_role_permissions(
            "school_admin",
            &["school:read".to_string(), " school:read ".to_string(), "user:read".to_string()],
            Some("root-1"),
        )
        .await
        .unwrap();
    assert_eq!(write.permissions, vec!["school:read", "user:read"]);
    assert_ne!(Some(write.version.clone()), before);
    assert_eq!(
        engine.get_role_permissions("school_admin").await.unwrap(),
        vec!["school:read", "user:read"]
    );

    let audits: Vec<AuditEvent> = store.list_typed(keys::AUDIT_LOGS).await.unwrap();
    let audit = audits
        .iter()
        .find(|a| a.action == "authorization.set_role_permissions")
        .unwrap();
    assert_eq!(audit.actor_id.as_deref(), Some("root-1"));
}

#[tokio::test]
async fn test_second_instance_converges_after_update() {
    let (writer, reader, _, _) = engines();
    reader.start_listener().await.unwrap();

    let admin = school_admin(SCHOOL_ID);
    assert!(reader.has_permission(&admin, "classroom", "create").await.unwrap());

    writer
        .set_role_permissions("school_admin", &["school:read".to_string()], None)
        .await
        .unwrap();

    let mut converged = false;
    for _ in 0..50 {
        if !reader.has_permission(&admin, "classroom", "create").await.unwrap() {
            converged = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(converged, "reader never observed the policy update");
}

#[tokio::test]
async fn test_remote_update_with_same_version_is_ignored() {
    let (engine, _, store, _) = engines();
    let admin = school_admin(SCHOOL_ID);
    assert!(engine.has_permission(&admin, "user", "read").await.unwrap());

    let version = store.policy_version().await.unwrap();
    store
        .upsert_role_permissions("school_admin", &["school:read".to_string()])
        .await
        .unwrap();
    engine
        .apply_remote_update(axion_models::PolicyUpdate { version, role: None })
        .await;

    // Same version: snapshot kept
    assert!(engine.has_permission(&admin, "user", "read").await.unwrap());
}

#[tokio::test]
async fn test_direct_store_changes_wait_for_ttl() {
    let (engine, _, store, clock) = engines();
    let admin = school_admin(SCHOOL_ID);
    assert!(engine.has_permission(&admin, "user", "read").await.unwrap());

    store
        .upsert_role_permissions("school_admin", &["school:read".to_string()])
        .await
        .unwrap();
    store.set_policy_version(None).await.unwrap();

    clock.advance_secs(5);
    assert!(engine.has_permission(&admin, "user", "read").await.unwrap());

    clock.advance_secs(30);
    assert!(!engine.has_permission(&admin, "user", "read").await.unwrap());
}

#[tokio::test]
async fn test_listener_ignores_malformed_payloads() {
    let clock = ManualClock::starting_now();
    let store = DataStore::new(Arc::new(MemoryKv::new(clock.clone())), clock.clone());
    let pubsub = Arc::new(MemoryPubSub::new());
    let engine = AuthorizationEngine::new(Arc::new(store), clock, &PolicyConfig::default())
        .with_pubsub(pubsub.clone());

    let handle = engine.start_listener().await.unwrap();
    assert!(handle.is_some());
    pubsub.publish(POLICY_UPDATE_TOPIC, "not json").await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(engine.has_permission(&superadmin(), "user", "config").await.unwrap());
}

#[tokio::test]
async fn test_policy_endpoints() {
    let app = spawn_app();
    app.seed_schools().await;
    let (root, _, _) = app.bootstrap_superadmin().await;
    let (admin, _, _) = app.school_admin(&root, "north@axion.test", SCHOOL_ID).await;

    let (status, body) = app.get("/api/authorization/v1_listRolePermissions", Some(&root)).await;
    assert_eq!(status, StatusCode::OK);
    let roles = body["data"]["roles"].as_array().unwrap();
    assert!(roles.iter().any(|r| r["role"] == "school_admin"));

    let (status, _) = app.get("/api/authorization/v1_listRolePermissions", Some(&admin)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .post(
            "/api/authorization/v1_setRolePermissions",
            Some(&root),
            json!({ "role": "janitor", "permissions": ["school:read"] }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"], json!(["role must be one of: superadmin, school_admin"]));

    let (status, body) = app
        .post(
            "/api/authorization/v1_setRolePermissions",
            Some(&root),
            json!({ "role": "school_admin", "permissions": [] }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "permissions must be a non-empty array");

    let (status, body) = app
        .post(
            "/api/authorization/v1_setRolePermissions",
            Some(&root),
            json!({ "role": "school_admin", "permissions": ["school:read"] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["permissions"], json!(["school:read"]));

    // user:read was removed, so listing users is now denied
    let (status, _) = app.get("/api/auth/v1_listUsers", Some(&admin)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
