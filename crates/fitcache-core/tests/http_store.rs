//! HTTP document store and plan generation against a mock backend.

use std::sync::Arc;

use anyhow::Result;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fitcache_core::api::ApiClient;
use fitcache_core::auth::SessionData;
use fitcache_core::cache::LocalMirror;
use fitcache_core::clock::system_clock;
use fitcache_core::config::Config;
use fitcache_core::models::{DietPlan, QuizData, Section};
use fitcache_core::remote::{DocumentStore, HttpDocumentStore, MemoryDocumentStore, RemoteError};
use fitcache_core::store::{Action, Store};
use fitcache_core::sync::{LoadOutcome, PlanOutcome, SyncService, GENERATE_PLANS_FALLBACK_ERROR};
use fitcache_core::{ConfigBinder, SessionBinder};

fn http_store(server: &MockServer) -> Result<HttpDocumentStore> {
    Ok(HttpDocumentStore::new(ApiClient::new(server.uri())?).with_token("secret"))
}

// ============================================================================
// Document Store
// ============================================================================

#[tokio::test]
async fn test_get_missing_document_is_none() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/u1"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let store = http_store(&server)?;
    assert!(store.get_document("users", "u1").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_get_document_sends_token_and_parses() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/u1"))
        .and(header("authorization", "Bearer secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "quizData": { "goal": ["perder-peso"], "version": 2 },
            "workoutPlan": { "days": [{ "name": "A", "exercises": [{ "name": "Agachamento", "sets": 4 }] }] }
        })))
        .mount(&server)
        .await;

    let document = http_store(&server)?
        .get_document("users", "u1")
        .await?
        .expect("document");
    assert_eq!(document.quiz_data.unwrap().version, Some(2));
    assert_eq!(document.workout_plan.unwrap().total_exercises(), 1);
    assert!(document.diet_plan.is_none());
    Ok(())
}

#[tokio::test]
async fn test_rejected_token_maps_to_unauthorized() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/u1"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = http_store(&server)?
        .get_document("users", "u1")
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteError::Unauthorized));
    assert!(!err.is_transient());
    Ok(())
}

#[tokio::test]
async fn test_merge_write_uses_patch() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/users/u1"))
        .and(query_param("merge", "true"))
        .and(body_json(json!({ "progressData": { "streakDays": 5 } })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    http_store(&server)?
        .set_document("users", "u1", json!({ "progressData": { "streakDays": 5 } }), true)
        .await?;
    Ok(())
}

#[tokio::test]
async fn test_commit_section_returns_committed_version() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/users/u1/commit"))
        .and(body_json(json!({
            "section": "quizData",
            "data": { "goal": ["perder-peso"] },
            "baseVersion": 2
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "version": 3 })))
        .expect(1)
        .mount(&server)
        .await;

    let version = http_store(&server)?
        .commit_section("users", "u1", Section::Quiz, json!({ "goal": ["perder-peso"] }), 2)
        .await?;
    assert_eq!(version, 3);
    Ok(())
}

#[tokio::test]
async fn test_commit_conflict_is_reported() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/users/u1/commit"))
        .respond_with(ResponseTemplate::new(409).set_body_string("stale base version"))
        .mount(&server)
        .await;

    let err = http_store(&server)?
        .commit_section("users", "u1", Section::Quiz, json!({}), 0)
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteError::Conflict(ref body) if body == "stale base version"));
    Ok(())
}

#[tokio::test]
async fn test_bound_remote_carries_session_token() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/u2"))
        .and(header("authorization", "Bearer t2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "quizData": { "goal": [] } })))
        .expect(1)
        .mount(&server)
        .await;

    let config = Config {
        remote_base_url: server.uri(),
        ..Default::default()
    };
    let binder = ConfigBinder::new(&config, system_clock())?;
    binder.bind(Some(&SessionData::new("u1", "t1")));
    let handles = binder.bind(Some(&SessionData::new("u2", "t2")));

    assert!(handles.remote.get_document("users", "u2").await?.is_some());
    Ok(())
}

// ============================================================================
// Plan Generation
// ============================================================================

/// A signed-in service with a held quiz, generating plans against `server`.
async fn plan_service(server: &MockServer, remote: MemoryDocumentStore) -> Result<SyncService> {
    let sync = SyncService::new(Arc::new(Store::default()), Arc::new(remote), LocalMirror::in_memory())
        .with_api(ApiClient::new(server.uri())?);
    sync.store()
        .dispatch_all([
            Action::AuthChanged(Some(SessionData::new("u1", "secret"))),
            Action::SetQuizData(QuizData {
                goal: vec!["perder-peso".to_string()],
                version: Some(1),
                ..Default::default()
            }),
        ])
        .await;
    Ok(sync)
}

#[tokio::test]
async fn test_generate_plans_reloads_and_replaces_held_plans() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/generate-plans-on-demand"))
        .and(header("authorization", "Bearer secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .expect(1)
        .mount(&server)
        .await;

    // The backend wrote fresh plans that restart at version 1
    let remote = MemoryDocumentStore::new();
    remote.insert(
        "users",
        "u1",
        json!({
            "quizData": { "goal": ["perder-peso"], "version": 1 },
            "dietPlan": { "meals": [], "notes": "new", "version": 1 },
            "workoutPlan": { "days": [], "version": 1 }
        }),
    );
    let sync = plan_service(&server, remote).await?;
    sync.store()
        .dispatch(Action::SetDietPlan(DietPlan {
            notes: Some("old".to_string()),
            version: Some(5),
            ..Default::default()
        }))
        .await;

    let outcome = sync.generate_plans().await;

    assert_eq!(outcome, PlanOutcome::Generated(LoadOutcome::Remote));
    let state = sync.store().snapshot().await;
    assert_eq!(state.diet_plan.unwrap().notes.as_deref(), Some("new"));
    assert!(state.workout_plan.is_some());
    assert!(state.error.is_none());
    assert!(!state.is_generating_plans);
    Ok(())
}

#[tokio::test]
async fn test_generate_plans_surfaces_server_message() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/generate-plans-on-demand"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "error": "Quota exceeded" })))
        .mount(&server)
        .await;

    let sync = plan_service(&server, MemoryDocumentStore::new()).await?;
    let outcome = sync.generate_plans().await;

    assert_eq!(outcome, PlanOutcome::Failed("Quota exceeded".to_string()));
    let state = sync.store().snapshot().await;
    assert_eq!(state.error.as_deref(), Some("Quota exceeded"));
    assert!(!state.is_generating_plans);
    Ok(())
}

#[tokio::test]
async fn test_generate_plans_falls_back_to_generic_message() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/generate-plans-on-demand"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>Bad Gateway</html>"))
        .mount(&server)
        .await;

    let sync = plan_service(&server, MemoryDocumentStore::new()).await?;
    let outcome = sync.generate_plans().await;

    assert_eq!(outcome, PlanOutcome::Failed(GENERATE_PLANS_FALLBACK_ERROR.to_string()));
    assert_eq!(
        sync.store().read(|s| s.error.clone()).await.as_deref(),
        Some(GENERATE_PLANS_FALLBACK_ERROR)
    );
    Ok(())
}
