use std::{num::NonZeroUsize, sync::Arc};

use axum::{
    Router,
    body::{Body, Bytes},
    http::{Method, Request, StatusCode},
};
use http_body_util::BodyExt;
use mapperlab::{
    application::{bootstrap, users::statements},
    cache::EvictionPolicy,
    config::{NamespaceCacheSettings, PluginSettings},
    infra::{
        db::MemoryDataSource,
        http::{HttpState, build_router},
    },
    plugin::{CapturingSink, ObservationSink},
};
use mapperlab_api_types::{ErrorBody, MessageResponse, RowsAffectedResponse, UserResponse, codes};
use serde::de::DeserializeOwned;
use tower::ServiceExt;

fn app() -> (Router, MemoryDataSource) {
    let source = MemoryDataSource::seeded();
    let factory = bootstrap::session_factory(
        &NamespaceCacheSettings {
            enabled: true,
            capacity: NonZeroUsize::new(512).expect("non-zero"),
            eviction_policy: EvictionPolicy::Lru,
        },
        &PluginSettings::default(),
        Arc::new(source.clone()),
        Arc::new(CapturingSink::new()) as Arc<dyn ObservationSink>,
    )
    .expect("session factory");
    (
        build_router(HttpState::new(Arc::new(factory))),
        source,
    )
}

async fn call(app: &Router, method: Method, uri: &str) -> (StatusCode, Bytes) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("request should build");
    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("router should respond");
    let status = response.status();
    let body = response
        .into_body()
        .collect()
        .await
        .expect("body should collect")
        .to_bytes();
    (status, body)
}

fn json<T: DeserializeOwned>(body: &[u8]) -> T {
    serde_json::from_slice(body).expect("valid json body")
}

#[tokio::test]
async fn health_reports_ok() {
    let (app, _source) = app();
    let (status, body) = call(&app, Method::GET, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json::<MessageResponse>(&body).message, "ok");
}

#[tokio::test]
async fn user_lookup_returns_record() {
    let (app, _source) = app();
    let (status, body) = call(&app, Method::GET, "/api/users/2").await;

    assert_eq!(status, StatusCode::OK);
    let user: UserResponse = json(&body);
    assert_eq!(user.id, 2);
    assert_eq!(user.username, "bob");
}

#[tokio::test]
async fn missing_user_is_404() {
    let (app, _source) = app();
    let (status, body) = call(&app, Method::GET, "/api/users/99").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json::<ErrorBody>(&body).error.code, codes::NOT_FOUND);
}

#[tokio::test]
async fn user_list_honours_offset_and_limit() {
    let (app, _source) = app();

    let (_, body) = call(&app, Method::GET, "/api/users").await;
    assert_eq!(json::<Vec<UserResponse>>(&body).len(), 3);

    let (_, body) = call(&app, Method::GET, "/api/users?offset=1&limit=1").await;
    let page: Vec<UserResponse> = json(&body);
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].username, "bob");
}

#[tokio::test]
async fn full_table_writes_are_422() {
    let (app, source) = app();

    for uri in ["/api/users/updateAll", "/api/users/deleteAll"] {
        let (status, body) = call(&app, Method::POST, uri).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{uri}");
        let error: ErrorBody = json(&body);
        assert_eq!(error.error.code, codes::POLICY_VIOLATION);
        assert!(error.error.hint.is_some());
    }

    assert_eq!(source.total_executions(), 0);
    assert_eq!(source.users().len(), 3);
}

#[tokio::test]
async fn update_one_reports_rows_affected() {
    let (app, source) = app();
    let (status, body) = call(&app, Method::POST, "/api/users/updateOne").await;

    assert_eq!(status, StatusCode::OK);
    let result: RowsAffectedResponse = json(&body);
    assert_eq!(result.statement, statements::UPDATE_ONE);
    assert_eq!(result.rows_affected, 1);
    assert_eq!(source.users()[0].username, "kubo");
}

#[tokio::test]
async fn session_cache_endpoint_reads_once() {
    let (app, source) = app();
    let (status, body) = call(&app, Method::GET, "/api/cache/l1/1").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json::<UserResponse>(&body).username, "alice");
    assert_eq!(source.executions(statements::FIND_BY_ID), 1);

    let (status, _) = call(&app, Method::GET, "/api/users/cache/l1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(source.executions(statements::FIND_ALL), 1);
}

#[tokio::test]
async fn namespace_cache_spans_requests_until_evicted() {
    let (app, source) = app();

    call(&app, Method::GET, "/api/cache/l2/1").await;
    call(&app, Method::GET, "/api/cache/l2/1").await;
    assert_eq!(source.executions(statements::FIND_BY_ID), 1);

    let (status, body) = call(&app, Method::POST, "/api/cache/evict").await;
    assert_eq!(status, StatusCode::OK);
    assert!(json::<MessageResponse>(&body).message.contains("flushed"));

    let (_, body) = call(&app, Method::GET, "/api/cache/l2/1").await;
    assert_eq!(json::<UserResponse>(&body).username, "kubo");
    assert_eq!(source.executions(statements::FIND_BY_ID), 2);
}

#[tokio::test]
async fn unavailable_backend_is_503() {
    let (app, source) = app();
    source.set_unavailable(true);

    let (status, body) = call(&app, Method::GET, "/api/users/1").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json::<ErrorBody>(&body).error.code, codes::DATA_ACCESS);
}
