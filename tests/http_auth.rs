use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use fleet_server::auth::{AuthRwLock, Claim};
use fleet_server::repo::Repo;
use fleet_server::search::SearchClient;
use fleet_server::storage::FileStorage;
use fleet_server::{build_router, AppState};

// None of these requests reach the database, so the pool never connects.
fn app(auth: AuthRwLock) -> Router {
    build_router(AppState {
        repo: Repo::lazy("postgres://fleet@127.0.0.1:1/unused"),
        auth,
        search: SearchClient::disabled(),
        storage: FileStorage::new(std::env::temp_dir()),
    })
}

async fn send(app: Router, method: Method, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let response = app
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn listing_without_token_is_unauthenticated() {
    let (status, body) = send(app(AuthRwLock::new()), Method::GET, "/depots", None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Unauthenticated.");
}

#[tokio::test]
async fn garbage_token_is_unauthenticated() {
    let (status, _) = send(
        app(AuthRwLock::new()),
        Method::GET,
        "/passenger-wagons?depot_id=1",
        Some("bm90.YSB0b2tlbg=="),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn token_signed_by_another_server_is_rejected() {
    let token = Claim::for_user(1).to_token(&AuthRwLock::new()).unwrap();

    let (status, _) = send(app(AuthRwLock::new()), Method::DELETE, "/trains/4", Some(&token)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn protected_routes_require_a_token() {
    let routes = [
        (Method::GET, "/me"),
        (Method::GET, "/repairs"),
        (Method::GET, "/rolling-stock-trains?train_id=1"),
        (Method::DELETE, "/images/1"),
        (Method::GET, "/passenger-reports"),
        (Method::POST, "/trains-search"),
        (Method::GET, "/roles?no-pagination"),
    ];

    for (method, uri) in routes {
        let (status, _) = send(app(AuthRwLock::new()), method.clone(), uri, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{} {}", method, uri);
    }
}

#[tokio::test]
async fn unknown_routes_are_not_found() {
    let (status, _) = send(app(AuthRwLock::new()), Method::GET, "/locomotives", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
