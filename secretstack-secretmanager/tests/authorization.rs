//! Authorization gate behavior seen through the HTTP bindings

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::ServiceExt;

use secretstack_auth::{AuthMode, AuthzGate, HttpPolicyOracle, OracleError, PolicyOracle};
use secretstack_secretmanager::{router, SecretManagerState, SecretStore};

/// Grants a single principal everything and counts calls
struct SinglePrincipalOracle {
    allowed: &'static str,
    calls: AtomicUsize,
}

#[async_trait]
impl PolicyOracle for SinglePrincipalOracle {
    async fn check(
        &self,
        principal: &str,
        _resource: &str,
        _permission: &str,
    ) -> Result<bool, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(principal == self.allowed)
    }
}

fn app_with(gate: AuthzGate) -> (Router, Arc<SecretStore>) {
    let store = Arc::new(SecretStore::new());
    let state = SecretManagerState::with_store(store.clone(), gate);
    (router(Arc::new(state)), store)
}

async fn create_secret(app: &Router, principal: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/v1/projects/p/secrets?secretId=s");
    if let Some(principal) = principal {
        builder = builder.header("x-emulator-principal", principal);
    }
    let response = app
        .clone()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_off_never_consults_oracle() {
    let oracle = Arc::new(SinglePrincipalOracle {
        allowed: "user:nobody",
        calls: AtomicUsize::new(0),
    });
    let (app, store) = app_with(AuthzGate::new(AuthMode::Off, oracle.clone()));

    let (status, _) = create_secret(&app, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(store.secret_count(), 1);
    assert_eq!(oracle.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_strict_without_identity_leaves_store_unchanged() {
    let oracle = Arc::new(SinglePrincipalOracle {
        allowed: "user:admin",
        calls: AtomicUsize::new(0),
    });
    let (app, store) = app_with(AuthzGate::new(AuthMode::Strict, oracle.clone()));

    let (status, body) = create_secret(&app, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["status"], "PERMISSION_DENIED");
    assert_eq!(store.secret_count(), 0);
    assert_eq!(oracle.calls.load(Ordering::SeqCst), 0);

    let (status, _) = create_secret(&app, Some("user:guest")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(store.secret_count(), 0);

    let (status, _) = create_secret(&app, Some("user:admin")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(store.secret_count(), 1);
}

#[tokio::test]
async fn test_permissive_fails_open_when_oracle_unreachable() {
    let oracle = HttpPolicyOracle::new("127.0.0.1:1").unwrap();
    let (app, store) = app_with(AuthzGate::new(AuthMode::Permissive, Arc::new(oracle)));

    let (status, _) = create_secret(&app, Some("user:dev")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(store.secret_count(), 1);
}

#[tokio::test]
async fn test_strict_fails_closed_when_oracle_unreachable() {
    let oracle = HttpPolicyOracle::new("127.0.0.1:1").unwrap();
    let (app, store) = app_with(AuthzGate::new(AuthMode::Strict, Arc::new(oracle)));

    let (status, body) = create_secret(&app, Some("user:dev")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["status"], "INTERNAL");
    assert_eq!(store.secret_count(), 0);
}
