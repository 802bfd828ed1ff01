//! HTTP handlers for Secret Manager
//!
//! Two bindings share one [`Dispatcher`]: the RPC-style binding posts a JSON
//! request record to `/{service}/{Method}`, the REST binding maps resource
//! paths and custom verbs (`:addVersion`, `:access`, ...) onto the same
//! operations. Neither binding has semantics of its own.

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response as HttpResponse},
    routing::{any, get, post},
    Router,
};
use bytes::Bytes;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use secretstack_auth::{extract_principal, AuthzGate};
use secretstack_core::{ApiError, RequestId, REQUEST_ID_HEADER};

use crate::dispatch::{
    AddSecretVersionRequest, CreateSecretRequest, Dispatcher, FieldMask,
    ListSecretVersionsRequest, ListSecretsRequest, NameRequest, Operation, Request, SecretInput,
    UpdateSecretRequest,
};
use crate::storage::SecretStore;

/// Fully qualified service name used by the RPC binding
pub const RPC_SERVICE: &str = "google.cloud.secretmanager.v1.SecretManagerService";

/// Shared state for Secret Manager handlers
#[derive(Debug, Clone)]
pub struct SecretManagerState {
    pub dispatcher: Dispatcher,
}

impl SecretManagerState {
    pub fn new(gate: AuthzGate) -> Self {
        Self::with_store(Arc::new(SecretStore::new()), gate)
    }

    pub fn with_store(store: Arc<SecretStore>, gate: AuthzGate) -> Self {
        Self {
            dispatcher: Dispatcher::new(store, gate),
        }
    }
}

impl Default for SecretManagerState {
    fn default() -> Self {
        Self::new(AuthzGate::disabled())
    }
}

/// Routes for both bindings
pub fn router(state: Arc<SecretManagerState>) -> Router {
    Router::new()
        .route(&format!("/{}/:method", RPC_SERVICE), post(handle_rpc))
        .route(
            "/v1/projects/:project/secrets",
            get(list_secrets).post(create_secret),
        )
        .route("/v1/projects/:project/secrets/:secret", any(secret_resource))
        .route(
            "/v1/projects/:project/secrets/:secret/versions",
            get(list_secret_versions),
        )
        .route(
            "/v1/projects/:project/secrets/:secret/versions/:version",
            any(version_resource),
        )
        .with_state(state)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Binding {
    Rpc,
    Rest,
}

/// Handle `POST /google.cloud.secretmanager.v1.SecretManagerService/{Method}`
pub async fn handle_rpc(
    State(state): State<Arc<SecretManagerState>>,
    Path(method): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> HttpResponse {
    let request = method
        .parse::<Operation>()
        .and_then(|operation| Request::from_json(operation, &body));

    match request {
        Ok(request) => run(&state, Binding::Rpc, &headers, request).await,
        Err(err) => {
            warn!(method = %method, error = %err, "Rejected RPC request");
            reply_error(Binding::Rpc, &request_id(&headers), err)
        }
    }
}

// === REST binding ===

/// Query parameters understood by the REST binding
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RestQuery {
    #[serde(alias = "page_size")]
    pub page_size: i32,
    #[serde(alias = "page_token")]
    pub page_token: String,
    pub filter: String,
    #[serde(alias = "secret_id")]
    pub secret_id: String,
    #[serde(alias = "update_mask")]
    pub update_mask: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AddVersionBody {
    payload: Option<crate::payload::SecretPayload>,
}

async fn list_secrets(
    State(state): State<Arc<SecretManagerState>>,
    Path(project): Path<String>,
    query: Result<Query<RestQuery>, QueryRejection>,
    headers: HeaderMap,
) -> HttpResponse {
    let request = rest_query(query).map(|q| {
        Request::ListSecrets(ListSecretsRequest {
            parent: project_name(&project),
            page_size: q.page_size,
            page_token: q.page_token,
            filter: q.filter,
        })
    });
    run_rest(&state, &headers, request).await
}

async fn create_secret(
    State(state): State<Arc<SecretManagerState>>,
    Path(project): Path<String>,
    query: Result<Query<RestQuery>, QueryRejection>,
    headers: HeaderMap,
    body: Bytes,
) -> HttpResponse {
    let request = rest_query(query).and_then(|q| {
        Ok(Request::CreateSecret(CreateSecretRequest {
            parent: project_name(&project),
            secret_id: q.secret_id,
            secret: Some(decode_body::<SecretInput>(&body)?),
        }))
    });
    run_rest(&state, &headers, request).await
}

async fn secret_resource(
    State(state): State<Arc<SecretManagerState>>,
    method: Method,
    Path((project, segment)): Path<(String, String)>,
    query: Result<Query<RestQuery>, QueryRejection>,
    headers: HeaderMap,
    body: Bytes,
) -> HttpResponse {
    let (secret, verb) = split_verb(&segment);
    let name = secret_name(&project, secret);

    let request = match (verb, method.as_str()) {
        (None, "GET") => Ok(Request::GetSecret(NameRequest::new(name))),
        (None, "DELETE") => Ok(Request::DeleteSecret(NameRequest::new(name))),
        (None, "PATCH") => rest_query(query).and_then(|q| {
            let mut secret = decode_body::<SecretInput>(&body)?;
            secret.name = name;
            Ok(Request::UpdateSecret(UpdateSecretRequest {
                secret: Some(secret),
                update_mask: q.update_mask.as_deref().map(FieldMask::parse),
            }))
        }),
        (Some("addVersion"), "POST") => decode_body::<AddVersionBody>(&body).map(|b| {
            Request::AddSecretVersion(AddSecretVersionRequest {
                parent: name,
                payload: b.payload,
            })
        }),
        (None, _) | (Some("addVersion"), _) => return method_not_allowed(&method, &headers),
        (Some(other), _) => Err(unknown_verb(other)),
    };
    run_rest(&state, &headers, request).await
}

async fn list_secret_versions(
    State(state): State<Arc<SecretManagerState>>,
    Path((project, secret)): Path<(String, String)>,
    query: Result<Query<RestQuery>, QueryRejection>,
    headers: HeaderMap,
) -> HttpResponse {
    let request = rest_query(query).map(|q| {
        Request::ListSecretVersions(ListSecretVersionsRequest {
            parent: secret_name(&project, &secret),
            page_size: q.page_size,
            page_token: q.page_token,
            filter: q.filter,
        })
    });
    run_rest(&state, &headers, request).await
}

async fn version_resource(
    State(state): State<Arc<SecretManagerState>>,
    method: Method,
    Path((project, secret, segment)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> HttpResponse {
    let (version, verb) = split_verb(&segment);
    let name = NameRequest::new(format!("{}/versions/{}", secret_name(&project, &secret), version));

    let request = match (verb, method.as_str()) {
        (None, "GET") => Request::GetSecretVersion(name),
        (None, "DELETE") => Request::DestroySecretVersion(name),
        (Some("access"), "GET") => Request::AccessSecretVersion(name),
        (Some("enable"), "POST") => Request::EnableSecretVersion(name),
        (Some("disable"), "POST") => Request::DisableSecretVersion(name),
        (Some("destroy"), "POST") => Request::DestroySecretVersion(name),
        (None | Some("access" | "enable" | "disable" | "destroy"), _) => {
            return method_not_allowed(&method, &headers)
        }
        (Some(other), _) => {
            return run_rest(&state, &headers, Err(unknown_verb(other))).await;
        }
    };
    run_rest(&state, &headers, Ok(request)).await
}

fn project_name(project: &str) -> String {
    format!("projects/{}", project)
}

fn secret_name(project: &str, secret: &str) -> String {
    format!("projects/{}/secrets/{}", project, secret)
}

/// Split `id:verb` into its parts
fn split_verb(segment: &str) -> (&str, Option<&str>) {
    match segment.split_once(':') {
        Some((id, verb)) => (id, Some(verb)),
        None => (segment, None),
    }
}

fn unknown_verb(verb: &str) -> ApiError {
    ApiError::not_found(format!("Unknown method: {}", verb))
}

fn rest_query(query: Result<Query<RestQuery>, QueryRejection>) -> Result<RestQuery, ApiError> {
    query
        .map(|Query(q)| q)
        .map_err(|e| ApiError::invalid_argument(format!("Invalid query parameters: {}", e)))
}

fn decode_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| ApiError::invalid_argument(format!("Invalid JSON payload: {}", e)))
}

async fn run_rest(
    state: &SecretManagerState,
    headers: &HeaderMap,
    request: Result<Request, ApiError>,
) -> HttpResponse {
    match request {
        Ok(request) => run(state, Binding::Rest, headers, request).await,
        Err(err) => {
            warn!(error = %err, "Rejected REST request");
            reply_error(Binding::Rest, &request_id(headers), err)
        }
    }
}

// === Shared plumbing ===

async fn run(
    state: &SecretManagerState,
    binding: Binding,
    headers: &HeaderMap,
    request: Request,
) -> HttpResponse {
    let request_id = request_id(headers);
    let principal = extract_principal(headers);
    let operation = request.operation();

    info!(
        operation = %operation,
        request_id = %request_id,
        principal = principal.as_deref().unwrap_or("-"),
        "Secret Manager request"
    );

    match state
        .dispatcher
        .dispatch(principal.as_deref(), request)
        .await
    {
        Ok(response) => json_response(binding, &request_id, &response),
        Err(err) => {
            warn!(operation = %operation, request_id = %request_id, error = %err, "Operation failed");
            reply_error(binding, &request_id, err)
        }
    }
}

fn request_id(headers: &HeaderMap) -> RequestId {
    RequestId::from_header(
        headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok()),
    )
}

fn json_response<T: Serialize>(binding: Binding, request_id: &RequestId, body: &T) -> HttpResponse {
    match serde_json::to_string(body) {
        Ok(json) => with_headers(StatusCode::OK, request_id, json),
        Err(e) => reply_error(
            binding,
            request_id,
            ApiError::internal(format!("failed to encode response: {}", e)),
        ),
    }
}

fn reply_error(binding: Binding, request_id: &RequestId, err: ApiError) -> HttpResponse {
    let err = err.with_request_id(request_id.as_str());
    let status =
        StatusCode::from_u16(err.code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = match binding {
        Binding::Rpc => err.to_rpc_json(),
        Binding::Rest => err.to_json(),
    };
    with_headers(status, request_id, body)
}

fn with_headers(status: StatusCode, request_id: &RequestId, body: String) -> HttpResponse {
    let mut response = (
        status,
        [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
        body,
    )
        .into_response();
    if let Ok(value) = HeaderValue::from_str(request_id.as_str()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// Routing-level rejection, rendered in the REST error envelope
fn method_not_allowed(method: &Method, headers: &HeaderMap) -> HttpResponse {
    let status = StatusCode::METHOD_NOT_ALLOWED;
    let body = serde_json::json!({
        "error": {
            "code": status.as_u16(),
            "message": format!("Method {} is not allowed on this resource", method),
            "status": "METHOD_NOT_ALLOWED",
        }
    });
    with_headers(status, &request_id(headers), body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_verb() {
        assert_eq!(split_verb("s:addVersion"), ("s", Some("addVersion")));
        assert_eq!(split_verb("latest:access"), ("latest", Some("access")));
        assert_eq!(split_verb("s"), ("s", None));
    }

    struct Unencodable;

    impl Serialize for Unencodable {
        fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("unencodable"))
        }
    }

    #[tokio::test]
    async fn test_encode_failure_uses_binding_envelope() {
        use http_body_util::BodyExt;

        let request_id = RequestId::from_header(Some("enc-1"));

        let response = json_response(Binding::Rpc, &request_id, &Unencodable);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers()[REQUEST_ID_HEADER], "enc-1");
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["code"], 13);
        assert!(body.get("error").is_none());

        let response = json_response(Binding::Rest, &request_id, &Unencodable);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["status"], "INTERNAL");
    }

    #[test]
    fn test_decode_empty_body() {
        let secret: SecretInput = decode_body(&Bytes::new()).unwrap();
        assert!(secret.labels.is_empty());

        let err = decode_body::<SecretInput>(&Bytes::from_static(b"[")).unwrap_err();
        assert_eq!(err.code, secretstack_core::ErrorCode::InvalidArgument);
    }
}
