//! Operation dispatch
//!
//! Every transport turns its wire request into a [`Request`] and hands it to
//! [`Dispatcher::dispatch`], which validates it, runs the authorization gate
//! against the normalized resource and only then calls into the store.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

use secretstack_auth::{permissions, AuthzGate, PermissionCheck, ResourceTarget};
use secretstack_core::ApiError;

use crate::naming;
use crate::payload::SecretPayload;
use crate::storage::{
    AccessedVersion, Secret, SecretMetadata, SecretStore, SecretUpdate, SecretVersion,
};

/// The operations the service exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateSecret,
    GetSecret,
    UpdateSecret,
    DeleteSecret,
    ListSecrets,
    AddSecretVersion,
    GetSecretVersion,
    AccessSecretVersion,
    ListSecretVersions,
    EnableSecretVersion,
    DisableSecretVersion,
    DestroySecretVersion,
}

impl Operation {
    pub const ALL: [Operation; 12] = [
        Operation::CreateSecret,
        Operation::GetSecret,
        Operation::UpdateSecret,
        Operation::DeleteSecret,
        Operation::ListSecrets,
        Operation::AddSecretVersion,
        Operation::GetSecretVersion,
        Operation::AccessSecretVersion,
        Operation::ListSecretVersions,
        Operation::EnableSecretVersion,
        Operation::DisableSecretVersion,
        Operation::DestroySecretVersion,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateSecret => "CreateSecret",
            Self::GetSecret => "GetSecret",
            Self::UpdateSecret => "UpdateSecret",
            Self::DeleteSecret => "DeleteSecret",
            Self::ListSecrets => "ListSecrets",
            Self::AddSecretVersion => "AddSecretVersion",
            Self::GetSecretVersion => "GetSecretVersion",
            Self::AccessSecretVersion => "AccessSecretVersion",
            Self::ListSecretVersions => "ListSecretVersions",
            Self::EnableSecretVersion => "EnableSecretVersion",
            Self::DisableSecretVersion => "DisableSecretVersion",
            Self::DestroySecretVersion => "DestroySecretVersion",
        }
    }

    /// Permission required to run the operation
    pub fn permission(&self) -> PermissionCheck {
        match self {
            Self::CreateSecret => permissions::SECRETS_CREATE,
            Self::GetSecret => permissions::SECRETS_GET,
            Self::UpdateSecret => permissions::SECRETS_UPDATE,
            Self::DeleteSecret => permissions::SECRETS_DELETE,
            Self::ListSecrets => permissions::SECRETS_LIST,
            Self::AddSecretVersion => permissions::VERSIONS_ADD,
            Self::GetSecretVersion => permissions::VERSIONS_GET,
            Self::AccessSecretVersion => permissions::VERSIONS_ACCESS,
            Self::ListSecretVersions => permissions::VERSIONS_LIST,
            Self::EnableSecretVersion => permissions::VERSIONS_ENABLE,
            Self::DisableSecretVersion => permissions::VERSIONS_DISABLE,
            Self::DestroySecretVersion => permissions::VERSIONS_DESTROY,
        }
    }
}

impl FromStr for Operation {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| ApiError::not_found(format!("Unknown method: {}", s)))
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// === Request records ===

/// Secret resource as supplied by callers
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SecretInput {
    pub name: String,
    pub labels: HashMap<String, String>,
    pub annotations: HashMap<String, String>,
    pub replication: Option<serde_json::Value>,
}

/// Field paths a caller intends to replace
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "FieldMaskRepr")]
pub struct FieldMask {
    pub paths: Vec<String>,
}

impl FieldMask {
    /// Parse the comma-separated form used in query strings and JSON
    pub fn parse(csv: &str) -> Self {
        Self {
            paths: csv
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FieldMaskRepr {
    Text(String),
    List(Vec<String>),
    Object { paths: Vec<String> },
}

impl From<FieldMaskRepr> for FieldMask {
    fn from(repr: FieldMaskRepr) -> Self {
        match repr {
            FieldMaskRepr::Text(csv) => FieldMask::parse(&csv),
            FieldMaskRepr::List(paths) | FieldMaskRepr::Object { paths } => FieldMask { paths },
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CreateSecretRequest {
    pub parent: String,
    #[serde(alias = "secretId")]
    pub secret_id: String,
    pub secret: Option<SecretInput>,
}

/// Requests addressing a single secret or version by name
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NameRequest {
    pub name: String,
    /// Accepted for wire compatibility; not compared
    pub etag: String,
}

impl NameRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            etag: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UpdateSecretRequest {
    pub secret: Option<SecretInput>,
    #[serde(alias = "updateMask")]
    pub update_mask: Option<FieldMask>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ListSecretsRequest {
    pub parent: String,
    #[serde(alias = "pageSize")]
    pub page_size: i32,
    #[serde(alias = "pageToken")]
    pub page_token: String,
    /// Secrets cannot be filtered; anything but blank is rejected
    pub filter: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AddSecretVersionRequest {
    pub parent: String,
    pub payload: Option<SecretPayload>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ListSecretVersionsRequest {
    pub parent: String,
    #[serde(alias = "pageSize")]
    pub page_size: i32,
    #[serde(alias = "pageToken")]
    pub page_token: String,
    pub filter: String,
}

/// A request for one operation, tagged by operation
#[derive(Debug, Clone)]
pub enum Request {
    CreateSecret(CreateSecretRequest),
    GetSecret(NameRequest),
    UpdateSecret(UpdateSecretRequest),
    DeleteSecret(NameRequest),
    ListSecrets(ListSecretsRequest),
    AddSecretVersion(AddSecretVersionRequest),
    GetSecretVersion(NameRequest),
    AccessSecretVersion(NameRequest),
    ListSecretVersions(ListSecretVersionsRequest),
    EnableSecretVersion(NameRequest),
    DisableSecretVersion(NameRequest),
    DestroySecretVersion(NameRequest),
}

impl Request {
    /// Decode a JSON request record for `operation`; an empty body is an empty record
    pub fn from_json(operation: Operation, body: &[u8]) -> Result<Self, ApiError> {
        let body: &[u8] = if body.iter().all(u8::is_ascii_whitespace) {
            b"{}"
        } else {
            body
        };

        fn decode<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
            serde_json::from_slice(body)
                .map_err(|e| ApiError::invalid_argument(format!("Invalid JSON payload: {}", e)))
        }

        Ok(match operation {
            Operation::CreateSecret => Request::CreateSecret(decode(body)?),
            Operation::GetSecret => Request::GetSecret(decode(body)?),
            Operation::UpdateSecret => Request::UpdateSecret(decode(body)?),
            Operation::DeleteSecret => Request::DeleteSecret(decode(body)?),
            Operation::ListSecrets => Request::ListSecrets(decode(body)?),
            Operation::AddSecretVersion => Request::AddSecretVersion(decode(body)?),
            Operation::GetSecretVersion => Request::GetSecretVersion(decode(body)?),
            Operation::AccessSecretVersion => Request::AccessSecretVersion(decode(body)?),
            Operation::ListSecretVersions => Request::ListSecretVersions(decode(body)?),
            Operation::EnableSecretVersion => Request::EnableSecretVersion(decode(body)?),
            Operation::DisableSecretVersion => Request::DisableSecretVersion(decode(body)?),
            Operation::DestroySecretVersion => Request::DestroySecretVersion(decode(body)?),
        })
    }

    pub fn operation(&self) -> Operation {
        match self {
            Request::CreateSecret(_) => Operation::CreateSecret,
            Request::GetSecret(_) => Operation::GetSecret,
            Request::UpdateSecret(_) => Operation::UpdateSecret,
            Request::DeleteSecret(_) => Operation::DeleteSecret,
            Request::ListSecrets(_) => Operation::ListSecrets,
            Request::AddSecretVersion(_) => Operation::AddSecretVersion,
            Request::GetSecretVersion(_) => Operation::GetSecretVersion,
            Request::AccessSecretVersion(_) => Operation::AccessSecretVersion,
            Request::ListSecretVersions(_) => Operation::ListSecretVersions,
            Request::EnableSecretVersion(_) => Operation::EnableSecretVersion,
            Request::DisableSecretVersion(_) => Operation::DisableSecretVersion,
            Request::DestroySecretVersion(_) => Operation::DestroySecretVersion,
        }
    }

    /// Check that required fields are present
    pub fn validate(&self) -> Result<(), ApiError> {
        match self {
            Request::CreateSecret(r) => {
                required("parent", &r.parent)?;
                required("secret_id", &r.secret_id)?;
                if r.secret.is_none() {
                    return Err(ApiError::invalid_argument("secret is required"));
                }
            }
            Request::UpdateSecret(r) => {
                let name = r.secret.as_ref().map(|s| s.name.as_str()).unwrap_or("");
                required("secret.name", name)?;
                if r.update_mask.is_none() {
                    return Err(ApiError::invalid_argument("update_mask is required"));
                }
            }
            Request::ListSecrets(r) => {
                required("parent", &r.parent)?;
                if !r.filter.trim().is_empty() {
                    return Err(ApiError::invalid_argument(format!(
                        "Invalid filter: {}",
                        r.filter
                    )));
                }
            }
            Request::ListSecretVersions(r) => required("parent", &r.parent)?,
            Request::AddSecretVersion(r) => {
                required("parent", &r.parent)?;
                let payload = r
                    .payload
                    .as_ref()
                    .ok_or_else(|| ApiError::invalid_argument("payload is required"))?;
                if payload.checksum_matches() == Some(false) {
                    return Err(ApiError::invalid_argument(
                        "payload.data_crc32c does not match payload.data",
                    ));
                }
            }
            Request::GetSecret(r)
            | Request::DeleteSecret(r)
            | Request::GetSecretVersion(r)
            | Request::AccessSecretVersion(r)
            | Request::EnableSecretVersion(r)
            | Request::DisableSecretVersion(r)
            | Request::DestroySecretVersion(r) => required("name", &r.name)?,
        }
        Ok(())
    }

    /// The name the request addresses: a parent for creation and listing,
    /// otherwise the secret or version itself
    pub fn addressed_name(&self) -> &str {
        match self {
            Request::CreateSecret(r) => &r.parent,
            Request::ListSecrets(r) => &r.parent,
            Request::UpdateSecret(r) => r.secret.as_ref().map_or("", |s| s.name.as_str()),
            Request::AddSecretVersion(r) => &r.parent,
            Request::ListSecretVersions(r) => &r.parent,
            Request::GetSecret(r)
            | Request::DeleteSecret(r)
            | Request::GetSecretVersion(r)
            | Request::AccessSecretVersion(r)
            | Request::EnableSecretVersion(r)
            | Request::DisableSecretVersion(r)
            | Request::DestroySecretVersion(r) => &r.name,
        }
    }

    fn addresses_version(&self) -> bool {
        matches!(
            self,
            Request::GetSecretVersion(_)
                | Request::AccessSecretVersion(_)
                | Request::EnableSecretVersion(_)
                | Request::DisableSecretVersion(_)
                | Request::DestroySecretVersion(_)
        )
    }

    /// The resource a permission with `target` is checked against
    pub fn authz_resource(&self, target: ResourceTarget) -> String {
        let name = self.addressed_name();
        match target {
            ResourceTarget::Parent => naming::normalize_parent(name),
            ResourceTarget::Resource if self.addresses_version() => {
                naming::normalize_version_resource(name)
            }
            ResourceTarget::Resource => naming::normalize_secret_resource(name),
        }
    }
}

fn required(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        Err(ApiError::invalid_argument(format!("{} is required", field)))
    } else {
        Ok(())
    }
}

// === Response records ===

#[derive(Debug, Clone, Serialize)]
pub struct ListSecretsResponse {
    pub secrets: Vec<Secret>,
    pub next_page_token: String,
    pub total_size: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListSecretVersionsResponse {
    pub versions: Vec<SecretVersion>,
    pub next_page_token: String,
    pub total_size: usize,
}

/// Serializes as `{}`
#[derive(Debug, Clone, Default, Serialize)]
pub struct Empty {}

/// Result of a dispatched operation, serialized as the bare record
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Response {
    Secret(Secret),
    Secrets(ListSecretsResponse),
    Version(SecretVersion),
    Versions(ListSecretVersionsResponse),
    Accessed(AccessedVersion),
    Empty(Empty),
}

/// Validates, authorizes and executes operations against one store
#[derive(Debug, Clone)]
pub struct Dispatcher {
    store: Arc<SecretStore>,
    gate: AuthzGate,
}

impl Dispatcher {
    pub fn new(store: Arc<SecretStore>, gate: AuthzGate) -> Self {
        Self { store, gate }
    }

    pub fn store(&self) -> &Arc<SecretStore> {
        &self.store
    }

    pub fn gate(&self) -> &AuthzGate {
        &self.gate
    }

    /// Run one operation on behalf of `principal`.
    ///
    /// The gate is awaited before the store lock is taken, so a slow or failed
    /// oracle never blocks other callers and never leaves partial state.
    pub async fn dispatch(
        &self,
        principal: Option<&str>,
        request: Request,
    ) -> Result<Response, ApiError> {
        let operation = request.operation();
        request.validate()?;

        let check = operation.permission();
        let resource = request.authz_resource(check.target);
        self.gate
            .authorize(principal, &resource, check.permission)
            .await?;

        debug!(operation = %operation, resource = %resource, "Executing operation");
        self.execute(request)
    }

    fn execute(&self, request: Request) -> Result<Response, ApiError> {
        let store = &self.store;
        let response = match request {
            Request::CreateSecret(r) => {
                let secret = r.secret.unwrap_or_default();
                Response::Secret(store.create_secret(
                    &r.parent,
                    &r.secret_id,
                    SecretMetadata {
                        labels: secret.labels,
                        annotations: secret.annotations,
                        replication: secret.replication,
                    },
                )?)
            }
            Request::GetSecret(r) => Response::Secret(store.get_secret(&r.name)?),
            Request::UpdateSecret(r) => {
                let secret = r.secret.unwrap_or_default();
                let mask = r.update_mask.unwrap_or_default();
                let mut update = SecretUpdate::default();
                for path in &mask.paths {
                    match path.as_str() {
                        "labels" => update.labels = Some(secret.labels.clone()),
                        "annotations" => update.annotations = Some(secret.annotations.clone()),
                        _ => {}
                    }
                }
                Response::Secret(store.update_secret(&secret.name, update)?)
            }
            Request::DeleteSecret(r) => {
                store.delete_secret(&r.name)?;
                Response::Empty(Empty {})
            }
            Request::ListSecrets(r) => {
                let page = store.list_secrets(&r.parent, r.page_size, &r.page_token)?;
                Response::Secrets(ListSecretsResponse {
                    secrets: page.items,
                    next_page_token: page.next_page_token,
                    total_size: page.total_size,
                })
            }
            Request::AddSecretVersion(r) => {
                let payload = r.payload.unwrap_or_else(|| SecretPayload::new(Vec::new()));
                Response::Version(store.add_secret_version(&r.parent, payload.data)?)
            }
            Request::GetSecretVersion(r) => Response::Version(store.get_secret_version(&r.name)?),
            Request::AccessSecretVersion(r) => {
                Response::Accessed(store.access_secret_version(&r.name)?)
            }
            Request::ListSecretVersions(r) => {
                let page = store.list_secret_versions(
                    &r.parent,
                    r.page_size,
                    &r.page_token,
                    &r.filter,
                )?;
                Response::Versions(ListSecretVersionsResponse {
                    versions: page.items,
                    next_page_token: page.next_page_token,
                    total_size: page.total_size,
                })
            }
            Request::EnableSecretVersion(r) => {
                Response::Version(store.enable_secret_version(&r.name)?)
            }
            Request::DisableSecretVersion(r) => {
                Response::Version(store.disable_secret_version(&r.name)?)
            }
            Request::DestroySecretVersion(r) => {
                Response::Version(store.destroy_secret_version(&r.name)?)
            }
        };
        Ok(response)
    }
}
