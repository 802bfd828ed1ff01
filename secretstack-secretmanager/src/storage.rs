//! Secret Manager in-memory storage
//!
//! One coarse reader/writer lock guards the whole secret map: reads share it,
//! every mutation holds it exclusively for its full duration. Expected load is
//! test and CI traffic, so simplicity wins over per-secret locking.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::debug;

use secretstack_core::{ApiError, ErrorCode};

use crate::naming::{self, NameError, SecretName, SecretVersionName, VersionSelector};
use crate::payload::SecretPayload;
use crate::state::{Transition, VersionState};

/// Page size used when the caller leaves it unset
pub const DEFAULT_PAGE_SIZE: usize = 100;
/// Larger requested page sizes are clamped to this
pub const MAX_PAGE_SIZE: usize = 25_000;

/// Secret metadata, without versions
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Secret {
    /// `projects/{project}/secrets/{secret}`
    pub name: String,
    /// Accepted and echoed back, never enforced
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replication: Option<serde_json::Value>,
    pub create_time: DateTime<Utc>,
    pub labels: HashMap<String, String>,
    pub annotations: HashMap<String, String>,
    pub etag: String,
}

/// Version metadata; the payload is only returned by access
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SecretVersion {
    /// `projects/{project}/secrets/{secret}/versions/{id}`
    pub name: String,
    pub create_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destroy_time: Option<DateTime<Utc>>,
    pub state: VersionState,
    pub etag: String,
}

/// Result of accessing a version
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccessedVersion {
    /// Resolved name; `latest` is replaced by the concrete id
    pub name: String,
    pub payload: SecretPayload,
}

/// Caller-supplied metadata for a new secret
#[derive(Debug, Clone, Default)]
pub struct SecretMetadata {
    pub labels: HashMap<String, String>,
    pub annotations: HashMap<String, String>,
    pub replication: Option<serde_json::Value>,
}

/// Fields to replace on update; `None` leaves the field alone
#[derive(Debug, Clone, Default)]
pub struct SecretUpdate {
    pub labels: Option<HashMap<String, String>>,
    pub annotations: Option<HashMap<String, String>>,
}

impl SecretUpdate {
    pub fn is_empty(&self) -> bool {
        self.labels.is_none() && self.annotations.is_none()
    }
}

/// One page of a listing
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Empty once the listing is exhausted
    pub next_page_token: String,
    /// Size of the whole (filtered) listing
    pub total_size: usize,
}

/// Storage-level failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    InvalidArgument(String),

    #[error("Secret [{0}] not found.")]
    SecretNotFound(String),

    #[error("Secret Version [{0}] not found.")]
    VersionNotFound(String),

    #[error("Secret [{0}] already exists.")]
    AlreadyExists(String),

    #[error("{0}")]
    FailedPrecondition(String),
}

impl From<NameError> for StoreError {
    fn from(err: NameError) -> Self {
        StoreError::InvalidArgument(err.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        let code = match err {
            StoreError::InvalidArgument(_) => ErrorCode::InvalidArgument,
            StoreError::SecretNotFound(_) | StoreError::VersionNotFound(_) => ErrorCode::NotFound,
            StoreError::AlreadyExists(_) => ErrorCode::AlreadyExists,
            StoreError::FailedPrecondition(_) => ErrorCode::FailedPrecondition,
        };
        ApiError::new(code, err.to_string())
    }
}

struct VersionRecord {
    meta: SecretVersion,
    /// `None` once destroyed
    payload: Option<Bytes>,
}

struct SecretRecord {
    secret: Secret,
    versions: BTreeMap<u64, VersionRecord>,
    /// Last id handed out; ids start at 1 and are never reused
    last_version_id: u64,
}

impl SecretRecord {
    /// Resolve a selector, `latest` meaning the highest-numbered enabled version
    fn resolve(&self, selector: VersionSelector) -> Option<u64> {
        match selector {
            VersionSelector::Id(id) => self.versions.contains_key(&id).then_some(id),
            VersionSelector::Latest => self
                .versions
                .iter()
                .rev()
                .find(|(_, v)| v.meta.state == VersionState::Enabled)
                .map(|(id, _)| *id),
        }
    }
}

/// In-memory storage for secrets and their versions
#[derive(Default)]
pub struct SecretStore {
    /// Ordered by (project, secret id) so listings are deterministic
    secrets: RwLock<BTreeMap<SecretName, SecretRecord>>,
}

impl std::fmt::Debug for SecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretStore")
            .field("secrets", &self.secret_count())
            .finish()
    }
}

impl SecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of secrets across all projects
    pub fn secret_count(&self) -> usize {
        self.secrets.read().len()
    }

    /// Create a secret with no versions
    pub fn create_secret(
        &self,
        parent: &str,
        secret_id: &str,
        metadata: SecretMetadata,
    ) -> Result<Secret, StoreError> {
        let project = naming::parse_parent(parent)?;
        naming::validate_secret_id(secret_id)?;
        let key = SecretName::new(project, secret_id);

        let mut secrets = self.secrets.write();
        if secrets.contains_key(&key) {
            return Err(StoreError::AlreadyExists(key.to_string()));
        }

        let now = Utc::now();
        let secret = Secret {
            name: key.to_string(),
            replication: metadata.replication,
            create_time: now,
            labels: metadata.labels,
            annotations: metadata.annotations,
            etag: etag(now),
        };

        debug!(secret = %secret.name, "Created secret");
        secrets.insert(
            key,
            SecretRecord {
                secret: secret.clone(),
                versions: BTreeMap::new(),
                last_version_id: 0,
            },
        );
        Ok(secret)
    }

    /// Get secret metadata
    pub fn get_secret(&self, name: &str) -> Result<Secret, StoreError> {
        let key = SecretName::parse(name)?;
        let secrets = self.secrets.read();
        secrets
            .get(&key)
            .map(|r| r.secret.clone())
            .ok_or_else(|| StoreError::SecretNotFound(key.to_string()))
    }

    /// Replace the fields named in `update`, each as a whole
    pub fn update_secret(&self, name: &str, update: SecretUpdate) -> Result<Secret, StoreError> {
        let key = SecretName::parse(name)?;
        let mut secrets = self.secrets.write();
        let record = secrets
            .get_mut(&key)
            .ok_or_else(|| StoreError::SecretNotFound(key.to_string()))?;

        if update.is_empty() {
            return Ok(record.secret.clone());
        }
        if let Some(labels) = update.labels {
            record.secret.labels = labels;
        }
        if let Some(annotations) = update.annotations {
            record.secret.annotations = annotations;
        }
        record.secret.etag = etag(Utc::now());

        debug!(secret = %record.secret.name, "Updated secret");
        Ok(record.secret.clone())
    }

    /// Delete a secret and every version it holds
    pub fn delete_secret(&self, name: &str) -> Result<(), StoreError> {
        let key = SecretName::parse(name)?;
        let removed = self
            .secrets
            .write()
            .remove(&key)
            .ok_or_else(|| StoreError::SecretNotFound(key.to_string()))?;

        debug!(secret = %key, versions = removed.versions.len(), "Deleted secret");
        Ok(())
    }

    /// List secrets of a project, ordered by secret id
    pub fn list_secrets(
        &self,
        parent: &str,
        page_size: i32,
        page_token: &str,
    ) -> Result<Page<Secret>, StoreError> {
        let project = naming::parse_parent(parent)?;
        let secrets = self.secrets.read();

        let matching: Vec<&Secret> = secrets
            .range(SecretName::new(project.clone(), String::new())..)
            .take_while(|(k, _)| k.project == project)
            .map(|(_, r)| &r.secret)
            .collect();

        paginate(&matching, page_size, page_token)
    }

    /// Append a new enabled version
    pub fn add_secret_version(
        &self,
        parent: &str,
        data: Bytes,
    ) -> Result<SecretVersion, StoreError> {
        let key = SecretName::parse(parent)?;
        let mut secrets = self.secrets.write();
        let record = secrets
            .get_mut(&key)
            .ok_or_else(|| StoreError::SecretNotFound(key.to_string()))?;

        record.last_version_id += 1;
        let id = record.last_version_id;
        let now = Utc::now();
        let meta = SecretVersion {
            name: key.version(id).to_string(),
            create_time: now,
            destroy_time: None,
            state: VersionState::Enabled,
            etag: etag(now),
        };

        record.versions.insert(
            id,
            VersionRecord {
                meta: meta.clone(),
                payload: Some(data),
            },
        );

        debug!(version = %meta.name, "Added secret version");
        Ok(meta)
    }

    /// Get version metadata; accepts `latest`
    pub fn get_secret_version(&self, name: &str) -> Result<SecretVersion, StoreError> {
        let version_name = SecretVersionName::parse(name)?;
        let secrets = self.secrets.read();
        let record = secrets
            .get(&version_name.secret)
            .ok_or_else(|| StoreError::SecretNotFound(version_name.secret.to_string()))?;
        let id = record
            .resolve(version_name.version)
            .ok_or_else(|| StoreError::VersionNotFound(version_name.to_string()))?;

        Ok(record.versions[&id].meta.clone())
    }

    /// Read a version's payload; only enabled versions can be read
    pub fn access_secret_version(&self, name: &str) -> Result<AccessedVersion, StoreError> {
        let version_name = SecretVersionName::parse(name)?;
        let secrets = self.secrets.read();
        let record = secrets
            .get(&version_name.secret)
            .ok_or_else(|| StoreError::SecretNotFound(version_name.secret.to_string()))?;
        let id = record
            .resolve(version_name.version)
            .ok_or_else(|| StoreError::VersionNotFound(version_name.to_string()))?;

        let version = &record.versions[&id];
        if !version.meta.state.is_accessible() {
            return Err(StoreError::FailedPrecondition(format!(
                "Secret Version [{}] is in {} state.",
                version.meta.name, version.meta.state
            )));
        }

        let data = version.payload.clone().unwrap_or_default();
        Ok(AccessedVersion {
            name: version.meta.name.clone(),
            payload: SecretPayload::new(data),
        })
    }

    /// List versions of a secret in ascending id order, optionally filtered by state
    pub fn list_secret_versions(
        &self,
        parent: &str,
        page_size: i32,
        page_token: &str,
        filter: &str,
    ) -> Result<Page<SecretVersion>, StoreError> {
        let key = SecretName::parse(parent)?;
        let state_filter = parse_state_filter(filter)?;

        let secrets = self.secrets.read();
        let record = secrets
            .get(&key)
            .ok_or_else(|| StoreError::SecretNotFound(key.to_string()))?;

        let matching: Vec<&SecretVersion> = record
            .versions
            .values()
            .map(|v| &v.meta)
            .filter(|m| state_filter.map_or(true, |s| m.state == s))
            .collect();

        paginate(&matching, page_size, page_token)
    }

    pub fn enable_secret_version(&self, name: &str) -> Result<SecretVersion, StoreError> {
        self.transition(name, Transition::Enable)
    }

    pub fn disable_secret_version(&self, name: &str) -> Result<SecretVersion, StoreError> {
        self.transition(name, Transition::Disable)
    }

    /// Destroy a version, dropping its payload for good
    pub fn destroy_secret_version(&self, name: &str) -> Result<SecretVersion, StoreError> {
        self.transition(name, Transition::Destroy)
    }

    fn transition(&self, name: &str, transition: Transition) -> Result<SecretVersion, StoreError> {
        let version_name = SecretVersionName::parse(name)?;
        let mut secrets = self.secrets.write();
        let record = secrets
            .get_mut(&version_name.secret)
            .ok_or_else(|| StoreError::SecretNotFound(version_name.secret.to_string()))?;
        let id = record
            .resolve(version_name.version)
            .ok_or_else(|| StoreError::VersionNotFound(version_name.to_string()))?;

        let version = record
            .versions
            .get_mut(&id)
            .ok_or_else(|| StoreError::VersionNotFound(version_name.to_string()))?;

        let from = version.meta.state;
        let to = from.apply(transition).map_err(|e| {
            StoreError::FailedPrecondition(format!("Secret Version [{}]: {}", version.meta.name, e))
        })?;

        if to != from {
            let now = Utc::now();
            version.meta.state = to;
            version.meta.etag = etag(now);
            if to == VersionState::Destroyed {
                version.payload = None;
                version.meta.destroy_time = Some(now);
            }
            debug!(version = %version.meta.name, from = %from, to = %to, "Secret version state changed");
        }

        Ok(version.meta.clone())
    }
}

/// Parse `state:ENABLED|DISABLED|DESTROYED`; blank means no filter
fn parse_state_filter(filter: &str) -> Result<Option<VersionState>, StoreError> {
    let filter = filter.trim();
    if filter.is_empty() {
        return Ok(None);
    }

    let invalid = || StoreError::InvalidArgument(format!("Invalid filter: {}", filter));
    let (field, value) = filter.split_once(':').ok_or_else(invalid)?;
    if !field.trim().eq_ignore_ascii_case("state") {
        return Err(invalid());
    }
    value.trim().parse::<VersionState>().map(Some).map_err(|_| invalid())
}

/// Slice one page out of an already-ordered listing.
///
/// The token is the decimal offset of the first item on the page.
fn paginate<T: Clone>(items: &[&T], page_size: i32, page_token: &str) -> Result<Page<T>, StoreError> {
    let size = match page_size {
        n if n < 0 => {
            return Err(StoreError::InvalidArgument(format!(
                "Invalid page_size: {}",
                page_size
            )))
        }
        0 => DEFAULT_PAGE_SIZE,
        n => (n as usize).min(MAX_PAGE_SIZE),
    };

    let offset = if page_token.is_empty() {
        0
    } else {
        page_token
            .parse::<usize>()
            .map_err(|_| StoreError::InvalidArgument(format!("Invalid page_token: {}", page_token)))?
    };

    let total = items.len();
    let start = offset.min(total);
    let end = start.saturating_add(size).min(total);
    let next_page_token = if end < total {
        end.to_string()
    } else {
        String::new()
    };

    Ok(Page {
        items: items[start..end].iter().map(|&item| item.clone()).collect(),
        next_page_token,
        total_size: total,
    })
}

fn etag(at: DateTime<Utc>) -> String {
    format!("\"{}\"", at.timestamp_micros())
}
