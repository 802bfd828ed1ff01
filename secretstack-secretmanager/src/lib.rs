//! Secret Manager emulation for SecretStack
//!
//! Provides in-memory secret storage with support for:
//! - CreateSecret, GetSecret, UpdateSecret, DeleteSecret, ListSecrets
//! - AddSecretVersion, GetSecretVersion, AccessSecretVersion, ListSecretVersions
//! - Version lifecycle (EnableSecretVersion, DisableSecretVersion, DestroySecretVersion)
//! - The `latest` version alias

pub mod dispatch;
pub mod handlers;
pub mod naming;
pub mod payload;
pub mod state;
pub mod storage;


pub use dispatch::{Dispatcher, Operation, Request, Response};
pub use handlers::{router, SecretManagerState, RPC_SERVICE};
pub use payload::SecretPayload;
pub use state::VersionState;
pub use storage::{SecretStore, StoreError};
