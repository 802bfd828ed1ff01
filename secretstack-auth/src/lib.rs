//! Authorization for SecretStack
//!
//! An optional gate consulted before every operation. It extracts the caller
//! identity from request metadata and asks an external policy oracle whether
//! the operation's permission is granted on the target resource.

pub mod error;
pub mod gate;
pub mod mode;
pub mod oracle;
pub mod permissions;
pub mod principal;

pub use error::{AuthzError, OracleError};
pub use gate::{AuthzConfig, AuthzGate, DEFAULT_CHECK_TIMEOUT};
pub use mode::AuthMode;
pub use oracle::{HttpPolicyOracle, PolicyOracle};
pub use permissions::{PermissionCheck, ResourceTarget};
pub use principal::{extract_principal, PRINCIPAL_HEADER};
