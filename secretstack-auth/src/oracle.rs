//! Policy oracle: the external service that decides permissions

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::{AuthzError, OracleError};
use crate::principal::PRINCIPAL_HEADER;

/// A policy decision point the gate can consult
#[async_trait]
pub trait PolicyOracle: Send + Sync {
    /// Whether `principal` holds `permission` on `resource`
    async fn check(
        &self,
        principal: &str,
        resource: &str,
        permission: &str,
    ) -> Result<bool, OracleError>;
}

#[derive(Debug, Serialize)]
struct TestPermissionsRequest<'a> {
    permissions: [&'a str; 1],
}

#[derive(Debug, Default, Deserialize)]
struct TestPermissionsResponse {
    #[serde(default)]
    permissions: Vec<String>,
}

/// Oracle backed by an IAM emulator speaking `testIamPermissions` over HTTP
#[derive(Debug, Clone)]
pub struct HttpPolicyOracle {
    base: String,
    client: reqwest::Client,
}

impl HttpPolicyOracle {
    /// Build a client for `endpoint`, either a bare `host:port` or a full URL.
    ///
    /// No connection is attempted here; reachability is only observed per check.
    pub fn new(endpoint: &str) -> Result<Self, AuthzError> {
        let raw = endpoint.trim();
        let candidate = if raw.contains("://") {
            raw.to_string()
        } else {
            format!("http://{}", raw)
        };

        let url = Url::parse(&candidate).map_err(|e| AuthzError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })?;
        if url.host_str().is_none() {
            return Err(AuthzError::InvalidEndpoint {
                endpoint: endpoint.to_string(),
                reason: "missing host".to_string(),
            });
        }

        Ok(Self {
            base: url.as_str().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    fn check_url(&self, resource: &str) -> String {
        format!("{}/v1/{}:testIamPermissions", self.base, resource)
    }
}

#[async_trait]
impl PolicyOracle for HttpPolicyOracle {
    async fn check(
        &self,
        principal: &str,
        resource: &str,
        permission: &str,
    ) -> Result<bool, OracleError> {
        let response = self
            .client
            .post(self.check_url(resource))
            .header(PRINCIPAL_HEADER, principal)
            .json(&TestPermissionsRequest {
                permissions: [permission],
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(OracleError::Status(status.as_u16()));
        }

        let granted: TestPermissionsResponse = response.json().await?;
        let allowed = granted.permissions.iter().any(|p| p == permission);
        debug!(principal = %principal, resource = %resource, permission = %permission, allowed, "Policy oracle decision");
        Ok(allowed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_normalization() {
        let oracle = HttpPolicyOracle::new("localhost:8080").unwrap();
        assert_eq!(oracle.base_url(), "http://localhost:8080");

        let oracle = HttpPolicyOracle::new("https://iam.internal:9443/").unwrap();
        assert_eq!(oracle.base_url(), "https://iam.internal:9443");
        assert_eq!(
            oracle.check_url("projects/p/secrets/s"),
            "https://iam.internal:9443/v1/projects/p/secrets/s:testIamPermissions"
        );
    }

    #[test]
    fn test_invalid_endpoint() {
        assert!(matches!(
            HttpPolicyOracle::new("http://"),
            Err(AuthzError::InvalidEndpoint { .. })
        ));
    }

    #[tokio::test]
    async fn test_unreachable_oracle_is_an_error() {
        let oracle = HttpPolicyOracle::new("127.0.0.1:1").unwrap();
        let result = oracle
            .check("user:a@example.com", "projects/p", "secretmanager.secrets.list")
            .await;
        assert!(matches!(result, Err(OracleError::Request(_))));
    }
}
