//! The pre-operation authorization gate

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{AuthzError, OracleError};
use crate::mode::AuthMode;
use crate::oracle::{HttpPolicyOracle, PolicyOracle};

/// Deadline applied to a single oracle check
pub const DEFAULT_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Settings the gate is built from; fixed for the life of the process
#[derive(Debug, Clone)]
pub struct AuthzConfig {
    pub mode: AuthMode,
    /// Policy oracle address, `host:port` or a URL
    pub endpoint: Option<String>,
    pub check_timeout: Duration,
}

impl Default for AuthzConfig {
    fn default() -> Self {
        Self {
            mode: AuthMode::Off,
            endpoint: None,
            check_timeout: DEFAULT_CHECK_TIMEOUT,
        }
    }
}

/// Consulted once per operation, before the store is touched.
///
/// With mode `off` no oracle exists at all. Otherwise a missing principal or
/// an explicit denial rejects the call; oracle failures reject in `strict`
/// and are allowed through in `permissive`.
#[derive(Clone)]
pub struct AuthzGate {
    mode: AuthMode,
    oracle: Option<Arc<dyn PolicyOracle>>,
    check_timeout: Duration,
}

impl std::fmt::Debug for AuthzGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthzGate")
            .field("mode", &self.mode)
            .field("oracle", &self.oracle.is_some())
            .field("check_timeout", &self.check_timeout)
            .finish()
    }
}

impl Default for AuthzGate {
    fn default() -> Self {
        Self::disabled()
    }
}

impl AuthzGate {
    /// A gate that allows everything and never contacts an oracle
    pub fn disabled() -> Self {
        Self {
            mode: AuthMode::Off,
            oracle: None,
            check_timeout: DEFAULT_CHECK_TIMEOUT,
        }
    }

    /// A gate in `mode` backed by `oracle`. The oracle is dropped for mode `off`.
    pub fn new(mode: AuthMode, oracle: Arc<dyn PolicyOracle>) -> Self {
        Self {
            mode,
            oracle: mode.is_enabled().then_some(oracle),
            check_timeout: DEFAULT_CHECK_TIMEOUT,
        }
    }

    /// Build the gate from configuration, creating an HTTP oracle client when needed
    pub fn from_config(config: &AuthzConfig) -> Result<Self, AuthzError> {
        if !config.mode.is_enabled() {
            return Ok(Self::disabled().with_check_timeout(config.check_timeout));
        }

        let endpoint = config
            .endpoint
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .ok_or(AuthzError::MissingEndpoint(config.mode))?;
        let oracle = HttpPolicyOracle::new(endpoint)?;

        Ok(Self::new(config.mode, Arc::new(oracle)).with_check_timeout(config.check_timeout))
    }

    pub fn with_check_timeout(mut self, check_timeout: Duration) -> Self {
        self.check_timeout = check_timeout;
        self
    }

    pub fn mode(&self) -> AuthMode {
        self.mode
    }

    /// Decide whether `principal` may exercise `permission` on `resource`
    pub async fn authorize(
        &self,
        principal: Option<&str>,
        resource: &str,
        permission: &str,
    ) -> Result<(), AuthzError> {
        if !self.mode.is_enabled() {
            return Ok(());
        }

        let denied = || AuthzError::PermissionDenied {
            permission: permission.to_string(),
            resource: resource.to_string(),
        };

        let Some(principal) = principal.filter(|p| !p.trim().is_empty()) else {
            debug!(resource = %resource, permission = %permission, "No principal on request");
            return Err(denied());
        };

        let outcome = match &self.oracle {
            Some(oracle) => tokio::time::timeout(
                self.check_timeout,
                oracle.check(principal, resource, permission),
            )
            .await
            .unwrap_or(Err(OracleError::Timeout(self.check_timeout))),
            None => Err(OracleError::Unavailable("no policy oracle configured".to_string())),
        };

        match outcome {
            Ok(true) => Ok(()),
            Ok(false) => {
                debug!(principal = %principal, resource = %resource, permission = %permission, "Permission denied");
                Err(denied())
            }
            Err(e) if self.mode == AuthMode::Permissive => {
                warn!(error = %e, resource = %resource, permission = %permission, "Policy oracle check failed, allowing (permissive)");
                Ok(())
            }
            Err(e) => Err(AuthzError::CheckFailed(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Answer {
        Allow,
        Deny,
        Fail,
        Hang,
    }

    struct ScriptedOracle {
        answer: Answer,
        calls: AtomicUsize,
    }

    impl ScriptedOracle {
        fn new(answer: Answer) -> Arc<Self> {
            Arc::new(Self {
                answer,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl PolicyOracle for ScriptedOracle {
        async fn check(&self, _: &str, _: &str, _: &str) -> Result<bool, OracleError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.answer {
                Answer::Allow => Ok(true),
                Answer::Deny => Ok(false),
                Answer::Fail => Err(OracleError::Unavailable("connection refused".to_string())),
                Answer::Hang => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(true)
                }
            }
        }
    }

    const PERM: &str = "secretmanager.secrets.create";

    #[tokio::test]
    async fn test_off_never_consults_oracle() {
        let oracle = ScriptedOracle::new(Answer::Deny);
        let gate = AuthzGate::new(AuthMode::Off, oracle.clone());

        assert!(gate.authorize(None, "projects/p", PERM).await.is_ok());
        assert!(gate.authorize(Some("user:x"), "projects/p", PERM).await.is_ok());
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_principal_is_denied() {
        for mode in [AuthMode::Permissive, AuthMode::Strict] {
            let oracle = ScriptedOracle::new(Answer::Allow);
            let gate = AuthzGate::new(mode, oracle.clone());

            let result = gate.authorize(None, "projects/p", PERM).await;
            assert!(matches!(result, Err(AuthzError::PermissionDenied { .. })));
            assert_eq!(oracle.calls.load(Ordering::SeqCst), 0);
        }
    }

    #[tokio::test]
    async fn test_explicit_denial_rejects_in_both_modes() {
        for mode in [AuthMode::Permissive, AuthMode::Strict] {
            let gate = AuthzGate::new(mode, ScriptedOracle::new(Answer::Deny));
            let result = gate.authorize(Some("user:x"), "projects/p", PERM).await;
            assert!(matches!(result, Err(AuthzError::PermissionDenied { .. })));
        }
    }

    #[tokio::test]
    async fn test_oracle_failure_fails_open_when_permissive() {
        let gate = AuthzGate::new(AuthMode::Permissive, ScriptedOracle::new(Answer::Fail));
        assert!(gate.authorize(Some("user:x"), "projects/p", PERM).await.is_ok());
    }

    #[tokio::test]
    async fn test_oracle_failure_fails_closed_when_strict() {
        let gate = AuthzGate::new(AuthMode::Strict, ScriptedOracle::new(Answer::Fail));
        let result = gate.authorize(Some("user:x"), "projects/p", PERM).await;
        assert!(matches!(result, Err(AuthzError::CheckFailed(_))));
    }

    #[tokio::test]
    async fn test_slow_oracle_times_out() {
        let strict = AuthzGate::new(AuthMode::Strict, ScriptedOracle::new(Answer::Hang))
            .with_check_timeout(Duration::from_millis(20));
        let result = strict.authorize(Some("user:x"), "projects/p", PERM).await;
        assert!(matches!(
            result,
            Err(AuthzError::CheckFailed(OracleError::Timeout(_)))
        ));

        let permissive = AuthzGate::new(AuthMode::Permissive, ScriptedOracle::new(Answer::Hang))
            .with_check_timeout(Duration::from_millis(20));
        assert!(permissive
            .authorize(Some("user:x"), "projects/p", PERM)
            .await
            .is_ok());
    }

    #[test]
    fn test_from_config() {
        let gate = AuthzGate::from_config(&AuthzConfig::default()).unwrap();
        assert_eq!(gate.mode(), AuthMode::Off);

        let missing = AuthzGate::from_config(&AuthzConfig {
            mode: AuthMode::Strict,
            ..AuthzConfig::default()
        });
        assert!(matches!(missing, Err(AuthzError::MissingEndpoint(AuthMode::Strict))));

        let gate = AuthzGate::from_config(&AuthzConfig {
            mode: AuthMode::Permissive,
            endpoint: Some("localhost:8080".to_string()),
            check_timeout: Duration::from_secs(1),
        })
        .unwrap();
        assert_eq!(gate.mode(), AuthMode::Permissive);
    }
}
