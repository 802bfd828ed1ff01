//! Resource names
//!
//! Secrets live at `projects/{project}/secrets/{secret}` and their versions at
//! `projects/{project}/secrets/{secret}/versions/{version}`, where `{version}`
//! is a decimal id or the `latest` alias.

use std::fmt;

use thiserror::Error;

/// Alias resolving to the highest-numbered enabled version
pub const LATEST: &str = "latest";

const MAX_SECRET_ID_LEN: usize = 255;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("Invalid resource name [{name}]: expected {expected}")]
    Malformed {
        name: String,
        expected: &'static str,
    },

    #[error("Invalid version id [{0}]: expected a positive integer or \"latest\"")]
    InvalidVersion(String),

    #[error("Invalid secret id [{0}]: must be 1-255 characters of letters, digits, '-' or '_'")]
    InvalidSecretId(String),
}

/// `projects/{project}`; returns the project id
pub fn parse_parent(parent: &str) -> Result<String, NameError> {
    match segments(parent).as_slice() {
        ["projects", project] => Ok((*project).to_string()),
        _ => Err(NameError::Malformed {
            name: parent.to_string(),
            expected: "projects/{project}",
        }),
    }
}

/// Check a caller-chosen secret id against the service's naming rule
pub fn validate_secret_id(secret_id: &str) -> Result<(), NameError> {
    let valid = !secret_id.is_empty()
        && secret_id.len() <= MAX_SECRET_ID_LEN
        && secret_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(NameError::InvalidSecretId(secret_id.to_string()))
    }
}

/// Truncate a version path to its owning secret.
///
/// Anything that does not start with `projects/{p}/secrets/{s}` comes back unchanged.
pub fn normalize_secret_resource(name: &str) -> String {
    let parts: Vec<&str> = name.split('/').collect();
    if parts.len() >= 4 && parts[0] == "projects" && parts[2] == "secrets" {
        parts[..4].join("/")
    } else {
        name.to_string()
    }
}

/// Version-level permissions are checked against the full version path
pub fn normalize_version_resource(name: &str) -> String {
    name.to_string()
}

/// Creation and listing are checked against the parent as given
pub fn normalize_parent(parent: &str) -> String {
    parent.to_string()
}

/// Split on `/`, rejecting empty segments by returning an empty list
fn segments(name: &str) -> Vec<&str> {
    let parts: Vec<&str> = name.split('/').collect();
    if parts.iter().any(|p| p.is_empty()) {
        Vec::new()
    } else {
        parts
    }
}

/// Fully-qualified secret name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SecretName {
    pub project: String,
    pub secret_id: String,
}

impl SecretName {
    pub fn new(project: impl Into<String>, secret_id: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            secret_id: secret_id.into(),
        }
    }

    pub fn parse(name: &str) -> Result<Self, NameError> {
        match segments(name).as_slice() {
            ["projects", project, "secrets", secret] => Ok(Self::new(*project, *secret)),
            _ => Err(NameError::Malformed {
                name: name.to_string(),
                expected: "projects/{project}/secrets/{secret}",
            }),
        }
    }

    /// `projects/{project}`
    pub fn parent(&self) -> String {
        format!("projects/{}", self.project)
    }

    pub fn version(&self, version_id: u64) -> SecretVersionName {
        SecretVersionName {
            secret: self.clone(),
            version: VersionSelector::Id(version_id),
        }
    }
}

impl fmt::Display for SecretName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "projects/{}/secrets/{}", self.project, self.secret_id)
    }
}

/// The version segment of a version name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionSelector {
    Latest,
    Id(u64),
}

impl VersionSelector {
    pub fn parse(segment: &str) -> Result<Self, NameError> {
        if segment == LATEST {
            return Ok(Self::Latest);
        }
        if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
            return Err(NameError::InvalidVersion(segment.to_string()));
        }
        segment
            .parse::<u64>()
            .map(Self::Id)
            .map_err(|_| NameError::InvalidVersion(segment.to_string()))
    }
}

impl fmt::Display for VersionSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => f.write_str(LATEST),
            Self::Id(id) => write!(f, "{}", id),
        }
    }
}

/// Fully-qualified secret version name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretVersionName {
    pub secret: SecretName,
    pub version: VersionSelector,
}

impl SecretVersionName {
    pub fn parse(name: &str) -> Result<Self, NameError> {
        match segments(name).as_slice() {
            ["projects", project, "secrets", secret, "versions", version] => Ok(Self {
                secret: SecretName::new(*project, *secret),
                version: VersionSelector::parse(version)?,
            }),
            _ => Err(NameError::Malformed {
                name: name.to_string(),
                expected: "projects/{project}/secrets/{secret}/versions/{version}",
            }),
        }
    }
}

impl fmt::Display for SecretVersionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/versions/{}", self.secret, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_secret_name() {
        let name = SecretName::parse("projects/test-project/secrets/db-password").unwrap();
        assert_eq!(name.project, "test-project");
        assert_eq!(name.secret_id, "db-password");
        assert_eq!(name.parent(), "projects/test-project");
        assert_eq!(name.to_string(), "projects/test-project/secrets/db-password");
    }

    #[test]
    fn test_malformed_secret_names() {
        for bad in [
            "",
            "projects/p",
            "projects/p/secrets",
            "projects/p/secrets/",
            "project/p/secrets/s",
            "projects/p/keys/s",
            "projects//secrets/s",
            "projects/p/secrets/s/versions/1",
        ] {
            assert!(SecretName::parse(bad).is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn test_parse_version_name() {
        let name = SecretVersionName::parse("projects/p/secrets/s/versions/42").unwrap();
        assert_eq!(name.secret, SecretName::new("p", "s"));
        assert_eq!(name.version, VersionSelector::Id(42));
        assert_eq!(name.to_string(), "projects/p/secrets/s/versions/42");

        let latest = SecretVersionName::parse("projects/p/secrets/s/versions/latest").unwrap();
        assert_eq!(latest.version, VersionSelector::Latest);
    }

    #[test]
    fn test_invalid_version_segment() {
        assert_eq!(
            SecretVersionName::parse("projects/p/secrets/s/versions/abc"),
            Err(NameError::InvalidVersion("abc".to_string()))
        );
        assert!(SecretVersionName::parse("projects/p/secrets/s/versions/+1").is_err());
        assert!(SecretVersionName::parse("projects/p/secrets/s/versions/-1").is_err());
        assert!(SecretVersionName::parse("projects/p/secrets/s/versions/LATEST").is_err());
        assert!(SecretVersionName::parse("projects/p/secrets/s/revisions/1").is_err());
    }

    #[test]
    fn test_parse_parent() {
        assert_eq!(parse_parent("projects/p").unwrap(), "p");
        assert!(parse_parent("projects").is_err());
        assert!(parse_parent("projects/").is_err());
        assert!(parse_parent("projects/p/secrets").is_err());
        assert!(parse_parent("folders/p").is_err());
    }

    #[test]
    fn test_normalize_secret_resource() {
        assert_eq!(
            normalize_secret_resource("projects/p/secrets/s/versions/3"),
            "projects/p/secrets/s"
        );
        assert_eq!(
            normalize_secret_resource("projects/p/secrets/s"),
            "projects/p/secrets/s"
        );
        assert_eq!(normalize_secret_resource("garbage"), "garbage");
        assert_eq!(normalize_secret_resource("projects/p"), "projects/p");
    }

    #[test]
    fn test_identity_normalizers() {
        let version = "projects/p/secrets/s/versions/latest";
        assert_eq!(normalize_version_resource(version), version);
        assert_eq!(normalize_parent("projects/p"), "projects/p");
    }

    #[test]
    fn test_validate_secret_id() {
        assert!(validate_secret_id("db_password-2").is_ok());
        assert!(validate_secret_id(&"a".repeat(255)).is_ok());
        assert!(validate_secret_id(&"a".repeat(256)).is_err());
        assert!(validate_secret_id("").is_err());
        assert!(validate_secret_id("has/slash").is_err());
        assert!(validate_secret_id("dotted.name").is_err());
    }
}
