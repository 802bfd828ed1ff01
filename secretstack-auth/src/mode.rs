//! Authorization modes

use serde::Deserialize;
use std::str::FromStr;

use crate::error::AuthzError;

/// How the gate behaves when consulted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Never check; every call is allowed
    #[default]
    Off,
    /// Check, but allow when the oracle cannot be reached or errors
    Permissive,
    /// Check, and reject on denial, oracle error or unreachable oracle
    Strict,
}

impl AuthMode {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::Off)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Permissive => "permissive",
            Self::Strict => "strict",
        }
    }
}

impl FromStr for AuthMode {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "off" | "disabled" => Ok(Self::Off),
            "permissive" => Ok(Self::Permissive),
            "strict" => Ok(Self::Strict),
            other => Err(AuthzError::InvalidMode(other.to_string())),
        }
    }
}

impl std::fmt::Display for AuthMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_modes() {
        assert_eq!("off".parse::<AuthMode>().unwrap(), AuthMode::Off);
        assert_eq!("".parse::<AuthMode>().unwrap(), AuthMode::Off);
        assert_eq!("Permissive".parse::<AuthMode>().unwrap(), AuthMode::Permissive);
        assert_eq!(" strict ".parse::<AuthMode>().unwrap(), AuthMode::Strict);
        assert!(matches!(
            "lenient".parse::<AuthMode>(),
            Err(AuthzError::InvalidMode(_))
        ));
    }

    #[test]
    fn test_default_is_off() {
        assert_eq!(AuthMode::default(), AuthMode::Off);
        assert!(!AuthMode::Off.is_enabled());
        assert!(AuthMode::Strict.is_enabled());
    }
}
