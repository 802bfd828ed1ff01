//! Secret version lifecycle

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Lifecycle state of a secret version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VersionState {
    Enabled,
    Disabled,
    /// Terminal; the payload is gone
    Destroyed,
}

/// A requested state change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Enable,
    Disable,
    Destroy,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot {transition} a version in state {from}")]
pub struct TransitionError {
    pub from: VersionState,
    pub transition: Transition,
}

impl VersionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enabled => "ENABLED",
            Self::Disabled => "DISABLED",
            Self::Destroyed => "DESTROYED",
        }
    }

    /// Only enabled versions hand out their payload
    pub fn is_accessible(&self) -> bool {
        matches!(self, Self::Enabled)
    }

    /// The state after applying `transition`.
    ///
    /// Repeating a transition that already holds is a no-op; the only rejected
    /// moves are enable and disable out of `DESTROYED`.
    pub fn apply(self, transition: Transition) -> Result<VersionState, TransitionError> {
        match (self, transition) {
            (Self::Destroyed, Transition::Destroy) => Ok(Self::Destroyed),
            (Self::Destroyed, _) => Err(TransitionError {
                from: self,
                transition,
            }),
            (_, Transition::Enable) => Ok(Self::Enabled),
            (_, Transition::Disable) => Ok(Self::Disabled),
            (_, Transition::Destroy) => Ok(Self::Destroyed),
        }
    }
}

impl std::fmt::Display for VersionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VersionState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ENABLED" => Ok(Self::Enabled),
            "DISABLED" => Ok(Self::Disabled),
            "DESTROYED" => Ok(Self::Destroyed),
            other => Err(format!("unknown version state: {}", other)),
        }
    }
}

impl std::fmt::Display for Transition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Enable => "enable",
            Self::Disable => "disable",
            Self::Destroy => "destroy",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use VersionState::*;

    #[test]
    fn test_transition_table() {
        assert_eq!(Enabled.apply(Transition::Disable), Ok(Disabled));
        assert_eq!(Disabled.apply(Transition::Disable), Ok(Disabled));
        assert_eq!(Disabled.apply(Transition::Enable), Ok(Enabled));
        assert_eq!(Enabled.apply(Transition::Enable), Ok(Enabled));
        assert_eq!(Enabled.apply(Transition::Destroy), Ok(Destroyed));
        assert_eq!(Disabled.apply(Transition::Destroy), Ok(Destroyed));
        assert_eq!(Destroyed.apply(Transition::Destroy), Ok(Destroyed));
    }

    #[test]
    fn test_destroyed_is_terminal() {
        for t in [Transition::Enable, Transition::Disable] {
            let err = Destroyed.apply(t).unwrap_err();
            assert_eq!(err.from, Destroyed);
            assert_eq!(err.transition, t);
        }
        assert_eq!(
            Destroyed.apply(Transition::Enable).unwrap_err().to_string(),
            "cannot enable a version in state DESTROYED"
        );
    }

    #[test]
    fn test_only_enabled_is_accessible() {
        assert!(Enabled.is_accessible());
        assert!(!Disabled.is_accessible());
        assert!(!Destroyed.is_accessible());
    }

    #[test]
    fn test_parse_and_serialize() {
        assert_eq!("disabled".parse::<VersionState>(), Ok(Disabled));
        assert!("GONE".parse::<VersionState>().is_err());
        assert_eq!(serde_json::to_string(&Destroyed).unwrap(), "\"DESTROYED\"");
    }
}
