use std::fmt;

use thiserror::Error;

pub type SelectionResult<T> = Result<T, SelectionError>;

/// External collaborators the selection pipeline reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collaborator {
    Catalog,
    AdEvents,
    BrowsingHistory,
    SubdivisionTargeting,
    AntiTargeting,
}

impl Collaborator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collaborator::Catalog => "catalog",
            Collaborator::AdEvents => "ad_events",
            Collaborator::BrowsingHistory => "browsing_history",
            Collaborator::SubdivisionTargeting => "subdivision_targeting",
            Collaborator::AntiTargeting => "anti_targeting",
        }
    }
}

impl fmt::Display for Collaborator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum SelectionError {
    #[error("Collaborator {collaborator} unavailable: {reason}")]
    CollaboratorUnavailable {
        collaborator: Collaborator,
        reason: String,
    },

    #[error("Invalid cap configuration: {0}")]
    InvalidCapConfiguration(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl SelectionError {
    pub fn unavailable(collaborator: Collaborator, reason: impl Into<String>) -> Self {
        SelectionError::CollaboratorUnavailable {
            collaborator,
            reason: reason.into(),
        }
    }

    /// The collaborator that failed, if this is a collaborator error.
    pub fn collaborator(&self) -> Option<Collaborator> {
        match self {
            SelectionError::CollaboratorUnavailable { collaborator, .. } => Some(*collaborator),
            _ => None,
        }
    }
}
