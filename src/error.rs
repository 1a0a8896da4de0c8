//! Reconciliation errors
//!
//! Every failure of one reconciliation attempt ends up as a [`ReconcileError`];
//! its [`ErrorCategory`] tells the controller how to schedule the next attempt.

use crate::api::ObjectKey;
use crate::store::StoreError;
use identity::Availability;
use std::fmt;

/// How a failed reconciliation should be treated by the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// A required object is missing
    NotFound,
    /// Keystone or the store failed; retry with backoff
    TransientIo,
    /// Status write lost an optimistic-concurrency race; retry immediately
    Conflict,
    /// The request can never succeed as written
    InvalidInput,
    /// Keystone holds duplicate endpoints that need manual cleanup
    Ambiguous,
}

impl ErrorCategory {
    /// Whether another attempt may succeed without operator action
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientIo | Self::Conflict | Self::NotFound)
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::NotFound => "Object not found",
            Self::TransientIo => "Keystone or store unavailable",
            Self::Conflict => "Concurrent modification",
            Self::InvalidInput => "Invalid input",
            Self::Ambiguous => "Ambiguous catalog state",
        }
    }

    pub fn advice(&self) -> &'static str {
        match self {
            Self::NotFound => "Create the KeystoneAPI object in the same namespace",
            Self::TransientIo => "Check Keystone reachability and the declared credentials",
            Self::Conflict => "The object changed while reconciling; it will be retried",
            Self::InvalidInput => "Use one of the endpoint roles admin, internal or public",
            Self::Ambiguous => "Delete the duplicate endpoints so at most one remains per role",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Errors raised by one reconciliation attempt
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("KeystoneAPI {0} not found")]
    KeystoneApiNotFound(ObjectKey),

    #[error("failed to read {key}")]
    Read {
        key: ObjectKey,
        #[source]
        source: StoreError,
    },

    #[error("failed to authenticate against Keystone")]
    Auth(#[source] identity::Error),

    #[error("failed to create or update service")]
    ServiceUpsert(#[source] identity::Error),

    #[error("failed to persist status of {key}")]
    PersistStatus {
        key: ObjectKey,
        #[source]
        source: StoreError,
    },

    #[error("failed to reconcile {role} endpoint")]
    Endpoint {
        role: Availability,
        #[source]
        source: identity::Error,
    },

    #[error("endpoint interface {0} not known")]
    InvalidRole(String),

    #[error(
        "{} {role} endpoints in region {region} ({}); expected at most one",
        .ids.len(),
        .ids.join(", ")
    )]
    AmbiguousEndpoints {
        role: Availability,
        region: String,
        ids: Vec<String>,
    },
}

impl ReconcileError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::KeystoneApiNotFound(_) => ErrorCategory::NotFound,
            Self::Read { source, .. } | Self::PersistStatus { source, .. } => match source {
                StoreError::Conflict { .. } => ErrorCategory::Conflict,
                StoreError::NotFound { .. } => ErrorCategory::NotFound,
                StoreError::Io { .. } | StoreError::Parse { .. } => ErrorCategory::TransientIo,
            },
            Self::Auth(_) | Self::ServiceUpsert(_) | Self::Endpoint { .. } => {
                ErrorCategory::TransientIo
            }
            Self::InvalidRole(_) => ErrorCategory::InvalidInput,
            Self::AmbiguousEndpoints { .. } => ErrorCategory::Ambiguous,
        }
    }

    /// Whether the controller should retry without waiting
    pub fn is_conflict(&self) -> bool {
        self.category() == ErrorCategory::Conflict
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> ObjectKey {
        ObjectKey::new("openstack", "glance")
    }

    #[test]
    fn test_categories() {
        assert_eq!(
            ReconcileError::KeystoneApiNotFound(key()).category(),
            ErrorCategory::NotFound
        );
        assert_eq!(
            ReconcileError::Auth(identity::Error::api(401, "denied")).category(),
            ErrorCategory::TransientIo
        );
        assert_eq!(
            ReconcileError::InvalidRole("private".into()).category(),
            ErrorCategory::InvalidInput
        );
    }

    #[test]
    fn test_status_conflict_is_conflict() {
        let err = ReconcileError::PersistStatus {
            key: key(),
            source: StoreError::Conflict {
                key: key(),
                expected: 1,
                actual: 2,
            },
        };
        assert!(err.is_conflict());
        assert!(err.category().is_retryable());
    }

    #[test]
    fn test_ambiguous_message_lists_ids() {
        let err = ReconcileError::AmbiguousEndpoints {
            role: Availability::Public,
            region: "regionOne".into(),
            ids: vec!["ep-1".into(), "ep-2".into()],
        };
        assert_eq!(
            err.to_string(),
            "2 public endpoints in region regionOne (ep-1, ep-2); expected at most one"
        );
        assert!(!err.category().is_retryable());
    }

    #[test]
    fn test_invalid_role_message() {
        assert_eq!(
            ReconcileError::InvalidRole("private".into()).to_string(),
            "endpoint interface private not known"
        );
    }
}
