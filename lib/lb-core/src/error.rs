use lb_api::{Protocol, RequestError};
use thiserror::Error;

use crate::client::{ResourceKind, Verb};

pub type Result<T> = std::result::Result<T, CloudError>;

#[derive(Error, Debug)]
pub enum CloudError {
    #[error("{kind} not found: {name}")]
    NotFound { kind: ResourceKind, name: String },

    #[error("Provider rejected {verb} of {kind} {name}: {message}")]
    ProviderRejected {
        kind: ResourceKind,
        verb: Verb,
        name: String,
        message: String,
    },

    #[error("Security rule priorities exhausted in range [{min}, {max})")]
    PriorityRangeExhausted { min: u16, max: u16 },

    #[error("Unsupported protocol {0}: only TCP and UDP can be load balanced")]
    UnsupportedProtocol(Protocol),

    #[error("Invalid source range {range}: {reason}")]
    InvalidSourceRange { range: String, reason: String },

    #[error("No public IP address with IP {0} in the resource group")]
    PinnedPublicIpNotFound(String),

    #[error("Invalid exposure request: {0}")]
    InvalidRequest(#[from] RequestError),

    #[error("Configuration error: {0}")]
    ConfigJson(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigYaml(#[from] serde_yaml::Error),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("Reconcile worker stopped")]
    WorkerStopped,
}

impl CloudError {
    pub fn not_found(kind: ResourceKind, name: impl Into<String>) -> Self {
        CloudError::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// Absence is "no current state" for reconciliation, never a failure
    pub fn is_not_found(&self) -> bool {
        matches!(self, CloudError::NotFound { .. })
    }
}
