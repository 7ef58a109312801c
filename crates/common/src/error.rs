// Unified error type for the version-control client.

use thiserror::Error;

use crate::level::ServiceLevel;
use crate::types::Failure;

/// Fault codes a transport reports for authorization problems.
const ACCESS_DENIED_CODES: &[&str] = &["AccessDenied", "Unauthorized", "Forbidden"];

/// A fault raised by a transport stub, before mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportFault {
    pub code: Option<String>,
    pub message: String,
}

impl TransportFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for TransportFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{code}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for TransportFault {}

#[derive(Debug, Error)]
pub enum VcError {
    #[error("invalid usage: {0}")]
    Usage(String),

    #[error("{message} (requires server version {required}, connected at {current})")]
    FeatureNotSupported {
        message: String,
        required: ServiceLevel,
        current: ServiceLevel,
    },

    #[error("the server does not support this feature: {0}")]
    CapabilityMissing(String),

    #[error("transport fault: {0}")]
    Transport(TransportFault),

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("reconcile failed with {} failure(s)", .0.len())]
    ReconcileFailed(Vec<Failure>),

    #[error("{0}")]
    VersionControl(String),

    #[error("local workspace storage error: {0}")]
    LocalStore(String),
}

impl VcError {
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage(message.into())
    }

    pub fn not_supported(
        message: impl Into<String>,
        required: ServiceLevel,
        current: ServiceLevel,
    ) -> Self {
        Self::FeatureNotSupported {
            message: message.into(),
            required,
            current,
        }
    }

    pub fn is_not_supported(&self) -> bool {
        matches!(self, Self::FeatureNotSupported { .. } | Self::CapabilityMissing(_))
    }
}

/// The only way a transport fault leaves the client layer.
pub fn map_fault(fault: TransportFault) -> VcError {
    match fault.code.as_deref() {
        Some(code) if ACCESS_DENIED_CODES.iter().any(|c| c.eq_ignore_ascii_case(code)) => {
            VcError::AccessDenied(fault.message)
        }
        _ => VcError::Transport(fault),
    }
}

impl From<TransportFault> for VcError {
    fn from(fault: TransportFault) -> Self {
        map_fault(fault)
    }
}

pub type Result<T, E = VcError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_denied_faults_are_distinguished() {
        let err = map_fault(TransportFault::with_code("accessdenied", "no read on $/P"));
        assert!(matches!(err, VcError::AccessDenied(ref m) if m == "no read on $/P"));
    }

    #[test]
    fn other_faults_stay_transport_errors() {
        let err: VcError = TransportFault::new("connection reset").into();
        assert!(matches!(err, VcError::Transport(_)));
        assert_eq!(err.to_string(), "transport fault: connection reset");
    }

    #[test]
    fn not_supported_message_names_levels() {
        let err = VcError::not_supported(
            "property filters",
            ServiceLevel::Tfs2012Update2,
            ServiceLevel::Tfs2010,
        );
        assert!(err.is_not_supported());
        assert_eq!(
            err.to_string(),
            "property filters (requires server version 2012.2, connected at 2010)"
        );
    }
}
