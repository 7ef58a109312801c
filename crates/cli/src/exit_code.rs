// Consistent exit codes for the tfvc CLI.
//
//   0   = success
//   1   = general error
//   2   = usage/argument error
//   3   = feature not supported by the server
//   11  = access denied
//   12  = reconcile reported failures
//   13  = transport fault
//   14  = local workspace storage error
//   130 = cancelled

use std::process;

use tfvc_common::VcError;

/// Named exit codes for the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    Error = 1,
    Usage = 2,
    NotSupported = 3,
    AccessDenied = 11,
    Reconcile = 12,
    Transport = 13,
    LocalStore = 14,
    Cancelled = 130,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Map an anyhow error to an exit code by inspecting the error chain.
    pub fn from_error(err: &anyhow::Error) -> Self {
        for cause in err.chain() {
            if let Some(vc) = cause.downcast_ref::<VcError>() {
                return Self::from_vc_error(vc);
            }
            if let Some(io_err) = cause.downcast_ref::<std::io::Error>() {
                return match io_err.kind() {
                    std::io::ErrorKind::PermissionDenied => Self::AccessDenied,
                    std::io::ErrorKind::InvalidInput => Self::Usage,
                    _ => Self::Error,
                };
            }
        }
        Self::Error
    }

    pub fn from_vc_error(err: &VcError) -> Self {
        match err {
            VcError::Usage(_) => Self::Usage,
            VcError::FeatureNotSupported { .. } | VcError::CapabilityMissing(_) => {
                Self::NotSupported
            }
            VcError::Transport(_) => Self::Transport,
            VcError::AccessDenied(_) => Self::AccessDenied,
            VcError::Cancelled => Self::Cancelled,
            VcError::ReconcileFailed(_) => Self::Reconcile,
            VcError::LocalStore(_) => Self::LocalStore,
            VcError::VersionControl(_) => Self::Error,
        }
    }
}

impl From<ExitCode> for process::ExitCode {
    fn from(code: ExitCode) -> Self {
        process::ExitCode::from(code.code() as u8)
    }
}

#[cfg(test)]
mod tests {
    use tfvc_common::ServiceLevel;

    use super::*;

    #[test]
    fn vc_error_kinds_have_distinct_codes() {
        assert_eq!(ExitCode::from_vc_error(&VcError::usage("x")), ExitCode::Usage);
        assert_eq!(
            ExitCode::from_vc_error(&VcError::not_supported(
                "property filters",
                ServiceLevel::Tfs2012Update2,
                ServiceLevel::Tfs2010,
            )),
            ExitCode::NotSupported
        );
        assert_eq!(ExitCode::from_vc_error(&VcError::Cancelled), ExitCode::Cancelled);
        assert_eq!(
            ExitCode::from_vc_error(&VcError::AccessDenied("no".into())),
            ExitCode::AccessDenied
        );
        assert_eq!(
            ExitCode::from_vc_error(&VcError::ReconcileFailed(Vec::new())),
            ExitCode::Reconcile
        );
        assert_eq!(
            ExitCode::from_vc_error(&VcError::LocalStore("locked".into())),
            ExitCode::LocalStore
        );
    }

    #[test]
    fn vc_error_is_found_behind_context() {
        let err = anyhow::Error::new(VcError::usage("no paths"))
            .context("failed to queue edits");
        assert_eq!(ExitCode::from_error(&err), ExitCode::Usage);
    }

    #[test]
    fn permission_denied_io_is_access_denied() {
        let err = anyhow::Error::new(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "read-only",
        ));
        assert_eq!(ExitCode::from_error(&err), ExitCode::AccessDenied);
    }

    #[test]
    fn generic_error_is_general() {
        let err = anyhow::anyhow!("something went wrong");
        assert_eq!(ExitCode::from_error(&err), ExitCode::Error);
        assert_eq!(ExitCode::Cancelled.code(), 130);
    }
}
