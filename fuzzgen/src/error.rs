//! Error taxonomy for a generation run.
//!
//! Every variant aborts the run. Validation diagnostics are not errors: they
//! drive the repair loop and only surface here once the repair budget is spent.

use std::path::PathBuf;

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum HarnessError {
    /// Creating, reading, or writing a file failed.
    #[error("{action} {}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A file that must exist is absent.
    #[error("file not found: {}", .path.display())]
    NotFound { path: PathBuf },

    /// The generative service request failed (transport, quota, malformed reply).
    #[error("generative service request failed")]
    Service(#[source] BoxError),

    /// The validator itself could not run to completion.
    #[error("validator could not run on {}", .path.display())]
    ToolExecution {
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    /// The artifact kept failing validation after the allowed repairs.
    #[error("{unit}: artifact still invalid after {attempts} repair attempts: {diagnostic}")]
    RepairBudgetExhausted {
        unit: String,
        attempts: u32,
        diagnostic: String,
    },
}

impl HarnessError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }
}
