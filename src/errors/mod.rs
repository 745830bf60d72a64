use thiserror::Error;

/// Fixed recovery-guidance text appended to every user-facing denial so the
/// model can recover on the next turn instead of retrying the same action.
pub const DENIED_GUIDANCE: &str =
    "User denied this action. Try a different approach or ask the user for guidance";

/// Typed error hierarchy for neoclaw.
///
/// Use at module boundaries (approval decisions, policy evaluation, tool
/// execution, provider calls). Internal/leaf functions can continue using
/// `anyhow::Result` — the `Internal` variant allows seamless conversion via
/// the `?` operator.
#[derive(Debug, Error)]
pub enum NeoclawError {
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    /// A deny pattern matched, or the user explicitly denied. The display
    /// always carries the recovery-guidance phrase.
    #[error("{reason}. {DENIED_GUIDANCE}")]
    PolicyDenied { reason: String },

    #[error("approval required: {0}")]
    ApprovalRequired(String),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parse error: {0}")]
    Parse(String),

    /// Context cancellation. Propagated upward verbatim; never rendered into
    /// a tool result.
    #[error("operation canceled")]
    Canceled,

    #[error("{what} timed out after {seconds}s")]
    Timeout { what: String, seconds: u64 },

    #[error("agent turn exceeded {0} iterations without a final response")]
    MaxIterations(usize),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl NeoclawError {
    pub fn denied(reason: impl Into<String>) -> Self {
        Self::PolicyDenied {
            reason: reason.into(),
        }
    }

    pub fn io(path: impl ToString, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_string(),
            source,
        }
    }

    /// Whether this error is a cancellation, directly or wrapped through the
    /// `Internal` bridge.
    pub fn is_canceled(&self) -> bool {
        match self {
            Self::Canceled => true,
            Self::Internal(e) => e
                .downcast_ref::<NeoclawError>()
                .is_some_and(NeoclawError::is_canceled),
            _ => false,
        }
    }
}
