use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced by every lifecycle operation.
///
/// Gateways report a missing remote object as [`Error::NotFound`] so the
/// orchestrator can give it reconciliation meaning (stale status demotion,
/// idempotent route removal). Every other upstream failure is an
/// [`Error::ExternalService`].
#[derive(Debug, Error)]
pub enum Error {
    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },

    #[error("{0}")]
    Conflict(String),

    #[error("{service} request failed{}: {message}", status.map(|s| format!(" (status {s})")).unwrap_or_default())]
    ExternalService {
        service: &'static str,
        status: Option<u16>,
        message: String,
    },

    #[error("{0}")]
    Validation(String),

    #[error("state store: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn external(service: &'static str, status: Option<u16>, message: impl Into<String>) -> Self {
        Self::ExternalService {
            service,
            status,
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// An upstream "object already exists" answer (HTTP 409).
    pub fn is_already_exists(&self) -> bool {
        matches!(
            self,
            Self::ExternalService {
                status: Some(409),
                ..
            }
        )
    }
}
