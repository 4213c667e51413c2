//! User-visible error type for the command-layer boundary

/// Errors surfaced to the interactive (chat command) path
///
/// Background-path failures are never surfaced here; they are contained
/// per-cycle and observed via logging only.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Daily alias limit of {limit} reached")]
    QuotaExceeded { limit: u32 },

    #[error("Address '{local_part}' already exists")]
    AliasExists { local_part: String },

    #[error("Invalid address name '{local_part}': lowercase letters and digits only")]
    InvalidLocalPart { local_part: String },

    #[error("Expiry must lie after creation")]
    InvalidTtl,

    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("Storage error: {message}")]
    Store { message: String },
}

impl From<anyhow::Error> for RelayError {
    fn from(e: anyhow::Error) -> Self {
        RelayError::Store {
            message: format!("{e:#}"),
        }
    }
}
