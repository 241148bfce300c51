use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error("Invalid stored data: {0}")]
    InvalidData(String),
    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),
    #[error("Background task failed: {0}")]
    Join(String),
    #[error("Display surface is disabled")]
    SurfaceDisabled,
    #[error("Display surface is unsupported on this runtime")]
    SurfaceUnsupported,
    #[error("Display surface timed out after {0}ms")]
    SurfaceTimeout(u64),
    #[error("Display surface failed: {0}")]
    Surface(String),
}

impl InfraError {
    /// Short category used when a display-surface failure is logged.
    pub fn surface_category(&self) -> &'static str {
        match self {
            Self::SurfaceDisabled => "disabled",
            Self::SurfaceUnsupported => "unsupported",
            Self::SurfaceTimeout(_) => "timeout",
            _ => "failed",
        }
    }
}
