use thiserror::Error;

/// Top-level error taxonomy for the marketplace core.
///
/// Every public service operation returns one of these kinds; nothing from
/// the storage layer or below crosses the crate boundary uncaught. The
/// status code carried by [`CoreError::status_code`] is what the
/// surrounding controller layer maps into its responses.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Canonical status code for the surrounding controller layer.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::Validation(_) => 400,
            Self::Forbidden(_) => 403,
            Self::Conflict(_) => 409,
            Self::Database(_) | Self::Serialization(_) | Self::Internal(_) => 500,
        }
    }

    pub fn not_found(entity: impl Into<String>) -> Self {
        Self::NotFound(format!("{} not found", entity.into()))
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
