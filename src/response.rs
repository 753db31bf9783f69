use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Result envelope returned to the surrounding controller layer.
///
/// Mirrors the service-call contract the platform's controllers consume:
/// `success`, a canonical status code (200/201/400/403/404/409/500), a
/// human-readable message, the payload when present, and error details.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    pub status_code: u16,
    pub message: String,
    pub data: Option<T>,
    pub errors: Option<Vec<String>>,
}

impl<T> ApiResponse<T> {
    /// 200 with payload.
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self::success_with_code(data, message, 200)
    }

    /// 201 with payload, for freshly created entities.
    pub fn created(data: T, message: impl Into<String>) -> Self {
        Self::success_with_code(data, message, 201)
    }

    pub fn success_with_code(data: T, message: impl Into<String>, status_code: u16) -> Self {
        Self {
            success: true,
            status_code,
            message: message.into(),
            data: Some(data),
            errors: None,
        }
    }

    pub fn error(message: impl Into<String>, status_code: u16) -> Self {
        let message = message.into();
        Self {
            success: false,
            status_code,
            message: message.clone(),
            data: None,
            errors: Some(vec![message]),
        }
    }

    /// Build the envelope from a core result, mapping the error taxonomy to
    /// its canonical status code.
    pub fn from_result(result: crate::error::Result<T>, ok_message: impl Into<String>) -> Self {
        match result {
            Ok(data) => Self::ok(data, ok_message),
            Err(err) => Self::from(err),
        }
    }
}

impl<T> From<CoreError> for ApiResponse<T> {
    fn from(err: CoreError) -> Self {
        Self::error(err.to_string(), err.status_code())
    }
}
