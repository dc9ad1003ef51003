pub mod adjustments;
pub mod admin;
pub mod invoices;
pub mod members;
pub mod payments;
pub mod root;

use serde::Serialize;

/// Uniform response envelope: `{success, data?, message?}`. Errors use
/// the matching `{success: false, error}` shape via `AppError`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> axum::Json<Self> {
        axum::Json(Self {
            success: true,
            data: Some(data),
            message: None,
        })
    }

    pub fn with_message(data: T, message: impl Into<String>) -> axum::Json<Self> {
        axum::Json(Self {
            success: true,
            data: Some(data),
            message: Some(message.into()),
        })
    }
}
