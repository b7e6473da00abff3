use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Uniform response envelope. `status` is `"success"` or `"error"`; `data`
/// is absent on errors.
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub status: String,
    pub message: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T>
where
    T: Serialize,
{
    pub fn success(data: T, message: &str) -> Self {
        Self {
            status: "success".to_string(),
            message: message.to_string(),
            data: Some(data),
        }
    }

    pub fn error(message: &str) -> Self {
        Self {
            status: "error".to_string(),
            message: message.to_string(),
            data: None,
        }
    }
}

/// Envelope plus the HTTP status it ships with (201 on admission, 200
/// elsewhere).
pub struct ApiSuccess<T>(pub T, pub StatusCode);

impl<T> IntoResponse for ApiSuccess<ApiResponse<T>>
where
    T: Serialize,
{
    fn into_response(self) -> Response {
        let ApiSuccess(envelope, status) = self;
        (status, Json(envelope)).into_response()
    }
}

/// Error message plus status, used directly by the auth middlewares and as
/// the terminal form of `AppError`.
pub struct ApiError(pub String, pub StatusCode);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let ApiError(message, status) = self;
        (status, Json(ApiResponse::<()>::error(&message))).into_response()
    }
}
