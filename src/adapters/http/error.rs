use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use tracing::error;

use crate::application::dto::ErrorResponse;
use crate::domain::errors::DomainError;

const INTERNAL_DETAIL: &str = "Internal server error during image processing";

/// Error de la capa HTTP. Los 500 nunca exponen el detalle interno.
#[derive(Debug)]
pub enum ApiError {
    NotReady,
    BadRequest(String),
    /// Rechazo del cuerpo con el estado que dicta el extractor (p. ej. 413 por tamaño).
    Rejected(StatusCode, String),
    Internal(String),
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::ImageDecode(msg) => ApiError::BadRequest(format!("Invalid image data: {msg}")),
            DomainError::ModelLoad(msg) => {
                error!("Modelo no disponible: {}", msg);
                ApiError::NotReady
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::NotReady => (StatusCode::SERVICE_UNAVAILABLE, "Service not ready".to_string()),
            ApiError::BadRequest(detail) => (StatusCode::BAD_REQUEST, detail),
            ApiError::Rejected(status, detail) => (status, detail),
            ApiError::Internal(detail) => {
                error!("Error inesperado procesando la imagen: {}", detail);
                (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_DETAIL.to_string())
            }
        };
        (status, Json(ErrorResponse { detail })).into_response()
    }
}
