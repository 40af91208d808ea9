use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    http::StatusCode,
    Json,
};
use tracing::{error, info};

use crate::adapters::http::{error::ApiError, state::HttpState};
use crate::application::dto::ServiceInfo;
use crate::domain::detection::DetectionResult;

const UPLOAD_FIELD: &str = "file";
const DEFAULT_FILENAME: &str = "uploaded_image";

pub async fn info(State(st): State<HttpState>) -> Json<ServiceInfo> {
    Json(st.info.as_ref().clone())
}

/// Liveness: si el proceso responde, está vivo. No mira el modelo.
pub async fn livez() -> StatusCode {
    StatusCode::OK
}

pub async fn readyz(State(st): State<HttpState>) -> StatusCode {
    match st.app.ready_detector() {
        Some(_) => StatusCode::OK,
        None => {
            error!("Servicio no listo, estado actual: {:?}", st.app.state());
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

pub async fn detect(
    State(st): State<HttpState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<DetectionResult>, ApiError> {
    // La puerta va antes de tocar el cuerpo de la petición.
    let Some(detector) = st.app.ready_detector() else {
        error!("Servicio no listo, estado actual: {:?}", st.app.state());
        return Err(ApiError::NotReady);
    };

    let mut multipart = multipart.map_err(|e| ApiError::Rejected(e.status(), e.body_text()))?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Rejected(e.status(), format!("Multipart error: {}", e.body_text())))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let filename = field
            .file_name()
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_FILENAME)
            .to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::Rejected(e.status(), format!("Failed to read file: {}", e.body_text())))?;
        upload = Some((filename, data));
        break;
    }

    let Some((filename, data)) = upload else {
        return Err(ApiError::BadRequest("No file provided".into()));
    };
    if data.is_empty() {
        error!("Fichero vacío recibido: {}", filename);
        return Err(ApiError::BadRequest("Empty file provided".into()));
    }

    info!("Procesando detección para {} ({} bytes)", filename, data.len());
    let result = detector.detect(&data, &filename).await?;
    info!(
        "Detección completada para {}: {} persona(s), confianza {:.2}",
        filename, result.num_persons, result.confidence
    );
    Ok(Json(result))
}
