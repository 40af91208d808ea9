use serde::{Deserialize, Serialize};

pub const SERVICE_NAME: &str = "Person Detector";
pub const SERVICE_DESCRIPTION: &str = "API to detect if a person is in camera images";

/// Metadatos expuestos en `GET /`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub name: String,
    pub version: String,
    pub description: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            name: SERVICE_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            description: SERVICE_DESCRIPTION.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}
