use async_trait::async_trait;
use image::RgbImage;
use std::path::Path;

use crate::domain::{detection::Detection, errors::DomainResult, model::InferenceParams};

/// Resuelve el artefacto del modelo en disco antes de cargarlo.
#[async_trait]
pub trait ModelCatalogPort: Send + Sync {
    async fn ensure_available(&self, model_path: &Path) -> DomainResult<()>;
}

/// Motor de inferencia ya cargado. Es bloqueante y se invoca con `&mut self`,
/// así que el llamador serializa el acceso y lo ejecuta fuera del runtime async.
pub trait InferenceEngine: Send {
    fn infer(&mut self, image: &RgbImage, params: &InferenceParams) -> DomainResult<Vec<Detection>>;

    /// Pasada opcional de calentamiento tras la carga.
    fn warm_up(&mut self, _params: &InferenceParams) -> DomainResult<()> {
        Ok(())
    }
}

/// Construye un motor a partir de un fichero de pesos. Bloqueante.
pub trait ModelLoaderPort: Send + Sync {
    fn load(&self, model_path: &Path, params: &InferenceParams) -> DomainResult<Box<dyn InferenceEngine>>;
}
