use image::RgbImage;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::{
    application::ports::{InferenceEngine, ModelCatalogPort, ModelLoaderPort},
    domain::{
        detection::{ClassId, Detection, DetectionResult},
        errors::{DomainError, DomainResult},
        model::InferenceParams,
        settings::{InferenceConfig, ModelConfig},
    },
};

type SharedEngine = Arc<Mutex<Box<dyn InferenceEngine>>>;

/// Decodifica los bytes subidos a un buffer RGB.
/// `image` entrega RGB directamente; escala de grises y RGBA se convierten.
pub fn decode_image(bytes: &[u8]) -> DomainResult<RgbImage> {
    if bytes.is_empty() {
        return Err(DomainError::ImageDecode("payload vacío".into()));
    }
    let img = image::load_from_memory(bytes).map_err(|e| DomainError::ImageDecode(e.to_string()))?;
    Ok(img.to_rgb8())
}

/// Detector de personas sobre un modelo externo cargado de forma perezosa.
///
/// La carga ocurre como mucho una vez: el primer llamador la dispara y los
/// concurrentes esperan al mismo resultado. El motor se serializa con un mutex,
/// tomado solo desde el hilo bloqueante que ejecuta la inferencia.
pub struct DetectorService {
    model_path: PathBuf,
    params: InferenceParams,
    classes: BTreeSet<ClassId>,
    loader: Arc<dyn ModelLoaderPort>,
    catalog: Arc<dyn ModelCatalogPort>,
    engine: OnceCell<SharedEngine>,
}

impl DetectorService {
    /// No carga el modelo. Falla pronto si el tamaño o el dispositivo no existen.
    pub fn new(
        model: &ModelConfig,
        inference: &InferenceConfig,
        classes: BTreeSet<ClassId>,
        loader: Arc<dyn ModelLoaderPort>,
        catalog: Arc<dyn ModelCatalogPort>,
    ) -> DomainResult<Self> {
        if classes.is_empty() {
            return Err(DomainError::ConfigInvalid("classes_to_detect está vacío".into()));
        }
        let model_path = model.resolve_model_path()?;
        let device = model.device()?;
        info!("Detector: dispositivo seleccionado {}, modelo {}", device, model_path.display());

        Ok(Self {
            model_path,
            params: inference.to_params(device, &classes),
            classes,
            loader,
            catalog,
            engine: OnceCell::new(),
        })
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    pub fn params(&self) -> &InferenceParams {
        &self.params
    }

    pub fn is_loaded(&self) -> bool {
        self.engine.initialized()
    }

    /// Carga (y calienta) el modelo si aún no lo está. Una carga fallida deja
    /// el detector sin modelo; el siguiente llamador vuelve a intentarlo.
    pub async fn ensure_loaded(&self) -> DomainResult<()> {
        self.engine().await.map(|_| ())
    }

    async fn engine(&self) -> DomainResult<SharedEngine> {
        let engine = self
            .engine
            .get_or_try_init(|| async {
                self.catalog.ensure_available(&self.model_path).await?;

                info!("Cargando modelo desde {}", self.model_path.display());
                let started = Instant::now();
                let loader = self.loader.clone();
                let path = self.model_path.clone();
                let params = self.params.clone();

                let engine = tokio::task::spawn_blocking(move || {
                    let mut engine = loader.load(&path, &params)?;
                    engine.warm_up(&params)?;
                    Ok::<_, DomainError>(engine)
                })
                .await
                .map_err(|e| DomainError::ModelLoad(format!("tarea de carga abortada: {e}")))?
                .map_err(|e| match e {
                    e @ DomainError::ModelLoad(_) => e,
                    other => DomainError::ModelLoad(other.to_string()),
                })?;

                info!("Modelo cargado en {:.0} ms", started.elapsed().as_secs_f32() * 1000.0);
                Ok::<_, DomainError>(Arc::new(Mutex::new(engine)))
            })
            .await?;
        Ok(engine.clone())
    }

    /// Detecta las clases objetivo en una imagen codificada.
    ///
    /// Los errores de decodificación y de carga del modelo se propagan; los
    /// fallos de inferencia en tiempo de ejecución se degradan a un resultado vacío.
    pub async fn detect(&self, image_bytes: &[u8], filename: &str) -> DomainResult<DetectionResult> {
        if image_bytes.is_empty() {
            return Err(DomainError::ImageDecode("payload vacío".into()));
        }

        // Primero la imagen: un upload corrupto es error del cliente aunque el modelo no esté disponible.
        let bytes = image_bytes.to_vec();
        let image = tokio::task::spawn_blocking(move || decode_image(&bytes))
            .await
            .map_err(|e| DomainError::Internal(format!("tarea de decodificación abortada: {e}")))??;

        let engine = self.engine().await?;
        let params = self.params.clone();

        let outcome = tokio::task::spawn_blocking(move || run_inference(&engine, &image, &params))
            .await
            .unwrap_or_else(|e| Err(DomainError::InferenceRuntime(format!("tarea de inferencia abortada: {e}"))));

        match outcome {
            Ok(raw) => Ok(DetectionResult::aggregate(filename, &raw, &self.classes)),
            Err(DomainError::InferenceRuntime(msg)) => {
                warn!("Inferencia fallida para {}: {}; se devuelve resultado vacío", filename, msg);
                Ok(DetectionResult::empty(filename))
            }
            Err(e) => Err(e),
        }
    }
}

fn run_inference(engine: &SharedEngine, image: &RgbImage, params: &InferenceParams) -> DomainResult<Vec<Detection>> {
    let started = Instant::now();
    // Un pánico en una llamada anterior envenena el mutex, pero la sesión sigue siendo usable.
    let mut guard = engine.lock().unwrap_or_else(|poisoned| {
        warn!("Mutex del motor envenenado por un pánico previo; se recupera");
        poisoned.into_inner()
    });
    let detections = guard.infer(image, params)?;

    let infer_ms = started.elapsed().as_secs_f32() * 1000.0;
    if params.verbose {
        info!("Inferencia {}x{}: {} detecciones en {:.1} ms", image.width(), image.height(), detections.len(), infer_ms);
    } else {
        debug!("Inferencia: {} detecciones en {:.1} ms", detections.len(), infer_ms);
    }
    Ok(detections)
}
