use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use super::detection::{ClassId, PERSON_CLASS};
use super::errors::DomainResult;
use super::model::{Device, InferenceParams, ModelSize};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 5;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
pub const DEFAULT_MODEL_SIZE: &str = "small";
pub const DEFAULT_DEVICE: &str = "cpu";
pub const DEFAULT_MODELS_DIR: &str = "./models";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Se acepta por compatibilidad con ficheros existentes; no hay recarga en caliente.
    pub reload: bool,
    pub shutdown_grace_secs: u64,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            reload: true,
            shutdown_grace_secs: DEFAULT_SHUTDOWN_GRACE_SECS,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// nano | small | medium | large | xlarge
    pub size: String,
    /// cpu | cuda | mps | xpu
    pub device: String,
    pub custom_model_path: Option<PathBuf>,
    pub models_dir: PathBuf,
    pub download_on_startup: bool,
    pub download_base_url: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_MODEL_SIZE.to_string(),
            device: DEFAULT_DEVICE.to_string(),
            custom_model_path: None,
            models_dir: PathBuf::from(DEFAULT_MODELS_DIR),
            download_on_startup: true,
            download_base_url: None,
        }
    }
}

impl ModelConfig {
    /// Ruta del modelo: la personalizada tal cual, o el fichero canónico del tamaño.
    pub fn resolve_model_path(&self) -> DomainResult<PathBuf> {
        if let Some(custom) = &self.custom_model_path {
            return Ok(custom.clone());
        }
        let size: ModelSize = self.size.parse()?;
        Ok(self.models_dir.join(size.file_name()))
    }

    pub fn device(&self) -> DomainResult<Device> {
        self.device.parse()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceConfig {
    pub conf_threshold: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
    pub img_size: u32,
    pub half_precision: bool,
    pub retina_masks: bool,
    pub verbose: bool,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            conf_threshold: 0.25,
            iou_threshold: 0.45,
            max_detections: 300,
            img_size: 640,
            half_precision: false,
            retina_masks: true,
            verbose: false,
        }
    }
}

impl InferenceConfig {
    pub fn to_params(&self, device: Device, classes: &BTreeSet<ClassId>) -> InferenceParams {
        InferenceParams {
            input_size: self.img_size,
            conf_threshold: self.conf_threshold,
            iou_threshold: self.iou_threshold,
            max_detections: self.max_detections,
            device,
            half_precision: self.half_precision,
            retina_masks: self.retina_masks,
            verbose: self.verbose,
            classes: classes.iter().copied().collect(),
        }
    }
}

/// Configuración completa, resuelta una vez al arrancar y compartida en solo lectura.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub model: ModelConfig,
    pub inference: InferenceConfig,
    pub classes_to_detect: BTreeSet<ClassId>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            model: ModelConfig::default(),
            inference: InferenceConfig::default(),
            classes_to_detect: BTreeSet::from([PERSON_CLASS]),
        }
    }
}
