use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::domain::{
    detection::ClassId,
    errors::{DomainError, DomainResult},
    settings::{AppConfig, InferenceConfig, ModelConfig, ServerConfig},
};

pub const CONFIG_ENV_VAR: &str = "CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/configuration.yaml";

#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    server: Option<ServerSection>,
    model: Option<ModelSection>,
    inference: Option<InferenceSection>,
    classes_to_detect: Option<Vec<ClassId>>,
}

#[derive(Debug, Deserialize, Default)]
struct ServerSection {
    host: Option<String>,
    port: Option<u16>,
    reload: Option<bool>,
    shutdown_grace_secs: Option<u64>,
    max_upload_bytes: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct ModelSection {
    size: Option<String>,
    device: Option<String>,
    custom_model_path: Option<PathBuf>,
    models_dir: Option<PathBuf>,
    download_on_startup: Option<bool>,
    download_base_url: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct InferenceSection {
    conf_threshold: Option<f32>,
    iou_threshold: Option<f32>,
    max_detections: Option<usize>,
    img_size: Option<u32>,
    half_precision: Option<bool>,
    retina_masks: Option<bool>,
    verbose: Option<bool>,
}

/// Ruta efectiva: argumento explícito, luego `CONFIG_PATH`, luego la ruta por defecto.
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    std::env::var_os(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

pub fn load_config(explicit: Option<&Path>) -> DomainResult<AppConfig> {
    let path = resolve_config_path(explicit);
    info!("Cargando configuración desde {}", path.display());

    if !path.exists() {
        error!("Fichero de configuración {} no encontrado", path.display());
        return Err(DomainError::ConfigNotFound(path.display().to_string()));
    }

    let raw = std::fs::read_to_string(&path)
        .map_err(|e| DomainError::ConfigInvalid(format!("{}: {e}", path.display())))?;
    let config = parse_config(&raw)?;
    info!("Configuración cargada correctamente");
    Ok(config)
}

/// Interpreta el documento YAML. Solo se exige que exista y no esté vacío;
/// cualquier campo ausente toma su valor por defecto.
pub fn parse_config(raw: &str) -> DomainResult<AppConfig> {
    let value: serde_yaml::Value =
        serde_yaml::from_str(raw).map_err(|e| DomainError::ConfigInvalid(format!("YAML inválido: {e}")))?;

    match &value {
        serde_yaml::Value::Mapping(map) if !map.is_empty() => {}
        serde_yaml::Value::Null | serde_yaml::Value::Mapping(_) => {
            return Err(DomainError::ConfigInvalid("documento vacío".into()));
        }
        _ => return Err(DomainError::ConfigInvalid("el documento no es un mapa".into())),
    }

    let file: ConfigFile =
        serde_yaml::from_value(value).map_err(|e| DomainError::ConfigInvalid(e.to_string()))?;
    file.resolve()
}

impl ConfigFile {
    fn resolve(self) -> DomainResult<AppConfig> {
        let defaults = AppConfig::default();

        let server = self.server.unwrap_or_default();
        let model = self.model.unwrap_or_default();
        let inference = self.inference.unwrap_or_default();

        let classes_to_detect = match self.classes_to_detect {
            Some(list) if list.is_empty() => {
                return Err(DomainError::ConfigInvalid("classes_to_detect no puede estar vacío".into()));
            }
            Some(list) => list.into_iter().collect::<BTreeSet<_>>(),
            None => defaults.classes_to_detect,
        };

        Ok(AppConfig {
            server: ServerConfig {
                host: server.host.unwrap_or(defaults.server.host),
                port: server.port.unwrap_or(defaults.server.port),
                reload: server.reload.unwrap_or(defaults.server.reload),
                shutdown_grace_secs: server.shutdown_grace_secs.unwrap_or(defaults.server.shutdown_grace_secs),
                max_upload_bytes: server.max_upload_bytes.unwrap_or(defaults.server.max_upload_bytes),
            },
            model: ModelConfig {
                size: model.size.unwrap_or(defaults.model.size),
                device: model.device.unwrap_or(defaults.model.device),
                custom_model_path: model.custom_model_path,
                models_dir: model.models_dir.unwrap_or(defaults.model.models_dir),
                download_on_startup: model.download_on_startup.unwrap_or(defaults.model.download_on_startup),
                download_base_url: model.download_base_url,
            },
            inference: InferenceConfig {
                conf_threshold: inference.conf_threshold.unwrap_or(defaults.inference.conf_threshold),
                iou_threshold: inference.iou_threshold.unwrap_or(defaults.inference.iou_threshold),
                max_detections: inference.max_detections.unwrap_or(defaults.inference.max_detections),
                img_size: inference.img_size.unwrap_or(defaults.inference.img_size),
                half_precision: inference.half_precision.unwrap_or(defaults.inference.half_precision),
                retina_masks: inference.retina_masks.unwrap_or(defaults.inference.retina_masks),
                verbose: inference.verbose.unwrap_or(defaults.inference.verbose),
            },
            classes_to_detect,
        })
    }
}
