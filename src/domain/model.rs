use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::detection::ClassId;
use super::errors::DomainError;

/// Tamaños de modelo YOLO soportados.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelSize {
    Nano,
    Small,
    Medium,
    Large,
    XLarge,
}

impl ModelSize {
    /// Nombre canónico del fichero dentro de `models_dir`.
    pub fn file_name(self) -> &'static str {
        match self {
            ModelSize::Nano => "yolo11n.onnx",
            ModelSize::Small => "yolo11s.onnx",
            ModelSize::Medium => "yolo11m.onnx",
            ModelSize::Large => "yolo11l.onnx",
            ModelSize::XLarge => "yolo11x.onnx",
        }
    }
}

impl FromStr for ModelSize {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nano" => Ok(ModelSize::Nano),
            "small" => Ok(ModelSize::Small),
            "medium" => Ok(ModelSize::Medium),
            "large" => Ok(ModelSize::Large),
            "xlarge" => Ok(ModelSize::XLarge),
            other => Err(DomainError::ConfigInvalid(format!(
                "tamaño de modelo no soportado: '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Device {
    Cpu,
    Cuda,
    Mps,
    Xpu,
}

impl FromStr for Device {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cpu" => Ok(Device::Cpu),
            "cuda" => Ok(Device::Cuda),
            "mps" => Ok(Device::Mps),
            "xpu" => Ok(Device::Xpu),
            other => Err(DomainError::ConfigInvalid(format!(
                "dispositivo no soportado: '{other}'"
            ))),
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Device::Cpu => "cpu",
            Device::Cuda => "cuda",
            Device::Mps => "mps",
            Device::Xpu => "xpu",
        };
        f.write_str(name)
    }
}

/// Parámetros de invocación derivados de la configuración.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceParams {
    pub input_size: u32,        // 640 typical
    pub conf_threshold: f32,    // 0..1
    pub iou_threshold: f32,     // 0..1
    pub max_detections: usize,  // e.g. 300
    pub device: Device,
    pub half_precision: bool,
    pub retina_masks: bool,
    pub verbose: bool,
    pub classes: Vec<ClassId>,
}

impl Default for InferenceParams {
    fn default() -> Self {
        Self {
            input_size: 640,
            conf_threshold: 0.25,
            iou_threshold: 0.45,
            max_detections: 300,
            device: Device::Cpu,
            half_precision: false,
            retina_masks: true,
            verbose: false,
            classes: vec![super::detection::PERSON_CLASS],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_map_to_canonical_files() {
        assert_eq!("nano".parse::<ModelSize>().unwrap().file_name(), "yolo11n.onnx");
        assert_eq!("Small".parse::<ModelSize>().unwrap().file_name(), "yolo11s.onnx");
        assert_eq!("xlarge".parse::<ModelSize>().unwrap().file_name(), "yolo11x.onnx");
    }

    #[test]
    fn unknown_size_is_a_config_error() {
        let err = "huge".parse::<ModelSize>().unwrap_err();
        assert!(matches!(err, DomainError::ConfigInvalid(_)));
    }

    #[test]
    fn devices_parse_case_insensitively() {
        assert_eq!("CUDA".parse::<Device>().unwrap(), Device::Cuda);
        assert_eq!(Device::Mps.to_string(), "mps");
        assert!("tpu".parse::<Device>().is_err());
    }
}
