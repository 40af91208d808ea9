use anyhow::{anyhow, Context, Result};
use image::{imageops::FilterType, RgbImage};
use ndarray::{Array4, ArrayViewD, Axis, Ix2, IxDyn};
use ort::execution_providers::CUDAExecutionProvider;
use ort::session::Session;
use ort::value::Tensor;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::adapters::onnx::postprocess::decode_predictions;
use crate::application::ports::{InferenceEngine, ModelLoaderPort};
use crate::domain::detection::Detection;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::model::{Device, InferenceParams};

pub struct OnnxYoloEngine {
    session: Session,
}

impl OnnxYoloEngine {
    pub fn load(path: &Path, params: &InferenceParams) -> Result<Self> {
        let mut builder = Session::builder()?.with_intra_threads(4)?;

        match params.device {
            Device::Cpu => {}
            Device::Cuda => {
                // Si CUDA no está disponible seguimos en CPU.
                let cuda = CUDAExecutionProvider::default().build();
                match builder.clone().with_execution_providers([cuda]) {
                    Ok(with_cuda) => builder = with_cuda,
                    Err(e) => warn!("CUDA no disponible ({}); se usa CPU", e),
                }
            }
            other => warn!("Dispositivo {} no soportado por ONNX Runtime; se usa CPU", other),
        }

        if params.half_precision {
            warn!("half_precision requiere un modelo exportado en FP16; se ignora");
        }

        let model_bytes = fs::read(path).with_context(|| format!("no se pudo leer {}", path.display()))?;
        let session = builder
            .commit_from_memory(&model_bytes)
            .with_context(|| format!("ONNX Runtime rechazó {}", path.display()))?;

        info!("Sesión ONNX creada para {}", path.display());
        Ok(Self { session })
    }

    fn run(&mut self, rgb: &RgbImage, params: &InferenceParams) -> Result<Vec<Detection>> {
        let imgsz = params.input_size as usize;
        if imgsz == 0 {
            return Err(anyhow!("img_size debe ser mayor que cero"));
        }
        let resized = image::imageops::resize(rgb, imgsz as u32, imgsz as u32, FilterType::Triangle);

        let mut input = Array4::<f32>::zeros((1, 3, imgsz, imgsz));
        for (x, y, pixel) in resized.enumerate_pixels() {
            input[[0, 0, y as usize, x as usize]] = pixel[0] as f32 / 255.0;
            input[[0, 1, y as usize, x as usize]] = pixel[1] as f32 / 255.0;
            input[[0, 2, y as usize, x as usize]] = pixel[2] as f32 / 255.0;
        }

        let (data, _) = input.into_raw_vec_and_offset();
        let input_tensor = Tensor::from_array(([1usize, 3, imgsz, imgsz], data))?;

        let outputs = self.session.run(ort::inputs![input_tensor])?;
        let (shape_out, data_out) = outputs[0].try_extract_tensor::<f32>()?;

        let dims: Vec<usize> = shape_out.iter().map(|&d| d as usize).collect();
        let array_view = ArrayViewD::from_shape(IxDyn(&dims), data_out)?;
        if array_view.ndim() != 3 {
            return Err(anyhow!("salida del modelo con forma inesperada {:?}", dims));
        }
        let view = array_view.index_axis(Axis(0), 0).into_dimensionality::<Ix2>()?;

        Ok(decode_predictions(view, params, (rgb.width(), rgb.height()))?)
    }
}

impl InferenceEngine for OnnxYoloEngine {
    fn infer(&mut self, image: &RgbImage, params: &InferenceParams) -> DomainResult<Vec<Detection>> {
        self.run(image, params)
            .map_err(|e| DomainError::InferenceRuntime(format!("{e:#}")))
    }

    /// Una pasada sobre una imagen negra para que la primera petición no pague la inicialización.
    fn warm_up(&mut self, params: &InferenceParams) -> DomainResult<()> {
        let size = params.input_size.max(1);
        let blank = RgbImage::new(size, size);
        self.run(&blank, params)
            .map(|_| ())
            .map_err(|e| DomainError::ModelLoad(format!("calentamiento fallido: {e:#}")))
    }
}

/// Cargador de modelos ONNX YOLO con `ort`.
pub struct OnnxModelLoader;

impl OnnxModelLoader {
    pub fn new() -> Self { Self }
}

impl Default for OnnxModelLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelLoaderPort for OnnxModelLoader {
    fn load(&self, model_path: &Path, params: &InferenceParams) -> DomainResult<Box<dyn InferenceEngine>> {
        let engine = OnnxYoloEngine::load(model_path, params)
            .map_err(|e| DomainError::ModelLoad(format!("{e:#}")))?;
        Ok(Box::new(engine))
    }
}
