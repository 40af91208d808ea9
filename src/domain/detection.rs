use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Identificador de clase COCO (0 = persona).
pub type ClassId = usize;

pub const PERSON_CLASS: ClassId = 0;

/// Detección cruda tal como la devuelve el motor, en píxeles de la imagen original.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub score: f32,
    pub class_id: ClassId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionBox {
    pub confidence: f32,
    /// [x1, y1, x2, y2]
    pub bbox: [f32; 4],
}

/// Respuesta de `/detect`. Se construye una sola vez a partir de la salida del
/// motor y de las clases objetivo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub filename: String,
    pub person_detected: bool,
    pub confidence: f32,
    pub num_persons: usize,
    #[serde(rename = "person_boxes")]
    pub boxes: Vec<DetectionBox>,
}

impl DetectionResult {
    /// Resultado degradado: se devuelve cuando la inferencia falla en tiempo de ejecución.
    pub fn empty(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            person_detected: false,
            confidence: 0.0,
            num_persons: 0,
            boxes: Vec::new(),
        }
    }

    /// Agrega las detecciones de las clases objetivo conservando el orden del motor.
    pub fn aggregate(
        filename: impl Into<String>,
        detections: &[Detection],
        classes: &BTreeSet<ClassId>,
    ) -> Self {
        let mut boxes = Vec::new();
        let mut max_confidence = 0.0_f32;

        // El motor ya filtra por clase, pero no nos fiamos: se vuelve a filtrar aquí.
        for det in detections.iter().filter(|d| classes.contains(&d.class_id)) {
            max_confidence = max_confidence.max(det.score);
            boxes.push(DetectionBox {
                confidence: det.score,
                bbox: [det.x1, det.y1, det.x2, det.y2],
            });
        }

        Self {
            filename: filename.into(),
            person_detected: !boxes.is_empty(),
            confidence: max_confidence,
            num_persons: boxes.len(),
            boxes,
        }
    }
}
