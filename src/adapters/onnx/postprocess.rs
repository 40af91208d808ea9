//! Decodificación de la salida cruda de YOLO (v8/11) y supresión de no máximos.
//!
//! La salida del modelo tiene forma `[4 + num_clases, num_candidatos]`:
//! las 4 primeras filas son `cx, cy, w, h` en píxeles de la entrada del modelo
//! y el resto son las puntuaciones por clase.

use ndarray::{s, ArrayView2};

use crate::domain::{
    detection::Detection,
    errors::{DomainError, DomainResult},
    model::InferenceParams,
};

/// Convierte la salida en detecciones sobre la imagen original:
/// umbral de confianza, filtro de clases, NMS por clase y tope de detecciones.
pub fn decode_predictions(
    view: ArrayView2<f32>,
    params: &InferenceParams,
    original_size: (u32, u32),
) -> DomainResult<Vec<Detection>> {
    let rows = view.shape()[0];
    if rows < 5 {
        return Err(DomainError::InferenceRuntime(format!(
            "salida inesperada del modelo: {rows} filas por candidato"
        )));
    }

    let imgsz = params.input_size.max(1) as f32;
    let (orig_w, orig_h) = (original_size.0 as f32, original_size.1 as f32);
    let sx = orig_w / imgsz;
    let sy = orig_h / imgsz;

    let mut candidates = Vec::new();
    for i in 0..view.shape()[1] {
        let scores = view.slice(s![4.., i]);
        let Some((class_id, score)) = scores
            .iter()
            .copied()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
        else {
            continue;
        };

        if score.is_nan() || score < params.conf_threshold {
            continue;
        }
        if !params.classes.is_empty() && !params.classes.contains(&class_id) {
            continue;
        }

        let cx = view[[0, i]];
        let cy = view[[1, i]];
        let w = view[[2, i]];
        let h = view[[3, i]];

        candidates.push(Detection {
            x1: ((cx - w / 2.0) * sx).clamp(0.0, orig_w),
            y1: ((cy - h / 2.0) * sy).clamp(0.0, orig_h),
            x2: ((cx + w / 2.0) * sx).clamp(0.0, orig_w),
            y2: ((cy + h / 2.0) * sy).clamp(0.0, orig_h),
            score,
            class_id,
        });
    }

    let mut kept = non_max_suppression(candidates, params.iou_threshold);
    kept.truncate(params.max_detections);
    Ok(kept)
}

/// NMS voraz por clase. Devuelve las detecciones en orden de confianza descendente.
pub fn non_max_suppression(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    detections.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut keep: Vec<Detection> = Vec::with_capacity(detections.len());
    for det in detections {
        let overlaps = keep
            .iter()
            .any(|k| k.class_id == det.class_id && iou(k, &det) > iou_threshold);
        if !overlaps {
            keep.push(det);
        }
    }
    keep
}

pub fn iou(a: &Detection, b: &Detection) -> f32 {
    let ix1 = a.x1.max(b.x1);
    let iy1 = a.y1.max(b.y1);
    let ix2 = a.x2.min(b.x2);
    let iy2 = a.y2.min(b.y2);

    let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
    let area_a = (a.x2 - a.x1).max(0.0) * (a.y2 - a.y1).max(0.0);
    let area_b = (b.x2 - b.x1).max(0.0) * (b.y2 - b.y1).max(0.0);
    let union = area_a + area_b - inter;

    if union <= 0.0 {
        0.0
    } else {
        inter / union
    }
}
