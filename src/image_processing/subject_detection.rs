use image::RgbImage;

use super::planner::SubjectBox;
use crate::error::PrepError;

/// Confidence floor used when the caller does not override it.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.6;

/// IOU above which two person boxes are treated as the same detection.
#[cfg(any(feature = "ai", test))]
const NMS_IOU_THRESHOLD: f32 = 0.4;

/// COCO class id for "person".
#[cfg(any(feature = "ai", test))]
const PERSON_CLASS_ID: usize = 0;

/// YOLO11 models take square 640x640 input.
#[cfg(feature = "ai")]
const YOLO_INPUT_SIZE: u32 = 640;

/// Source of person bounding boxes for the smart crop pipeline.
///
/// Implementations are shared across batch workers, so they must be
/// callable concurrently. Boxes are normalized to the image dimensions.
pub trait SubjectDetector: Send + Sync {
    fn detect(&self, img: &RgbImage) -> Result<Vec<SubjectBox>, PrepError>;
}

/// Detector that always reports the same boxes.
///
/// Builds without the `ai` feature run the empty variant so the smart
/// binary degrades to center cropping; tests feed known boxes through
/// the fixed variant.
pub struct StaticDetector {
    boxes: Vec<SubjectBox>,
}

impl StaticDetector {
    pub fn empty() -> Self {
        Self { boxes: Vec::new() }
    }

    pub fn with_boxes(boxes: Vec<SubjectBox>) -> Self {
        Self { boxes }
    }
}

impl SubjectDetector for StaticDetector {
    fn detect(&self, _img: &RgbImage) -> Result<Vec<SubjectBox>, PrepError> {
        Ok(self.boxes.clone())
    }
}

/// One raw model prediction in 640x640 input space, center format.
#[cfg(any(feature = "ai", test))]
#[derive(Debug, Clone, Copy)]
struct Candidate {
    cx: f32,
    cy: f32,
    w: f32,
    h: f32,
    confidence: f32,
}

/// Pull person candidates out of a YOLO11 output tensor.
///
/// The tensor is `[1, 4 + classes, anchors]` laid out row major, so a
/// single prediction is strided across the anchor axis. A prediction
/// counts as a person when "person" is its best class and that score
/// clears the threshold.
#[cfg(any(feature = "ai", test))]
fn decode_person_candidates(
    output_data: &[f32],
    shape: &[usize],
    confidence_threshold: f32,
) -> Result<Vec<Candidate>, PrepError> {
    if shape.len() != 3 || shape[0] != 1 || shape[1] < 5 {
        return Err(PrepError::Detection(format!(
            "unexpected model output shape {:?}",
            shape
        )));
    }
    let features = shape[1];
    let anchors = shape[2];
    if output_data.len() < features * anchors {
        return Err(PrepError::Detection(format!(
            "model output holds {} values, expected {}",
            output_data.len(),
            features * anchors
        )));
    }

    let class_count = features - 4;
    let mut candidates = Vec::new();

    for i in 0..anchors {
        let at = |row: usize| output_data[row * anchors + i];

        let mut best_class = 0usize;
        let mut best_score = f32::MIN;
        for class in 0..class_count {
            let score = at(4 + class);
            if score > best_score {
                best_score = score;
                best_class = class;
            }
        }

        if best_class == PERSON_CLASS_ID && best_score > confidence_threshold {
            candidates.push(Candidate {
                cx: at(0),
                cy: at(1),
                w: at(2),
                h: at(3),
                confidence: best_score,
            });
        }
    }

    Ok(candidates)
}

/// Greedy non-maximum suppression, highest confidence first.
#[cfg(any(feature = "ai", test))]
fn non_maximum_suppression(mut candidates: Vec<Candidate>, iou_threshold: f32) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep: Vec<Candidate> = Vec::new();
    for candidate in candidates {
        if keep.iter().all(|kept| iou(kept, &candidate) < iou_threshold) {
            keep.push(candidate);
        }
    }
    keep
}

#[cfg(any(feature = "ai", test))]
fn iou(a: &Candidate, b: &Candidate) -> f32 {
    let a_x1 = a.cx - a.w / 2.0;
    let a_y1 = a.cy - a.h / 2.0;
    let a_x2 = a.cx + a.w / 2.0;
    let a_y2 = a.cy + a.h / 2.0;

    let b_x1 = b.cx - b.w / 2.0;
    let b_y1 = b.cy - b.h / 2.0;
    let b_x2 = b.cx + b.w / 2.0;
    let b_y2 = b.cy + b.h / 2.0;

    let inter_x1 = a_x1.max(b_x1);
    let inter_y1 = a_y1.max(b_y1);
    let inter_x2 = a_x2.min(b_x2);
    let inter_y2 = a_y2.min(b_y2);

    if inter_x2 < inter_x1 || inter_y2 < inter_y1 {
        return 0.0;
    }

    let inter_area = (inter_x2 - inter_x1) * (inter_y2 - inter_y1);
    let union_area = a.w * a.h + b.w * b.h - inter_area;
    inter_area / union_area
}

/// The model sees the image squashed onto the square input, so dividing
/// by the input size recovers coordinates normalized to the original.
#[cfg(any(feature = "ai", test))]
fn candidate_to_normalized(candidate: &Candidate, input_size: f32) -> SubjectBox {
    SubjectBox {
        x1: (((candidate.cx - candidate.w / 2.0) / input_size).clamp(0.0, 1.0)) as f64,
        y1: (((candidate.cy - candidate.h / 2.0) / input_size).clamp(0.0, 1.0)) as f64,
        x2: (((candidate.cx + candidate.w / 2.0) / input_size).clamp(0.0, 1.0)) as f64,
        y2: (((candidate.cy + candidate.h / 2.0) / input_size).clamp(0.0, 1.0)) as f64,
    }
}

#[cfg(feature = "ai")]
mod onnx {
    use std::path::Path;
    use std::sync::Mutex;

    use ort::session::{builder::GraphOptimizationLevel, Session};
    use ort::value::Value;

    use super::*;

    /// YOLO11 person detector backed by an ONNX Runtime session.
    ///
    /// Sessions are stateful, so batch workers share one detector
    /// behind a mutex and inference is serialized.
    pub struct OnnxDetector {
        session: Mutex<Session>,
        confidence_threshold: f32,
    }

    impl OnnxDetector {
        pub fn from_model_file(
            model_path: &Path,
            confidence_threshold: f32,
        ) -> Result<Self, PrepError> {
            let _ = ort::init();

            let session = Session::builder()
                .and_then(|builder| {
                    builder.with_optimization_level(GraphOptimizationLevel::Level3)
                })
                .and_then(|builder| builder.with_intra_threads(4))
                .and_then(|builder| builder.commit_from_file(model_path))
                .map_err(|e| {
                    PrepError::Detection(format!(
                        "failed to load model {}: {e}",
                        model_path.display()
                    ))
                })?;

            Ok(Self {
                session: Mutex::new(session),
                confidence_threshold,
            })
        }
    }

    impl SubjectDetector for OnnxDetector {
        fn detect(&self, img: &RgbImage) -> Result<Vec<SubjectBox>, PrepError> {
            let resized = image::imageops::resize(
                img,
                YOLO_INPUT_SIZE,
                YOLO_INPUT_SIZE,
                image::imageops::FilterType::CatmullRom,
            );
            let tensor_data = tensor_from_image(&resized);

            let side = YOLO_INPUT_SIZE as usize;
            let input = Value::from_array((vec![1usize, 3, side, side], tensor_data))
                .map_err(|e| PrepError::Detection(format!("failed to build input tensor: {e}")))?;

            let mut session = self
                .session
                .lock()
                .map_err(|_| PrepError::Detection("detector lock poisoned".to_string()))?;
            let outputs = session
                .run(ort::inputs!["images" => input])
                .map_err(|e| PrepError::Detection(format!("inference failed: {e}")))?;

            let (shape, data) = outputs["output0"]
                .try_extract_tensor::<f32>()
                .map_err(|e| PrepError::Detection(format!("unexpected model output: {e}")))?;
            let shape: Vec<usize> = shape.iter().map(|&d| d as usize).collect();

            let candidates = decode_person_candidates(data, &shape, self.confidence_threshold)?;
            let kept = non_maximum_suppression(candidates, NMS_IOU_THRESHOLD);

            Ok(kept
                .iter()
                .map(|c| candidate_to_normalized(c, YOLO_INPUT_SIZE as f32))
                .collect())
        }
    }

    /// NCHW float tensor, channel values scaled to 0..1.
    fn tensor_from_image(img: &RgbImage) -> Vec<f32> {
        let side = YOLO_INPUT_SIZE;
        let mut tensor_data = Vec::with_capacity(3 * side as usize * side as usize);

        for channel in 0..3 {
            for y in 0..side {
                for x in 0..side {
                    let pixel = img.get_pixel(x, y);
                    tensor_data.push(pixel[channel] as f32 / 255.0);
                }
            }
        }

        tensor_data
    }
}

#[cfg(feature = "ai")]
pub use onnx::OnnxDetector;
