//! JSON output for automation
//!
//! When the --json-progress flag is enabled, progress and status
//! information is emitted as JSON lines to stdout, suppressing the
//! styled console output.

use serde::Serialize;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::image_processing::planner::CropWindow;

/// Last progress emission timestamp (milliseconds since epoch)
/// Used for throttling progress updates to ~25 FPS (40ms between updates)
static LAST_PROGRESS_MS: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum JsonMessage {
    /// Progress update
    Progress {
        current: usize,
        total: usize,
        message: String,
    },
    /// File processing completed
    FileCompleted {
        input_path: String,
        output_path: String,
        subjects: usize,
        crop_window: Option<CropWindow>,
        processing_time_ms: u128,
    },
    /// File processing failed
    FileFailed { input_path: String, error: String },
    /// Processing summary
    Summary {
        total_files: usize,
        processed: usize,
        failed: usize,
        duration_secs: f64,
    },
}

impl JsonMessage {
    /// Emit JSON message to stdout
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }

    /// Create and emit progress message, throttled so a fast batch does
    /// not flood the consumer. The final update (current == total) is
    /// always emitted.
    pub fn progress(current: usize, total: usize, message: impl Into<String>) {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        let last_ms = LAST_PROGRESS_MS.load(Ordering::Relaxed);

        if now_ms.saturating_sub(last_ms) >= 40 || current == total {
            LAST_PROGRESS_MS.store(now_ms, Ordering::Relaxed);
            Self::Progress {
                current,
                total,
                message: message.into(),
            }
            .emit();
        }
    }

    /// Create and emit file completed message
    pub fn file_completed(
        input_path: &Path,
        output_path: &Path,
        subjects: usize,
        crop_window: Option<CropWindow>,
        processing_time_ms: u128,
    ) {
        Self::FileCompleted {
            input_path: input_path.display().to_string(),
            output_path: output_path.display().to_string(),
            subjects,
            crop_window,
            processing_time_ms,
        }
        .emit();
    }

    /// Create and emit file failed message
    pub fn file_failed(input_path: &Path, error: impl Into<String>) {
        Self::FileFailed {
            input_path: input_path.display().to_string(),
            error: error.into(),
        }
        .emit();
    }

    /// Create and emit summary message
    pub fn summary(total_files: usize, processed: usize, failed: usize, duration_secs: f64) {
        Self::Summary {
            total_files,
            processed,
            failed,
            duration_secs,
        }
        .emit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completed_message_serializes_with_type_tag() {
        let msg = JsonMessage::FileCompleted {
            input_path: "/raw/a.png".to_string(),
            output_path: "/prod/a.jpg".to_string(),
            subjects: 2,
            crop_window: Some(CropWindow {
                x0: 1.0,
                y0: 2.0,
                x1: 369.0,
                y1: 450.0,
            }),
            processing_time_ms: 12,
        };

        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&msg).unwrap()).unwrap();

        assert_eq!(json["type"], "filecompleted");
        assert_eq!(json["subjects"], 2);
        assert_eq!(json["crop_window"]["x0"], 1.0);
        assert_eq!(json["output_path"], "/prod/a.jpg");
    }

    #[test]
    fn failure_and_summary_messages_serialize() {
        let failed = JsonMessage::FileFailed {
            input_path: "/raw/broken.jpg".to_string(),
            error: "decode failed".to_string(),
        };
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&failed).unwrap()).unwrap();
        assert_eq!(json["type"], "filefailed");

        let summary = JsonMessage::Summary {
            total_files: 10,
            processed: 8,
            failed: 2,
            duration_secs: 1.5,
        };
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&summary).unwrap()).unwrap();
        assert_eq!(json["type"], "summary");
        assert_eq!(json["failed"], 2);
    }
}
