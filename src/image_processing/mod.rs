pub mod debug_overlay;
pub mod orientation;
pub mod planner;
pub mod resize;
pub mod subject_detection;

use anyhow::{Context, Result};
use image::Rgb;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use walkdir::WalkDir;

use crate::error::PrepError;
use crate::json_output::JsonMessage;
use crate::manifest::write_manifest;
use crate::utils::{
    assign_output_paths, create_progress_bar, error_println, has_valid_extension, save_jpeg,
    verbose_println,
};

pub use planner::{plan_crop_window, CropWindow, SubjectBox, TargetSpec};
pub use subject_detection::{StaticDetector, SubjectDetector, DEFAULT_CONFIDENCE_THRESHOLD};

#[cfg(feature = "ai")]
pub use subject_detection::OnnxDetector;

/// Letterbox padding color.
const CANVAS_BACKGROUND: Rgb<u8> = Rgb([0, 0, 0]);

/// How a source image is mapped onto the output canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitStrategy {
    /// Scale to cover the canvas, crop the centered excess.
    CenterCrop,
    /// Scale to fit entirely inside the canvas, pad with black.
    LetterboxFit,
    /// Crop a person-aware window, then letterbox it onto the canvas.
    /// Falls back to the center crop when nobody is detected.
    SmartCrop,
}

#[derive(Debug, Clone)]
pub struct ProcessingConfig {
    pub strategy: FitStrategy,
    pub source_root: PathBuf,
    pub destination_root: PathBuf,
    pub target: TargetSpec,
    pub quality: u8,
    pub extensions: Vec<String>,
    pub verbose: bool,
    pub json_progress: bool,
    pub parallel_jobs: usize,
    /// When set, detection overlays are mirrored below this root.
    pub debug_root: Option<PathBuf>,
}

/// Outcome of one successfully processed image.
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    /// Destination-relative path recorded in the manifest.
    pub manifest_entry: PathBuf,
    pub subjects: usize,
    pub crop_window: Option<CropWindow>,
    pub processing_time: Duration,
}

/// Outcome of a whole batch run.
#[derive(Debug)]
pub struct BatchSummary {
    pub total: usize,
    pub processed: usize,
    pub failed: usize,
    pub manifest_path: Option<PathBuf>,
    pub manifest_entries: Vec<PathBuf>,
    pub duration: Duration,
}

pub struct ProcessingEngine {
    config: ProcessingConfig,
    detector: Arc<dyn SubjectDetector>,
    pool: rayon::ThreadPool,
}

impl ProcessingEngine {
    /// Engine without a real detector, for the two center variants.
    pub fn new(config: ProcessingConfig) -> Result<Self> {
        Self::with_detector(config, Arc::new(StaticDetector::empty()))
    }

    /// Engine with an injected subject detector. Each engine owns its
    /// thread pool so several can coexist in one process.
    pub fn with_detector(
        config: ProcessingConfig,
        detector: Arc<dyn SubjectDetector>,
    ) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.parallel_jobs)
            .build()
            .context("Failed to initialize thread pool")?;

        Ok(Self {
            config,
            detector,
            pool,
        })
    }

    pub fn config(&self) -> &ProcessingConfig {
        &self.config
    }

    /// Discover all image files below the source root, sorted for a
    /// consistent processing and manifest order.
    pub fn discover_images(&self) -> Result<Vec<PathBuf>> {
        verbose_println(
            self.config.verbose,
            &format!("Scanning directory: {}", self.config.source_root.display()),
        );

        let walker = WalkDir::new(&self.config.source_root)
            .follow_links(false)
            .max_depth(10); // Reasonable depth limit

        let mut image_files = Vec::new();
        for entry in walker {
            let entry = entry.context("Failed to read directory entry")?;
            let path = entry.path();

            if path.is_file() && has_valid_extension(path, &self.config.extensions) {
                image_files.push(path.to_path_buf());
            }
        }

        image_files.sort();

        verbose_println(
            self.config.verbose,
            &format!("Found {} image files", image_files.len()),
        );
        Ok(image_files)
    }

    /// Process a batch of images with progress callback
    ///
    /// Output paths are assigned up front so same-stem siblings never
    /// race for one destination file. Results come back in input order
    /// regardless of which worker finished first.
    pub fn process_batch<F>(
        &self,
        image_files: &[PathBuf],
        progress_callback: F,
    ) -> Vec<Result<ProcessingResult>>
    where
        F: Fn(usize) + Send + Sync,
    {
        let output_rels = assign_output_paths(image_files, &self.config.source_root);
        let processed_count = AtomicUsize::new(0);

        self.pool.install(|| {
            image_files
                .par_iter()
                .zip(output_rels.into_par_iter())
                .map(|(image_path, output_rel)| {
                    let result = match output_rel {
                        Ok(rel) => self.process_single_image(image_path, &rel),
                        Err(e) => Err(e.into()),
                    };

                    let count = processed_count.fetch_add(1, Ordering::Relaxed) + 1;
                    progress_callback(count);

                    result
                })
                .collect()
        })
    }

    /// Full batch flow: discover, process in parallel, log failures,
    /// write the manifest. Per-image failures never abort the run; an
    /// empty source yields no manifest at all.
    pub fn run(&self) -> Result<BatchSummary> {
        let start = Instant::now();

        let image_files = self.discover_images()?;
        let total = image_files.len();

        if image_files.is_empty() {
            return Ok(BatchSummary {
                total: 0,
                processed: 0,
                failed: 0,
                manifest_path: None,
                manifest_entries: Vec::new(),
                duration: start.elapsed(),
            });
        }

        let progress_bar = if self.config.json_progress {
            None
        } else {
            Some(create_progress_bar(total as u64))
        };

        let json_progress = self.config.json_progress;
        let results = self.process_batch(&image_files, |count| {
            if let Some(pb) = &progress_bar {
                pb.set_position(count as u64);
            }
            if json_progress {
                JsonMessage::progress(count, total, "Processing images");
            }
        });

        let mut manifest_entries = Vec::new();
        let mut failed = 0usize;

        for (image_path, result) in image_files.iter().zip(results) {
            match result {
                Ok(res) => {
                    if json_progress {
                        JsonMessage::file_completed(
                            &res.input_path,
                            &res.output_path,
                            res.subjects,
                            res.crop_window,
                            res.processing_time.as_millis(),
                        );
                    }
                    manifest_entries.push(res.manifest_entry);
                }
                Err(e) => {
                    failed += 1;
                    if json_progress {
                        JsonMessage::file_failed(image_path, format!("{:#}", e));
                    } else {
                        error_println(&format!(
                            "Failed to process {}: {:#}",
                            image_path.display(),
                            e
                        ));
                    }
                }
            }
        }

        if let Some(pb) = progress_bar {
            pb.finish_with_message("done");
        }

        let manifest_path = write_manifest(&self.config.destination_root, &manifest_entries)?;

        Ok(BatchSummary {
            total,
            processed: manifest_entries.len(),
            failed,
            manifest_path: Some(manifest_path),
            manifest_entries,
            duration: start.elapsed(),
        })
    }

    /// Process a single image file into its assigned output path.
    fn process_single_image(
        &self,
        input_path: &Path,
        output_rel: &Path,
    ) -> Result<ProcessingResult> {
        let start = Instant::now();
        verbose_println(
            self.config.verbose,
            &format!("Processing: {}", input_path.display()),
        );

        let decoded = image::open(input_path).map_err(|source| PrepError::Decode {
            path: input_path.to_path_buf(),
            source,
        })?;
        let upright = orientation::auto_orient(input_path, decoded);
        let rgb_img = upright.to_rgb8();
        let (width, height) = rgb_img.dimensions();

        let output_path = self.config.destination_root.join(output_rel);

        let target = &self.config.target;
        let (canvas, subjects, crop_window) = match self.config.strategy {
            FitStrategy::CenterCrop => {
                let window = plan_crop_window(width, height, &[], target)?;
                let cropped = resize::crop_to_window(&rgb_img, &window);
                let canvas = resize::resize_exact(&cropped, target.width, target.height)?;
                (canvas, 0, Some(window))
            }
            FitStrategy::LetterboxFit => {
                let canvas = resize::letterbox_fit(
                    &rgb_img,
                    target.width,
                    target.height,
                    CANVAS_BACKGROUND,
                )?;
                (canvas, 0, None)
            }
            FitStrategy::SmartCrop => {
                let boxes = self.detector.detect(&rgb_img)?;
                let window = plan_crop_window(width, height, &boxes, target)?;

                if !boxes.is_empty() {
                    if let Some(debug_root) = &self.config.debug_root {
                        self.save_debug_overlay(&rgb_img, &boxes, &window, output_rel, debug_root)?;
                    }
                }

                let cropped = resize::crop_to_window(&rgb_img, &window);
                let canvas = if boxes.is_empty() {
                    resize::resize_exact(&cropped, target.width, target.height)?
                } else {
                    resize::letterbox_fit(
                        &cropped,
                        target.width,
                        target.height,
                        CANVAS_BACKGROUND,
                    )?
                };
                (canvas, boxes.len(), Some(window))
            }
        };

        save_jpeg(&canvas, &output_path, self.config.quality)?;

        verbose_println(
            self.config.verbose,
            &format!(
                "{} -> {}",
                input_path.display(),
                output_path.display()
            ),
        );

        Ok(ProcessingResult {
            input_path: input_path.to_path_buf(),
            output_path,
            manifest_entry: output_rel.to_path_buf(),
            subjects,
            crop_window,
            processing_time: start.elapsed(),
        })
    }

    /// Mirror a detection overlay below the given debug root. The
    /// assigned output-relative path comes in explicitly so the
    /// renderer never consults ambient state.
    fn save_debug_overlay(
        &self,
        img: &image::RgbImage,
        boxes: &[SubjectBox],
        window: &CropWindow,
        output_rel: &Path,
        debug_root: &Path,
    ) -> Result<()> {
        let overlay = debug_overlay::render_overlay(img, boxes, window);
        let overlay_path = debug_root.join(output_rel);
        save_jpeg(&overlay, &overlay_path, self.config.quality)?;

        verbose_println(
            self.config.verbose,
            &format!("Debug overlay: {}", overlay_path.display()),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb, RgbImage};
    use std::fs;

    fn test_config(src: &Path, dst: &Path, strategy: FitStrategy) -> ProcessingConfig {
        ProcessingConfig {
            strategy,
            source_root: src.to_path_buf(),
            destination_root: dst.to_path_buf(),
            target: TargetSpec::new(368, 448, 0.05),
            quality: 95,
            extensions: vec!["jpg".to_string(), "jpeg".to_string(), "png".to_string()],
            verbose: false,
            json_progress: false,
            parallel_jobs: 2,
            debug_root: None,
        }
    }

    fn write_png(path: &Path, width: u32, height: u32) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let img: RgbImage = ImageBuffer::from_pixel(width, height, Rgb([90, 120, 30]));
        img.save(path).unwrap();
    }

    #[test]
    fn discovery_is_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("raw");
        write_png(&src.join("b/two.png"), 20, 20);
        write_png(&src.join("a/one.png"), 20, 20);
        write_png(&src.join("zzz.png"), 20, 20);
        fs::write(src.join("notes.txt"), "not an image").unwrap();
        fs::write(src.join("clip.livp"), "container").unwrap();

        let engine =
            ProcessingEngine::new(test_config(&src, dir.path(), FitStrategy::CenterCrop)).unwrap();
        let files = engine.discover_images().unwrap();

        assert_eq!(
            files,
            vec![
                src.join("a/one.png"),
                src.join("b/two.png"),
                src.join("zzz.png"),
            ]
        );
    }

    #[test]
    fn discovery_stops_at_the_depth_limit() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("raw");
        let mut deep = src.clone();
        for level in 1..=9 {
            deep = deep.join(format!("d{}", level));
        }
        // keep.png sits at depth 10, skip.png one level past the cap.
        write_png(&deep.join("keep.png"), 20, 20);
        write_png(&deep.join("d10/skip.png"), 20, 20);

        let engine =
            ProcessingEngine::new(test_config(&src, dir.path(), FitStrategy::CenterCrop)).unwrap();
        let files = engine.discover_images().unwrap();

        assert_eq!(files, vec![deep.join("keep.png")]);
    }

    #[test]
    fn empty_source_yields_no_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("raw");
        let dst = dir.path().join("prod");
        fs::create_dir_all(&src).unwrap();

        let engine =
            ProcessingEngine::new(test_config(&src, &dst, FitStrategy::CenterCrop)).unwrap();
        let summary = engine.run().unwrap();

        assert_eq!(summary.total, 0);
        assert_eq!(summary.manifest_path, None);
        assert!(!dst.join("meta.txt").exists());
    }
}
