use anyhow::Result;
use clap::Parser;
use console::style;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use photodisplay_prep::cli::{parse_or_exit, CommonArgs, SmartArgs};
use photodisplay_prep::image_processing::{StaticDetector, SubjectDetector, TargetSpec};
use photodisplay_prep::utils::{print_summary, validate_inputs, validate_smart_inputs, warn_println};
use photodisplay_prep::{FitStrategy, JsonMessage, ProcessingConfig, ProcessingEngine};

#[derive(Parser, Debug)]
#[command(
    name = "smart-crop",
    version,
    about = "Batch person-aware crop of photos for the display canvas"
)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(flatten)]
    smart: SmartArgs,
}

/// Overlays land in a sibling of the destination, never inside it,
/// so the display never syncs debug imagery.
fn debug_sibling(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    name.push_str("_debug");
    destination.with_file_name(name)
}

#[cfg(feature = "ai")]
fn build_detector(
    model_path: &Path,
    confidence_threshold: f32,
) -> Result<Arc<dyn SubjectDetector>> {
    use photodisplay_prep::image_processing::OnnxDetector;

    let detector = OnnxDetector::from_model_file(model_path, confidence_threshold)?;
    Ok(Arc::new(detector))
}

#[cfg(not(feature = "ai"))]
fn build_detector(
    model_path: &Path,
    _confidence_threshold: f32,
) -> Result<Arc<dyn SubjectDetector>> {
    Err(anyhow::anyhow!(
        "Model '{}' given, but this build has no ONNX support. Rebuild with: cargo build --release --features ai",
        model_path.display()
    ))
}

fn main() -> Result<()> {
    let cli: Cli = parse_or_exit();
    let args = cli.common;
    let smart = cli.smart;

    if !args.json_progress {
        println!("{}", style("Photo Display - Smart Crop").bold().blue());
        println!(
            "{}",
            style("Keeps detected people inside the crop window").dim()
        );
        println!();
    }

    validate_inputs(&args)?;
    validate_smart_inputs(&smart)?;
    let (width, height) = args.parse_size().map_err(|e| anyhow::anyhow!(e))?;

    let detector: Arc<dyn SubjectDetector> = match &smart.model {
        Some(model_path) => build_detector(model_path, smart.confidence_threshold)?,
        None => {
            if !args.json_progress {
                warn_println(
                    "No --model given; person detection is off and every image gets a plain center crop",
                );
            }
            Arc::new(StaticDetector::empty())
        }
    };

    let debug_root = smart.debug.then(|| debug_sibling(&args.destination));

    let config = ProcessingConfig {
        strategy: FitStrategy::SmartCrop,
        source_root: args.source.clone(),
        destination_root: args.destination.clone(),
        target: TargetSpec::new(width, height, smart.margin),
        quality: args.quality,
        extensions: args.parse_extensions(),
        verbose: args.verbose,
        json_progress: args.json_progress,
        parallel_jobs: args.effective_jobs(),
        debug_root,
    };

    if config.verbose && !config.json_progress {
        println!("{}", style("Configuration:").bold());
        println!("  Target size: {}x{}", width, height);
        println!("  JPEG quality: {}", config.quality);
        println!("  Extensions: {:?}", config.extensions);
        println!("  Parallel jobs: {}", config.parallel_jobs);
        println!("  Subject margin: {:.1}%", smart.margin * 100.0);
        println!("  Confidence threshold: {}", smart.confidence_threshold);
        match &smart.model {
            Some(model) => println!("  Model: {}", model.display()),
            None => println!("  Model: none (detection disabled)"),
        }
        if let Some(root) = &config.debug_root {
            println!("  Debug overlays: {}", root.display());
        }
        println!();
    }

    let engine = ProcessingEngine::with_detector(config, detector)?;
    let summary = engine.run()?;

    if args.json_progress {
        JsonMessage::summary(
            summary.total,
            summary.processed,
            summary.failed,
            summary.duration.as_secs_f64(),
        );
    } else if summary.total == 0 {
        println!(
            "{}",
            style("No images found with specified extensions").red()
        );
    } else {
        print_summary(&summary);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_sibling_appends_suffix() {
        assert_eq!(
            debug_sibling(Path::new("/data/frame")),
            PathBuf::from("/data/frame_debug")
        );
        assert_eq!(
            debug_sibling(Path::new("out")),
            PathBuf::from("out_debug")
        );
    }

    #[test]
    fn smart_flags_parse_with_defaults() {
        let cli = Cli::try_parse_from(["smart-crop", "/src", "/dst"]).unwrap();
        assert_eq!(cli.smart.margin, 0.05);
        assert_eq!(cli.smart.confidence_threshold, 0.6);
        assert!(cli.smart.model.is_none());
        assert!(!cli.smart.debug);

        let cli = Cli::try_parse_from([
            "smart-crop",
            "/src",
            "/dst",
            "--margin",
            "0.1",
            "--confidence",
            "0.4",
            "--debug",
        ])
        .unwrap();
        assert_eq!(cli.smart.margin, 0.1);
        assert_eq!(cli.smart.confidence_threshold, 0.4);
        assert!(cli.smart.debug);
    }
}
