use anyhow::Result;
use clap::Parser;
use console::style;

use photodisplay_prep::cli::{parse_or_exit, CommonArgs};
use photodisplay_prep::image_processing::TargetSpec;
use photodisplay_prep::utils::{print_summary, validate_inputs};
use photodisplay_prep::{FitStrategy, JsonMessage, ProcessingConfig, ProcessingEngine};

#[derive(Parser, Debug)]
#[command(
    name = "center-crop",
    version,
    about = "Batch center-crop photos to the display canvas"
)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,
}

fn main() -> Result<()> {
    let cli: Cli = parse_or_exit();
    let args = cli.common;

    if !args.json_progress {
        println!("{}", style("Photo Display - Center Crop").bold().blue());
        println!(
            "{}",
            style("Fills the canvas, trims the centered excess").dim()
        );
        println!();
    }

    validate_inputs(&args)?;
    let (width, height) = args.parse_size().map_err(|e| anyhow::anyhow!(e))?;

    let config = ProcessingConfig {
        strategy: FitStrategy::CenterCrop,
        source_root: args.source.clone(),
        destination_root: args.destination.clone(),
        target: TargetSpec::new(width, height, 0.0),
        quality: args.quality,
        extensions: args.parse_extensions(),
        verbose: args.verbose,
        json_progress: args.json_progress,
        parallel_jobs: args.effective_jobs(),
        debug_root: None,
    };

    if config.verbose && !config.json_progress {
        println!("{}", style("Configuration:").bold());
        println!("  Target size: {}x{}", width, height);
        println!("  JPEG quality: {}", config.quality);
        println!("  Extensions: {:?}", config.extensions);
        println!("  Parallel jobs: {}", config.parallel_jobs);
        println!();
    }

    let engine = ProcessingEngine::new(config)?;
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
