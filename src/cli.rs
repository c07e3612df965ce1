use clap::Parser;
use std::path::PathBuf;

use crate::image_processing::DEFAULT_CONFIDENCE_THRESHOLD;

/// Arguments shared by all three binaries.
///
/// The positional surface is exactly two paths, source and destination,
/// the same contract the display tooling has always scripted against.
#[derive(clap::Args, Debug, Clone)]
pub struct CommonArgs {
    /// Source directory, walked recursively for images
    #[arg(value_name = "SRC_DIR")]
    pub source: PathBuf,

    /// Destination root; the source tree is mirrored below it
    #[arg(value_name = "DST_DIR")]
    pub destination: PathBuf,

    /// Output canvas size (format: WIDTHxHEIGHT)
    #[arg(
        short = 's',
        long = "size",
        default_value = "368x448",
        value_name = "WIDTHxHEIGHT"
    )]
    pub size: String,

    /// JPEG quality for encoded output (1-100)
    #[arg(short = 'q', long = "quality", default_value = "95", value_name = "N")]
    pub quality: u8,

    /// Comma-separated list of image extensions to process
    #[arg(long = "extensions", default_value = "jpg,jpeg,png", value_name = "EXT,...")]
    pub extensions_str: String,

    /// Number of parallel processing jobs (0 = auto-detect CPU cores)
    #[arg(short = 'j', long = "jobs", default_value = "0", value_name = "N")]
    pub jobs: usize,

    /// Enable verbose output with per-image detail
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Emit machine-readable JSON progress lines on stdout
    #[arg(long = "json-progress")]
    pub json_progress: bool,
}

impl CommonArgs {
    /// Parse the size string into width and height
    pub fn parse_size(&self) -> Result<(u32, u32), String> {
        let parts: Vec<&str> = self.size.split('x').collect();
        if parts.len() != 2 {
            return Err(format!(
                "Invalid size format '{}'. Use WIDTHxHEIGHT (e.g., 368x448)",
                self.size
            ));
        }

        let width = parts[0]
            .parse::<u32>()
            .map_err(|_| format!("Invalid width: '{}'", parts[0]))?;
        let height = parts[1]
            .parse::<u32>()
            .map_err(|_| format!("Invalid height: '{}'", parts[1]))?;

        if width == 0 || height == 0 {
            return Err("Width and height must be greater than 0".to_string());
        }

        if width > 4000 || height > 4000 {
            return Err("Width and height must be less than 4000 pixels".to_string());
        }

        Ok((width, height))
    }

    /// Parse the extensions string into a vector
    pub fn parse_extensions(&self) -> Vec<String> {
        self.extensions_str
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Worker count after resolving the auto-detect default
    pub fn effective_jobs(&self) -> usize {
        if self.jobs == 0 {
            num_cpus::get()
        } else {
            self.jobs
        }
    }
}

/// Extra arguments for the person-aware binary.
#[derive(clap::Args, Debug, Clone)]
pub struct SmartArgs {
    /// Margin kept around detected people as a fraction (0.05 = 5%)
    #[arg(long = "margin", default_value = "0.05", value_name = "FRACTION")]
    pub margin: f64,

    /// Confidence threshold for person detection (0.0-1.0)
    #[arg(
        long = "confidence",
        default_value_t = DEFAULT_CONFIDENCE_THRESHOLD,
        value_name = "THRESHOLD"
    )]
    pub confidence_threshold: f32,

    /// Path to a YOLO11 ONNX model file (needs a build with the ai feature)
    #[arg(long = "model", value_name = "FILE")]
    pub model: Option<PathBuf>,

    /// Save detection and crop-window overlays under <DST_DIR>_debug
    #[arg(long = "debug")]
    pub debug: bool,
}

/// Parse the command line like the historical scripts did: anything
/// malformed prints usage and exits with status 1. Help and version
/// keep clap's usual behavior.
pub fn parse_or_exit<T: Parser>() -> T {
    match T::try_parse() {
        Ok(args) => args,
        Err(e)
            if e.kind() == clap::error::ErrorKind::DisplayHelp
                || e.kind() == clap::error::ErrorKind::DisplayVersion =>
        {
            e.exit()
        }
        Err(e) => {
            let _ = e.print();
            std::process::exit(1);
        }
    }
}


// Default implementation for tests
#[cfg(test)]
impl Default for CommonArgs {
    fn default() -> Self {
        Self {
            source: PathBuf::new(),
            destination: PathBuf::new(),
            size: "368x448".to_string(),
            quality: 95,
            extensions_str: "jpg,jpeg,png".to_string(),
            jobs: 0,
            verbose: false,
            json_progress: false,
        }
    }
}
