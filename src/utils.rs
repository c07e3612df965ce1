use anyhow::Result;
use console::style;
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::{CommonArgs, SmartArgs};
use crate::error::PrepError;
use crate::image_processing::BatchSummary;

/// Create a styled progress bar
pub fn create_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.blue} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg} ({eta})",
        )
        .unwrap()
        .progress_chars("#>-"),
    );
    pb
}

/// Format duration in a human-readable way
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if secs > 0 {
        format!("{}.{:03}s", secs, duration.subsec_millis())
    } else {
        format!("{}ms", duration.as_millis())
    }
}

/// Validate command line arguments shared by all three binaries
pub fn validate_inputs(args: &CommonArgs) -> Result<()> {
    if !args.source.exists() {
        return Err(anyhow::anyhow!(
            "Source directory does not exist: {}",
            args.source.display()
        ));
    }
    if !args.source.is_dir() {
        return Err(anyhow::anyhow!(
            "Source path is not a directory: {}",
            args.source.display()
        ));
    }

    if args.quality == 0 || args.quality > 100 {
        return Err(anyhow::anyhow!(
            "JPEG quality must be between 1 and 100, got: {}",
            args.quality
        ));
    }

    let extensions = args.parse_extensions();
    if extensions.is_empty() {
        return Err(anyhow::anyhow!("No valid extensions specified"));
    }

    if args.jobs > 32 {
        return Err(anyhow::anyhow!(
            "Job count too high (max 32), got: {}",
            args.jobs
        ));
    }

    Ok(())
}

/// Validate the extra arguments of the person-aware binary
pub fn validate_smart_inputs(args: &SmartArgs) -> Result<()> {
    if !(0.0..=1.0).contains(&args.margin) {
        return Err(anyhow::anyhow!(
            "Margin must be between 0.0 and 1.0, got: {}",
            args.margin
        ));
    }

    if !(0.0..=1.0).contains(&args.confidence_threshold) {
        return Err(anyhow::anyhow!(
            "Confidence threshold must be between 0.0 and 1.0, got: {}",
            args.confidence_threshold
        ));
    }

    if let Some(model) = &args.model {
        if !model.is_file() {
            return Err(anyhow::anyhow!(
                "Model file does not exist: {}",
                model.display()
            ));
        }
    }

    Ok(())
}

/// Get file extension in lowercase
pub fn get_file_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

/// Check if a file has one of the specified extensions
pub fn has_valid_extension(path: &Path, extensions: &[String]) -> bool {
    if let Some(ext) = get_file_extension(path) {
        extensions.contains(&ext)
    } else {
        false
    }
}

/// Replace spaces with underscores in every path component.
///
/// Display firmware reads manifest lines verbatim, and unescaped spaces
/// have historically broken that parsing.
pub fn sanitize_rel_path(rel: &Path) -> PathBuf {
    rel.iter()
        .map(|component| component.to_string_lossy().replace(' ', "_"))
        .collect()
}

/// Destination-relative path for a source-relative input path.
///
/// Sanitizes each component and renames to `.jpg`, since the output is
/// always JPEG regardless of the source format.
pub fn output_rel_path(rel: &Path) -> PathBuf {
    sanitize_rel_path(rel).with_extension("jpg")
}

/// Source-relative path of a discovered file, for mirroring.
pub fn relative_to_root(path: &Path, root: &Path) -> Result<PathBuf, PrepError> {
    path.strip_prefix(root)
        .map(Path::to_path_buf)
        .map_err(|_| {
            PrepError::InvalidInput(format!(
                "{} is not under the source root {}",
                path.display(),
                root.display()
            ))
        })
}

/// Stem-tagged variant of an output path, `a.jpg` plus `png` gives
/// `a_png.jpg`.
fn tagged_rel_path(rel: &Path, tag: &str) -> PathBuf {
    let stem = rel
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    rel.with_file_name(format!("{}_{}.jpg", stem, tag))
}

/// Assign each discovered file a unique destination-relative path.
///
/// Outputs are always `.jpg`, so same-stem siblings such as `a.jpg` and
/// `a.png` map to the same destination file. Later files in the batch
/// get the source extension embedded in the stem instead: `a.png`
/// becomes `a_png.jpg`. A file outside the root yields a per-file error
/// and reserves no name.
pub fn assign_output_paths(files: &[PathBuf], root: &Path) -> Vec<Result<PathBuf, PrepError>> {
    let mut taken = HashSet::new();

    files
        .iter()
        .map(|path| {
            let rel = output_rel_path(&relative_to_root(path, root)?);
            let ext = get_file_extension(path).unwrap_or_default();

            let mut unique = rel.clone();
            let mut round = 1usize;
            while !taken.insert(unique.clone()) {
                unique = if round == 1 {
                    tagged_rel_path(&rel, &ext)
                } else {
                    tagged_rel_path(&rel, &format!("{}_{}", ext, round))
                };
                round += 1;
            }
            Ok(unique)
        })
        .collect()
}

/// Encode as JPEG at the given quality, creating parent directories.
pub fn save_jpeg(img: &RgbImage, path: &Path, quality: u8) -> Result<(), PrepError> {
    let encode_err = |source| PrepError::Encode {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| encode_err(image::ImageError::IoError(e)))?;
    }

    let file = File::create(path).map_err(|e| encode_err(image::ImageError::IoError(e)))?;
    let writer = BufWriter::new(file);
    let encoder = JpegEncoder::new_with_quality(writer, quality);
    img.write_with_encoder(encoder).map_err(encode_err)
}

/// Print verbose information if verbose mode is enabled
pub fn verbose_println(verbose: bool, message: &str) {
    if verbose {
        println!("{} {}", style("[VERBOSE]").dim(), message);
    }
}

/// Print warning message
pub fn warn_println(message: &str) {
    println!("{} {}", style("[WARNING]").yellow().bold(), message);
}

/// Print error message
pub fn error_println(message: &str) {
    eprintln!("{} {}", style("[ERROR]").red().bold(), message);
}

/// Styled end-of-run summary shared by the three binaries.
pub fn print_summary(summary: &BatchSummary) {
    println!();
    println!("{}", style("Results Summary:").bold().green());
    println!(
        "  Successfully processed: {}",
        style(summary.processed).bold().green()
    );
    if summary.failed > 0 {
        println!("  Failed: {}", style(summary.failed).bold().red());
    }
    if let Some(manifest_path) = &summary.manifest_path {
        println!(
            "  Manifest: {} ({} entries)",
            style(manifest_path.display()).bold(),
            summary.manifest_entries.len()
        );
    }

    println!();
    println!("{}", style("Performance:").bold().blue());
    println!(
        "  Total processing time: {}",
        style(format_duration(summary.duration)).bold()
    );
    if summary.total > 0 {
        println!(
            "  Average time per image: {}",
            style(format_duration(summary.duration / summary.total as u32)).dim()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(500)), "500ms");
        assert_eq!(format_duration(Duration::from_secs(1)), "1.000s");
        assert_eq!(format_duration(Duration::from_secs(65)), "1m 5s");
    }

    #[test]
    fn test_extension_helpers() {
        let exts = vec!["jpg".to_string(), "jpeg".to_string(), "png".to_string()];

        assert!(has_valid_extension(Path::new("a/b/photo.jpg"), &exts));
        assert!(has_valid_extension(Path::new("a/PHOTO.JPEG"), &exts));
        assert!(!has_valid_extension(Path::new("a/clip.livp"), &exts));
        assert!(!has_valid_extension(Path::new("a/noext"), &exts));

        assert_eq!(
            get_file_extension(Path::new("IMG.HEIC")),
            Some("heic".to_string())
        );
        assert_eq!(get_file_extension(Path::new("noext")), None);
    }

    #[test]
    fn test_sanitize_rel_path() {
        assert_eq!(
            sanitize_rel_path(Path::new("summer trip/day 1/beach shot.png")),
            PathBuf::from("summer_trip/day_1/beach_shot.png")
        );
        assert_eq!(
            sanitize_rel_path(Path::new("clean/name.jpg")),
            PathBuf::from("clean/name.jpg")
        );
    }

    #[test]
    fn test_output_rel_path_rewrites_extension() {
        assert_eq!(
            output_rel_path(Path::new("album/pic.png")),
            PathBuf::from("album/pic.jpg")
        );
        assert_eq!(
            output_rel_path(Path::new("album/pic.JPEG")),
            PathBuf::from("album/pic.jpg")
        );
        assert_eq!(
            output_rel_path(Path::new("my album/my pic.jpeg")),
            PathBuf::from("my_album/my_pic.jpg")
        );
        assert_eq!(
            output_rel_path(Path::new("album/noext")),
            PathBuf::from("album/noext.jpg")
        );
    }

    #[test]
    fn test_relative_to_root() {
        let rel =
            relative_to_root(Path::new("/data/raw/a/b.jpg"), Path::new("/data/raw")).unwrap();
        assert_eq!(rel, PathBuf::from("a/b.jpg"));

        assert!(relative_to_root(Path::new("/elsewhere/b.jpg"), Path::new("/data/raw")).is_err());
    }

    #[test]
    fn test_assign_output_paths_disambiguates_same_stems() {
        let files = vec![
            PathBuf::from("/data/raw/a.jpg"),
            PathBuf::from("/data/raw/a.png"),
            PathBuf::from("/data/raw/album/b.png"),
        ];

        let assigned: Vec<_> = assign_output_paths(&files, Path::new("/data/raw"))
            .into_iter()
            .map(Result::unwrap)
            .collect();

        assert_eq!(
            assigned,
            vec![
                PathBuf::from("a.jpg"),
                PathBuf::from("a_png.jpg"),
                PathBuf::from("album/b.jpg"),
            ]
        );
    }

    #[test]
    fn test_assign_output_paths_survives_tag_collisions() {
        // All three sanitize to the stem `a_b` with the extension `png`,
        // so the third name needs the numbered fallback.
        let files = vec![
            PathBuf::from("/data/raw/a b.png"),
            PathBuf::from("/data/raw/a_b.PNG"),
            PathBuf::from("/data/raw/a_b.png"),
        ];

        let assigned: Vec<_> = assign_output_paths(&files, Path::new("/data/raw"))
            .into_iter()
            .map(Result::unwrap)
            .collect();

        assert_eq!(
            assigned,
            vec![
                PathBuf::from("a_b.jpg"),
                PathBuf::from("a_b_png.jpg"),
                PathBuf::from("a_b_png_2.jpg"),
            ]
        );
    }

    #[test]
    fn test_validate_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let good = CommonArgs {
            source: dir.path().to_path_buf(),
            ..Default::default()
        };
        assert!(validate_inputs(&good).is_ok());

        let bad_quality = CommonArgs {
            quality: 0,
            ..good.clone()
        };
        assert!(validate_inputs(&bad_quality).is_err());

        let bad_jobs = CommonArgs {
            jobs: 64,
            ..good.clone()
        };
        assert!(validate_inputs(&bad_jobs).is_err());

        let missing_source = CommonArgs {
            source: dir.path().join("missing"),
            ..good.clone()
        };
        assert!(validate_inputs(&missing_source).is_err());
    }

    #[test]
    fn test_validate_smart_inputs() {
        let good = SmartArgs {
            margin: 0.05,
            confidence_threshold: 0.6,
            model: None,
            debug: false,
        };
        assert!(validate_smart_inputs(&good).is_ok());

        let bad_margin = SmartArgs {
            margin: 1.5,
            ..good.clone()
        };
        assert!(validate_smart_inputs(&bad_margin).is_err());

        let bad_confidence = SmartArgs {
            confidence_threshold: -0.1,
            ..good.clone()
        };
        assert!(validate_smart_inputs(&bad_confidence).is_err());

        let missing_model = SmartArgs {
            model: Some(PathBuf::from("/no/such/model.onnx")),
            ..good
        };
        assert!(validate_smart_inputs(&missing_model).is_err());
    }

    #[test]
    fn test_save_jpeg_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.jpg");
        let img: RgbImage = ImageBuffer::from_pixel(32, 16, Rgb([120, 10, 200]));

        save_jpeg(&img, &path, 95).unwrap();

        let loaded = image::open(&path).unwrap();
        assert_eq!(loaded.width(), 32);
        assert_eq!(loaded.height(), 16);
    }
}
