use exif::{In, Reader, Tag};
use image::DynamicImage;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// EXIF orientation tag (0x0112) values.
///
/// Cameras record the sensor data unrotated and note the camera position
/// here; the pipeline bakes the correction into the pixels before any
/// geometry is planned so crop windows always work on upright images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExifOrientation {
    Normal,
    FlipHorizontal,
    Rotate180,
    FlipVertical,
    Transpose,
    Rotate90,
    Transverse,
    Rotate270,
}

impl ExifOrientation {
    pub fn from_value(value: u32) -> Option<Self> {
        match value {
            1 => Some(Self::Normal),
            2 => Some(Self::FlipHorizontal),
            3 => Some(Self::Rotate180),
            4 => Some(Self::FlipVertical),
            5 => Some(Self::Transpose),
            6 => Some(Self::Rotate90),
            7 => Some(Self::Transverse),
            8 => Some(Self::Rotate270),
            _ => None,
        }
    }

    /// Read the orientation from a file's EXIF block.
    ///
    /// Missing files, formats without EXIF and absent or malformed tags
    /// all come back as `None`; the caller treats that as `Normal`.
    pub fn read_from(path: &Path) -> Option<Self> {
        let file = File::open(path).ok()?;
        let mut reader = BufReader::new(file);
        let exif = Reader::new().read_from_container(&mut reader).ok()?;
        let field = exif.get_field(Tag::Orientation, In::PRIMARY)?;
        field.value.get_uint(0).and_then(Self::from_value)
    }

    /// Rotate and flip the pixels so the image displays upright.
    pub fn apply(self, img: DynamicImage) -> DynamicImage {
        match self {
            Self::Normal => img,
            Self::FlipHorizontal => img.fliph(),
            Self::Rotate180 => img.rotate180(),
            Self::FlipVertical => img.flipv(),
            Self::Transpose => img.rotate90().fliph(),
            Self::Rotate90 => img.rotate90(),
            Self::Transverse => img.rotate270().fliph(),
            Self::Rotate270 => img.rotate270(),
        }
    }
}

/// Decode helper used by the pipeline: load the pixels and correct them
/// in one step.
pub fn auto_orient(path: &Path, img: DynamicImage) -> DynamicImage {
    match ExifOrientation::read_from(path) {
        Some(orientation) => orientation.apply(img),
        None => img,
    }
}
