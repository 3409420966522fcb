//! Image decoding collaborators.

use std::fs;
use std::path::Path;

use image::{DynamicImage, ImageReader};

use crate::DatasetResult;

/// Decodes one image file. Implementations are chosen by the caller; decode
/// failures propagate unmodified to whoever requested the episode.
pub trait ImageLoader: Send + Sync {
    fn load(&self, path: &Path) -> DatasetResult<DynamicImage>;
}

/// Default decoder: format from the file extension, RGB output.
///
/// When extension-based decoding fails (misnamed files are common in scraped
/// splits), falls back to sniffing the byte stream for the real format.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultLoader;

impl ImageLoader for DefaultLoader {
    fn load(&self, path: &Path) -> DatasetResult<DynamicImage> {
        match ImageReader::open(path)?.decode() {
            Ok(img) => Ok(DynamicImage::ImageRgb8(img.to_rgb8())),
            // Potentially a format-detection problem, decode from the bytes
            Err(_) => {
                let bytes = fs::read(path)?;
                let img = image::load_from_memory(&bytes)?;
                Ok(DynamicImage::ImageRgb8(img.to_rgb8()))
            }
        }
    }
}

/// Single-channel decoder for grayscale pipelines.
#[derive(Debug, Default, Clone, Copy)]
pub struct GrayLoader;

impl ImageLoader for GrayLoader {
    fn load(&self, path: &Path) -> DatasetResult<DynamicImage> {
        let img = ImageReader::open(path)?.decode()?;
        Ok(DynamicImage::ImageLuma8(img.to_luma8()))
    }
}
