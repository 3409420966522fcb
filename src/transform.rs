//! Pixel transforms: decoded image in, CHW float tensor out.

use image::imageops::FilterType;
use image::DynamicImage;
use ndarray::Array3;

/// Maps a decoded image to a fixed-shape `(C, H, W)` tensor. The transform
/// owns resizing and normalization; the dataset does not enforce the output
/// shape beyond requiring that all images of one batch agree.
pub trait Transform: Send + Sync {
    fn apply(&self, image: &DynamicImage) -> Array3<f32>;
}

/// Plain CHW conversion with pixels scaled to `[0, 1]`, no resize. This is
/// what a dataset without a configured transform applies.
pub fn to_tensor(image: &DynamicImage) -> Array3<f32> {
    let rgb = image.to_rgb8();
    let (width, height) = (rgb.width() as usize, rgb.height() as usize);
    let raw = rgb.as_raw();

    let mut out = Array3::zeros((3, height, width));
    for y in 0..height {
        for x in 0..width {
            let px = (y * width + x) * 3;
            for c in 0..3 {
                out[(c, y, x)] = raw[px + c] as f32 / 255.0;
            }
        }
    }
    out
}

/// Resize to `size x size`, scale to `[0, 1]`, then normalize each channel
/// with the given mean and standard deviation.
#[derive(Debug, Clone)]
pub struct ResizeNormalize {
    pub size: u32,
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

impl ResizeNormalize {
    /// The conventional few-shot pipeline: mean and std of 0.5 per channel.
    pub fn new(size: u32) -> Self {
        Self {
            size,
            mean: [0.5; 3],
            std: [0.5; 3],
        }
    }
}

impl Transform for ResizeNormalize {
    fn apply(&self, image: &DynamicImage) -> Array3<f32> {
        let resized = image.resize_exact(self.size, self.size, FilterType::Triangle);
        let mut tensor = to_tensor(&resized);
        for (c, mut channel) in tensor.outer_iter_mut().enumerate() {
            let (mean, std) = (self.mean[c], self.std[c]);
            channel.mapv_inplace(|v| (v - mean) / std);
        }
        tensor
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn to_tensor_is_chw_in_unit_range() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(5, 4, Rgb([255, 0, 51])));
        let tensor = to_tensor(&img);

        assert_eq!(tensor.shape(), [3, 4, 5]);
        assert_eq!(tensor[(0, 0, 0)], 1.0);
        assert_eq!(tensor[(1, 0, 0)], 0.0);
        assert!((tensor[(2, 3, 4)] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn resize_normalize_fixes_the_shape() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(17, 9, Rgb([128, 128, 128])));
        let tensor = ResizeNormalize::new(8).apply(&img);
        assert_eq!(tensor.shape(), [3, 8, 8]);
    }

    #[test]
    fn resize_normalize_centers_values() {
        // a mid-gray image lands near zero after (x - 0.5) / 0.5
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([128, 128, 128])));
        let tensor = ResizeNormalize::new(4).apply(&img);
        for v in tensor.iter() {
            assert!(v.abs() < 0.01, "expected near-zero, got {v}");
        }
    }
}
