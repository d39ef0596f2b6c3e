//! Aspect-preserving resize onto a square, zero-padded canvas
//!
//! The model takes a fixed `T × T` input. Frames are scaled so their longer
//! side equals `T`, centred, and the remaining border is left black. The
//! recorded geometry maps model coordinates back into the original frame.

use image::imageops::{self, FilterType};
use image::RgbImage;

/// Geometry of one letterbox transform
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    /// Side length of the square model input
    pub target: u32,
    /// Resized content width
    pub new_width: u32,
    /// Resized content height
    pub new_height: u32,
    /// Left padding in pixels
    pub pad_x: u32,
    /// Top padding in pixels
    pub pad_y: u32,
}

impl Letterbox {
    /// Compute the transform for a `width × height` frame
    #[must_use]
    pub fn compute(width: u32, height: u32, target: u32) -> Self {
        let scale = f64::from(target) / f64::from(width.max(height));
        let new_width = ((f64::from(width) * scale) as u32).clamp(1, target);
        let new_height = ((f64::from(height) * scale) as u32).clamp(1, target);

        Self {
            target,
            new_width,
            new_height,
            pad_x: (target - new_width) / 2,
            pad_y: (target - new_height) / 2,
        }
    }

    /// Resize and pad `frame`, returning NHWC `int32` pixel data
    #[must_use]
    pub fn apply(&self, frame: &RgbImage) -> Vec<i32> {
        let resized = imageops::resize(frame, self.new_width, self.new_height, FilterType::Triangle);

        let t = self.target as usize;
        let mut data = vec![0i32; t * t * 3];

        for (x, y, pixel) in resized.enumerate_pixels() {
            let row = (y + self.pad_y) as usize;
            let col = (x + self.pad_x) as usize;
            let offset = (row * t + col) * 3;
            data[offset] = i32::from(pixel[0]);
            data[offset + 1] = i32::from(pixel[1]);
            data[offset + 2] = i32::from(pixel[2]);
        }

        data
    }

    /// Map a normalized `(y, x)` in model space to a normalized `(x, y)` in
    /// the original frame, clipped to `[0, 1]`
    #[must_use]
    pub fn to_original(&self, y: f32, x: f32) -> (f32, f32) {
        let t = self.target as f32;
        let pad_y_ratio = self.pad_y as f32 / t;
        let pad_x_ratio = self.pad_x as f32 / t;
        let h_ratio = self.new_height as f32 / t;
        let w_ratio = self.new_width as f32 / t;

        let orig_y = ((y - pad_y_ratio) / h_ratio).clamp(0.0, 1.0);
        let orig_x = ((x - pad_x_ratio) / w_ratio).clamp(0.0, 1.0);

        (orig_x, orig_y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn landscape_pads_vertically() {
        let lb = Letterbox::compute(1920, 1080, 256);
        assert_eq!(lb.new_width, 256);
        assert_eq!(lb.new_height, 144);
        assert_eq!(lb.pad_x, 0);
        assert_eq!(lb.pad_y, 56);
    }

    #[test]
    fn portrait_pads_horizontally() {
        let lb = Letterbox::compute(720, 1280, 256);
        assert_eq!(lb.new_height, 256);
        assert_eq!(lb.new_width, 144);
        assert_eq!(lb.pad_x, 56);
        assert_eq!(lb.pad_y, 0);
    }

    #[test]
    fn square_has_no_padding() {
        let lb = Letterbox::compute(512, 512, 256);
        assert_eq!((lb.new_width, lb.new_height), (256, 256));
        assert_eq!((lb.pad_x, lb.pad_y), (0, 0));
    }

    #[test]
    fn extreme_aspect_keeps_one_pixel() {
        let lb = Letterbox::compute(10_000, 1, 256);
        assert_eq!(lb.new_height, 1);
        assert_eq!(lb.new_width, 256);
    }

    #[test]
    fn apply_places_content_between_padding() {
        let frame = RgbImage::from_pixel(200, 100, Rgb([10, 20, 30]));
        let lb = Letterbox::compute(200, 100, 64);
        let data = lb.apply(&frame);

        assert_eq!(data.len(), 64 * 64 * 3);
        // top padding row is black
        assert_eq!(&data[0..3], &[0, 0, 0]);
        // centre pixel carries the frame colour
        let centre = (32 * 64 + 32) * 3;
        assert_eq!(&data[centre..centre + 3], &[10, 20, 30]);
    }

    #[test]
    fn to_original_removes_padding() {
        let lb = Letterbox::compute(1920, 1080, 256);
        // top edge of the content area
        let (x, y) = lb.to_original(56.0 / 256.0, 0.5);
        assert!((x - 0.5).abs() < 1e-6);
        assert!(y.abs() < 1e-6);
        // inside the top padding clips to zero
        let (_, y) = lb.to_original(0.0, 0.5);
        assert_eq!(y, 0.0);
        // bottom padding clips to one
        let (_, y) = lb.to_original(1.0, 0.5);
        assert_eq!(y, 1.0);
    }
}
