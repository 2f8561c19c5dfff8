//! Frame to NCHW tensor conversion shared by both models.

use glance_hw::Frame;
use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array4;

/// Resize an RGB frame to `size` x `size` and lay it out as a
/// `[1, 3, size, size]` float tensor scaled to `[0, 1]`.
///
/// The resize stretches rather than letterboxes, so output coordinates map
/// back to the frame with independent x and y scales.
pub(crate) fn to_nchw(frame: &Frame, size: usize) -> Array4<f32> {
    image_to_nchw(&frame.to_rgb_image(), size)
}

/// [`to_nchw`] for an image already cut out of a frame.
pub(crate) fn image_to_nchw(img: &RgbImage, size: usize) -> Array4<f32> {
    let resized = imageops::resize(img, size as u32, size as u32, FilterType::Triangle);

    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
    for (x, y, pixel) in resized.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        for c in 0..3 {
            tensor[[0, c, y, x]] = pixel.0[c] as f32 / 255.0;
        }
    }
    tensor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_nchw_shape_and_scale() {
        let frame = Frame::from_rgb(vec![255; 8 * 4 * 3], 8, 4, 0).unwrap();
        let tensor = to_nchw(&frame, 16);
        assert_eq!(tensor.shape(), &[1, 3, 16, 16]);
        assert!(tensor.iter().all(|&v| (v - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_to_nchw_channel_order() {
        // Pure red frame: channel 0 is 1.0, the others 0.0.
        let data: Vec<u8> = (0..4).flat_map(|_| [255u8, 0, 0]).collect();
        let frame = Frame::from_rgb(data, 2, 2, 0).unwrap();
        let tensor = to_nchw(&frame, 2);
        assert!((tensor[[0, 0, 1, 1]] - 1.0).abs() < 1e-6);
        assert_eq!(tensor[[0, 1, 1, 1]], 0.0);
        assert_eq!(tensor[[0, 2, 0, 0]], 0.0);
    }

    #[test]
    fn test_image_to_nchw_uses_only_the_crop() {
        let mut img = RgbImage::new(8, 8);
        for (x, _, pixel) in img.enumerate_pixels_mut() {
            pixel.0 = if x < 4 { [255, 255, 255] } else { [0, 0, 0] };
        }
        let left = imageops::crop_imm(&img, 0, 0, 4, 8).to_image();
        let tensor = image_to_nchw(&left, 4);
        assert!(tensor.iter().all(|&v| (v - 1.0).abs() < 1e-6));
    }
}
