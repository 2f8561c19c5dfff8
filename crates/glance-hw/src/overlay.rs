//! Rendering surface: the frame plus face boxes, sized to the stream.

use crate::frame::Frame;
use glance_core::BoundingBox;
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use std::path::Path;
use thiserror::Error;

/// Face box stroke colour (#00ff00).
pub const FACE_BOX_COLOR: [u8; 3] = [0x00, 0xff, 0x00];
/// Face box stroke width in pixels.
pub const FACE_BOX_WIDTH: u32 = 2;

#[derive(Error, Debug)]
pub enum SurfaceError {
    #[error("frame is {frame_width}x{frame_height}, surface is {width}x{height}")]
    SizeMismatch {
        frame_width: u32,
        frame_height: u32,
        width: u32,
        height: u32,
    },
    #[error("failed to write image: {0}")]
    Write(#[from] image::ImageError),
}

/// A 2D drawable matching the video's native resolution.
pub trait Surface {
    fn size(&self) -> (u32, u32);

    /// Resize the backing store; contents are discarded.
    fn resize(&mut self, width: u32, height: u32);

    fn clear(&mut self);

    /// Copy a frame onto the surface at the origin.
    fn draw_image(&mut self, frame: &Frame) -> Result<(), SurfaceError>;

    /// Outline a rectangle with a stroke `line_width` pixels wide, drawn inward.
    fn stroke_rect(&mut self, rect: &BoundingBox, color: [u8; 3], line_width: u32);
}

/// In-memory RGB overlay.
pub struct Overlay {
    canvas: RgbImage,
}

impl Overlay {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            canvas: RgbImage::new(width, height),
        }
    }

    pub fn image(&self) -> &RgbImage {
        &self.canvas
    }

    /// Write the current contents to an image file (format from the extension).
    pub fn save(&self, path: &Path) -> Result<(), SurfaceError> {
        self.canvas.save(path)?;
        Ok(())
    }
}

impl Surface for Overlay {
    fn size(&self) -> (u32, u32) {
        self.canvas.dimensions()
    }

    fn resize(&mut self, width: u32, height: u32) {
        if self.canvas.dimensions() != (width, height) {
            tracing::debug!(width, height, "overlay resized");
            self.canvas = RgbImage::new(width, height);
        }
    }

    fn clear(&mut self) {
        self.canvas.pixels_mut().for_each(|p| *p = Rgb([0, 0, 0]));
    }

    fn draw_image(&mut self, frame: &Frame) -> Result<(), SurfaceError> {
        let (width, height) = self.canvas.dimensions();
        if (frame.width, frame.height) != (width, height) || frame.data.len() != self.canvas.len() {
            return Err(SurfaceError::SizeMismatch {
                frame_width: frame.width,
                frame_height: frame.height,
                width,
                height,
            });
        }
        self.canvas.copy_from_slice(&frame.data);
        Ok(())
    }

    fn stroke_rect(&mut self, rect: &BoundingBox, color: [u8; 3], line_width: u32) {
        let (width, height) = self.canvas.dimensions();
        let Some(rect) = rect.clamp_to(width, height) else {
            return;
        };

        let x = rect.x.round() as i32;
        let y = rect.y.round() as i32;
        let w = rect.width.round() as i32;
        let h = rect.height.round() as i32;

        for inset in 0..line_width as i32 {
            let (iw, ih) = (w - 2 * inset, h - 2 * inset);
            if iw <= 0 || ih <= 0 {
                break;
            }
            let r = Rect::at(x + inset, y + inset).of_size(iw as u32, ih as u32);
            draw_hollow_rect_mut(&mut self.canvas, r, Rgb(color));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray_frame(width: u32, height: u32, value: u8) -> Frame {
        Frame::from_rgb(vec![value; (width * height * 3) as usize], width, height, 0).unwrap()
    }

    fn bbox(x: f32, y: f32, w: f32, h: f32) -> BoundingBox {
        BoundingBox {
            x,
            y,
            width: w,
            height: h,
            confidence: 1.0,
        }
    }

    #[test]
    fn test_draw_image_copies_pixels() {
        let mut overlay = Overlay::new(4, 3);
        overlay.draw_image(&gray_frame(4, 3, 77)).unwrap();
        assert!(overlay.image().pixels().all(|p| p.0 == [77, 77, 77]));
    }

    #[test]
    fn test_draw_image_size_mismatch() {
        let mut overlay = Overlay::new(4, 3);
        let err = overlay.draw_image(&gray_frame(3, 3, 0)).unwrap_err();
        assert!(matches!(err, SurfaceError::SizeMismatch { frame_width: 3, .. }));
    }

    #[test]
    fn test_clear() {
        let mut overlay = Overlay::new(2, 2);
        overlay.draw_image(&gray_frame(2, 2, 200)).unwrap();
        overlay.clear();
        assert!(overlay.image().pixels().all(|p| p.0 == [0, 0, 0]));
    }

    #[test]
    fn test_resize() {
        let mut overlay = Overlay::new(1, 1);
        overlay.resize(640, 480);
        assert_eq!(overlay.size(), (640, 480));
    }

    #[test]
    fn test_stroke_rect_two_pixels_wide() {
        let mut overlay = Overlay::new(20, 20);
        overlay.stroke_rect(&bbox(5.0, 5.0, 10.0, 10.0), FACE_BOX_COLOR, FACE_BOX_WIDTH);
        let img = overlay.image();

        // Outer and inner ring are green, the interior is untouched.
        assert_eq!(img.get_pixel(5, 5).0, FACE_BOX_COLOR);
        assert_eq!(img.get_pixel(6, 6).0, FACE_BOX_COLOR);
        assert_eq!(img.get_pixel(14, 10).0, FACE_BOX_COLOR);
        assert_eq!(img.get_pixel(13, 10).0, FACE_BOX_COLOR);
        assert_eq!(img.get_pixel(10, 10).0, [0, 0, 0]);
        assert_eq!(img.get_pixel(7, 7).0, [0, 0, 0]);
        // Outside the box.
        assert_eq!(img.get_pixel(4, 4).0, [0, 0, 0]);
    }

    #[test]
    fn test_stroke_rect_outside_is_noop() {
        let mut overlay = Overlay::new(10, 10);
        overlay.stroke_rect(&bbox(50.0, 50.0, 5.0, 5.0), FACE_BOX_COLOR, FACE_BOX_WIDTH);
        assert!(overlay.image().pixels().all(|p| p.0 == [0, 0, 0]));
    }
}
