//! 1 bpp image buffers
//!
//! An [`ImageBuffer`] is the exact byte layout the panel RAM expects: one bit
//! per pixel, 8 pixels per byte, most significant bit first, rows top to
//! bottom. A 0 bit is black and a 1 bit is white.
//!
//! With the `graphics` feature the buffer is an embedded-graphics
//! [`DrawTarget`](embedded_graphics_core::draw_target::DrawTarget), with
//! `BinaryColor::Off` as black and `BinaryColor::On` as white.
//!
//! ## Example
//!
//! ```
//! use moodink::{Dimensions, ImageBuffer};
//!
//! let dims = Dimensions::default();
//! let frame = ImageBuffer::white(dims);
//! assert_eq!(frame.as_bytes().len(), 4736);
//! assert_eq!(frame.is_white(0, 0), Some(true));
//!
//! // Any other length is rejected
//! assert!(ImageBuffer::new(dims, vec![0u8; 3]).is_err());
//! ```

use std::path::Path;

use image::{GrayImage, Luma};

use crate::config::Dimensions;
use crate::error::Error;

/// Byte index and bit mask of pixel (x, y) in a row-major, MSB-first buffer
///
/// # Example
///
/// ```
/// use moodink::frame::pixel_location;
///
/// // Pixel (0,0) is at byte 0, bit 7 (MSB)
/// assert_eq!(pixel_location(0, 0, 16), (0, 0x80));
/// // Pixel (9,1) is at byte 17, bit 6
/// assert_eq!(pixel_location(9, 1, 16), (17, 0x40));
/// ```
pub fn pixel_location(x: u32, y: u32, row_bytes: usize) -> (usize, u8) {
    let index = y as usize * row_bytes + (x / 8) as usize;
    let bit = 0x80 >> (x % 8);
    (index, bit)
}

/// Validated full-panel image
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageBuffer {
    dimensions: Dimensions,
    data: Vec<u8>,
}

impl ImageBuffer {
    /// Wrap raw bytes, checking they cover the panel exactly
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` if `data` is not exactly
    /// `dimensions.buffer_size()` bytes. Nothing is truncated or padded.
    pub fn new(dimensions: Dimensions, data: Vec<u8>) -> Result<Self, Error> {
        let expected = dimensions.buffer_size();
        if data.len() != expected {
            return Err(Error::Validation {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { dimensions, data })
    }

    /// Copy a borrowed slice into a validated buffer
    pub fn from_slice(dimensions: Dimensions, data: &[u8]) -> Result<Self, Error> {
        let expected = dimensions.buffer_size();
        if data.len() != expected {
            return Err(Error::Validation {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            dimensions,
            data: data.to_vec(),
        })
    }

    /// Buffer with every byte set to `byte`
    pub fn filled(dimensions: Dimensions, byte: u8) -> Self {
        Self {
            dimensions,
            data: vec![byte; dimensions.buffer_size()],
        }
    }

    /// All-white buffer
    pub fn white(dimensions: Dimensions) -> Self {
        Self::filled(dimensions, 0xFF)
    }

    /// Panel dimensions this buffer was validated against
    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Raw bytes in wire order
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consume the buffer, returning the raw bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Whether pixel (x, y) is white, or `None` if out of bounds
    pub fn is_white(&self, x: u32, y: u32) -> Option<bool> {
        if x >= self.dimensions.cols as u32 || y >= self.dimensions.rows as u32 {
            return None;
        }
        let (index, bit) = pixel_location(x, y, self.dimensions.row_bytes());
        self.data.get(index).map(|byte| byte & bit != 0)
    }

    /// Set pixel (x, y); out-of-bounds writes are ignored
    pub fn set_pixel(&mut self, x: u32, y: u32, white: bool) {
        if x >= self.dimensions.cols as u32 || y >= self.dimensions.rows as u32 {
            return;
        }
        let (index, bit) = pixel_location(x, y, self.dimensions.row_bytes());
        if let Some(byte) = self.data.get_mut(index) {
            if white {
                *byte |= bit;
            } else {
                *byte &= !bit;
            }
        }
    }

    /// Expand to an 8-bit grayscale raster (0 = black, 255 = white)
    pub fn to_gray_image(&self) -> GrayImage {
        let cols = self.dimensions.cols as u32;
        let rows = self.dimensions.rows as u32;
        GrayImage::from_fn(cols, rows, |x, y| match self.is_white(x, y) {
            Some(false) => Luma([0]),
            _ => Luma([255]),
        })
    }

    /// Write the buffer as a PNG file
    pub fn save_png(&self, path: &Path) -> image::ImageResult<()> {
        self.to_gray_image().save(path)
    }
}

impl AsRef<[u8]> for ImageBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

#[cfg(feature = "graphics")]
mod graphics {
    use core::convert::Infallible;

    use embedded_graphics_core::{
        draw_target::DrawTarget,
        geometry::{OriginDimensions, Point, Size},
        pixelcolor::BinaryColor,
        prelude::Pixel,
    };

    use super::ImageBuffer;

    impl DrawTarget for ImageBuffer {
        type Color = BinaryColor;
        type Error = Infallible;

        fn draw_iter<Iter>(&mut self, pixels: Iter) -> Result<(), Self::Error>
        where
            Iter: IntoIterator<Item = Pixel<Self::Color>>,
        {
            for Pixel(Point { x, y }, color) in pixels {
                if x < 0 || y < 0 {
                    continue;
                }
                self.set_pixel(x as u32, y as u32, color.is_on());
            }
            Ok(())
        }

        fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
            let byte = if color.is_on() { 0xFF } else { 0x00 };
            self.data.fill(byte);
            Ok(())
        }
    }

    impl OriginDimensions for ImageBuffer {
        fn size(&self) -> Size {
            Size::new(self.dimensions.cols as u32, self.dimensions.rows as u32)
        }
    }
}
