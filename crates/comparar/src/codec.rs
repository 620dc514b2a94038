//! PNG decoding and encoding for captures and diff artifacts.

use crate::result::{CompararError, CompararResult};
use image::{ExtendedColorType, ImageEncoder};

/// A decoded raster image: RGBA, 4 bytes per pixel, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// RGBA pixel data
    pub pixels: Vec<u8>,
}

impl Capture {
    /// Create a transparent image of the given size
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; buffer_len(width, height)],
        }
    }

    /// Create an image filled with a single color
    #[must_use]
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = rgba
            .iter()
            .copied()
            .cycle()
            .take(buffer_len(width, height))
            .collect();
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Wrap an existing RGBA buffer
    ///
    /// # Errors
    ///
    /// Returns error if the buffer length is not `4 * width * height`
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> CompararResult<Self> {
        let expected = buffer_len(width, height);
        if pixels.len() != expected {
            return Err(CompararError::codec(format!(
                "RGBA buffer for {width}x{height} must be {expected} bytes, got {}",
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Number of pixels
    #[must_use]
    pub const fn total_pixels(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Whether the pixel buffer matches the declared dimensions
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.pixels.len() == buffer_len(self.width, self.height)
    }

    /// Get pixel at position
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = self.offset(x, y);
        self.pixels
            .get(idx..idx + 4)
            .map(|p| [p[0], p[1], p[2], p[3]])
    }

    /// Set pixel at position; out-of-bounds writes are ignored
    pub fn set_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        if x < self.width && y < self.height {
            let idx = self.offset(x, y);
            self.pixels[idx..idx + 4].copy_from_slice(&rgba);
        }
    }

    /// Fill a rectangle, clipped to the image bounds
    pub fn fill_rect(&mut self, x: u32, y: u32, width: u32, height: u32, rgba: [u8; 4]) {
        for py in y..y.saturating_add(height).min(self.height) {
            for px in x..x.saturating_add(width).min(self.width) {
                self.set_pixel(px, py, rgba);
            }
        }
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * 4
    }
}

fn buffer_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * 4
}

/// Decode image bytes (PNG, or any other enabled format) into an RGBA capture
///
/// # Errors
///
/// Returns error if the bytes are not a decodable image
pub fn decode_png(bytes: &[u8]) -> CompararResult<Capture> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| CompararError::codec(format!("Failed to decode image: {e}")))?;
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(Capture {
        width,
        height,
        pixels: rgba.into_raw(),
    })
}

/// Encode a capture as PNG
///
/// # Errors
///
/// Returns error if the capture is malformed or encoding fails
pub fn encode_png(capture: &Capture) -> CompararResult<Vec<u8>> {
    if !capture.is_well_formed() {
        return Err(CompararError::codec(format!(
            "Refusing to encode {}x{} image with {} bytes",
            capture.width,
            capture.height,
            capture.pixels.len()
        )));
    }
    let mut buffer = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut buffer);
    encoder
        .write_image(
            &capture.pixels,
            capture.width,
            capture.height,
            ExtendedColorType::Rgba8,
        )
        .map_err(|e| CompararError::codec(format!("Failed to encode PNG: {e}")))?;
    Ok(buffer)
}
