//! Frame container.
//!
//! Decoding and rendering live outside this crate; a `Frame` is just the
//! pixel payload a playback collaborator hands to `submit_frame`. The payload
//! is reference-counted so a fire-and-forget submission can move into an
//! inference worker without copying the pixels.
//!
//! The inference engine receives the pixels as a borrowed slice and must not
//! retain them beyond the call.

use std::sync::Arc;

/// One video frame as handed to the pipeline.
#[derive(Clone)]
pub struct Frame {
    data: Arc<Vec<u8>>,
    pub width: u32,
    pub height: u32,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data: Arc::new(data),
            width,
            height,
        }
    }

    /// Borrow the pixel data for the duration of an inference call.
    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    /// Generate a synthetic RGB frame for tests and the demo binary.
    ///
    /// Fills the buffer with a cheap position/seed pattern; `seed` varies the
    /// content so consecutive frames differ.
    pub fn synthetic(width: u32, height: u32, seed: u64) -> Self {
        let pixel_count = (width * height * 3) as usize;
        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64).wrapping_add(seed) % 256) as u8;
        }
        Self::new(pixels, width, height)
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Pixel contents are deliberately omitted.
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}
