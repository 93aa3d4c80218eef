use std::path::Path;

use anyhow::Result;

use crate::detect::result::Detection;

/// Inference engine trait.
///
/// The neural-network forward pass is an external capability; this crate only
/// schedules calls into it. Implementations:
/// - May be invoked concurrently, up to the pipeline's admission bound.
/// - Must treat the pixel slice as read-only and ephemeral; it must not be
///   retained beyond the call.
/// - Return detections in normalized coordinates, unfiltered; confidence
///   thresholding and NMS happen downstream in the post-processor.
pub trait InferenceEngine: Send + Sync {
    /// Engine identifier.
    fn name(&self) -> &'static str;

    /// Returns true when a model is loaded and inference can be served.
    fn is_available(&self) -> bool;

    /// Load a model from a file path.
    fn load_model(&self, path: &Path) -> Result<()>;

    /// Run detection on one frame.
    fn infer(&self, pixels: &[u8], width: u32, height: u32) -> Result<Vec<Detection>>;
}
