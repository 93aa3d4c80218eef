mod engine;
mod engines;
mod postprocess;
mod result;

pub use engine::InferenceEngine;
pub use engines::StubEngine;
pub use postprocess::PostProcessor;
pub use result::{BoundingBox, Detection};
