// src/lib.rs
//
// Regularized adaptive Gaussian mixture background subtraction. The
// per-pixel model lives in `mixture`, the frame-level driver in
// `pipeline`, and shadow removal in `shadow`; `video` adapts opencv
// capture and encoding to the pipeline's frame types.

mod config;
pub mod gaussian;
pub mod mixture;
pub mod pipeline;
pub mod preprocessing;
pub mod shadow;
pub mod types;
pub mod video;

pub use pipeline::SegmentationPipeline;
pub use types::{Config, Frame, FrameMasks, Opportunity};
