// src/types.rs

use serde::{Deserialize, Serialize};

// ============================================================================
// Opportunity signal (per-pixel classification outcome, drives eta)
// ============================================================================

/// Outcome of the previous frame's classification for one pixel. The
/// learning-rate controller dispatches on this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Opportunity {
    /// Pixel was background.
    Background,
    /// Pixel was inside a detected object and flagged as cast shadow.
    Shadow,
    /// Reserved for stationary-foreground handling.
    StationaryForeground,
    /// Pixel was genuine moving foreground.
    MovingForeground,
}

impl Opportunity {
    /// Derive the opportunity from the object and shadow mask values at a
    /// pixel. Masks hold only 0 or 255.
    pub fn from_masks(object: u8, shadow: u8) -> Self {
        if object == 0 {
            Opportunity::Background
        } else if shadow == 255 {
            Opportunity::Shadow
        } else {
            Opportunity::MovingForeground
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Opportunity::Background => "BACKGROUND",
            Opportunity::Shadow => "SHADOW",
            Opportunity::StationaryForeground => "STATIONARY_FOREGROUND",
            Opportunity::MovingForeground => "MOVING_FOREGROUND",
        }
    }
}

impl std::fmt::Display for Opportunity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Frame types
// ============================================================================

/// One decoded video frame, 8-bit BGR, row-major.
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: usize,
    pub height: usize,
    pub frame_id: u64,
    pub timestamp_ms: f64,
}

/// The three binary masks produced for a frame. Values are 0 or 255.
#[derive(Debug, Clone)]
pub struct FrameMasks {
    /// Raw per-pixel foreground decision, before shadow removal and cleanup.
    pub object: Vec<u8>,
    /// Pixels classified as cast shadow.
    pub shadow: Vec<u8>,
    /// Object mask minus shadows, after morphological cleanup.
    pub final_mask: Vec<u8>,
}

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Number of Gaussian components per pixel (default: 100)
    pub gaussians: usize,
    /// Parameter adaptation rate alpha (default: 0.025)
    pub alpha: f64,
    /// Baseline regulation gain beta_b (default: 0.01)
    pub beta_b: f64,
    /// Shadow detection gain beta_d (default: 1/100)
    pub beta_d: f64,
    /// Stationary-foreground learning floor beta_s (default: 1/900)
    pub beta_s: f64,
    /// Moving-foreground learning floor beta_m (default: 1/6000)
    pub beta_m: f64,
    /// Foreground decision threshold on the dominant weight (default: 0.24)
    pub weight_threshold: f64,
    /// Variance assigned to fresh components (default: 100)
    pub initial_variance: f64,
    /// Gaussian blur kernel size applied during preprocessing (default: 3)
    pub blur_size: i32,
    /// Side of the rectangular opening element in object extraction (default: 4)
    pub open_kernel: i32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            gaussians: 100,
            alpha: 0.025,
            beta_b: 0.01,
            beta_d: 1.0 / 100.0,
            beta_s: 1.0 / 900.0,
            beta_m: 1.0 / 6000.0,
            weight_threshold: 0.24,
            initial_variance: 100.0,
            blur_size: 3,
            open_kernel: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowConfig {
    /// Run the shadow detector at all (default: true)
    pub enabled: bool,
    /// Connected components smaller than this are dropped (default: 2)
    pub min_region_area: usize,
    /// Regions with mean gain below this are objects, not shadow (default: 0.5)
    pub gain_low: f64,
    /// Regions with mean gain at or above this are not darkened (default: 1.0)
    pub gain_high: f64,
    /// Refine the difference mask with two-level hysteresis (default: true)
    pub hysteresis: bool,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_region_area: 2,
            gain_low: 0.5,
            gain_high: 1.0,
            hysteresis: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Worker threads for the per-pixel parallel steps (default: 4)
    pub workers: usize,
    /// Emit a progress log every N frames (default: 100)
    pub progress_every: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            progress_every: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// Directory scanned (recursively) for input videos
    pub input_dir: String,
    /// Directory for mask videos and run summaries
    pub output_dir: String,
    /// Write object/shadow/final mask videos (default: false)
    pub save_masks: bool,
    /// Write the segmented result video, frame AND final mask (default: true)
    pub save_result: bool,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            input_dir: "videos".to_string(),
            output_dir: "output".to_string(),
            save_masks: false,
            save_result: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    /// Record the eta trajectory of every mixture (memory-heavy; default: false)
    pub eta_trace: bool,
    /// Pixel (row, col) whose eta trace and Gaussians are dumped after each video
    pub probe_pixel: Option<(usize, usize)>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub shadow: ShadowConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub video: VideoConfig,
    #[serde(default)]
    pub debug: DebugConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opportunity_from_masks() {
        assert_eq!(Opportunity::from_masks(0, 0), Opportunity::Background);
        assert_eq!(Opportunity::from_masks(0, 255), Opportunity::Background);
        assert_eq!(Opportunity::from_masks(255, 255), Opportunity::Shadow);
        assert_eq!(
            Opportunity::from_masks(255, 0),
            Opportunity::MovingForeground
        );
    }

    #[test]
    fn test_default_rate_ordering() {
        let m = ModelConfig::default();
        assert!(m.beta_m < m.beta_s);
        assert!(m.beta_s <= m.beta_d);
        assert!(m.beta_d <= m.beta_b);
    }
}
