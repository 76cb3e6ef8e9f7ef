// src/shadow.rs
//
// Cast-shadow detection against the mixture model's expected background.
// A shadow dims the surface it falls on without changing its texture, so
// candidate regions come from robust frame differencing and the verdict
// comes from the per-region illumination gain.

use crate::preprocessing;
use crate::types::ShadowConfig;
use anyhow::Result;

pub struct ShadowDetector {
    config: ShadowConfig,
}

impl ShadowDetector {
    pub fn new(config: ShadowConfig) -> Self {
        Self { config }
    }

    /// Produce the binary shadow mask for one frame.
    ///
    /// `gray` is the preprocessed luminance frame; `reference` is the
    /// per-pixel weighted mean of each mixture, both row-major.
    pub fn detect(&self, gray: &[u8], reference: &[f64], rows: usize) -> Result<Vec<u8>> {
        let diff: Vec<f64> = gray
            .iter()
            .zip(reference)
            .map(|(&g, &r)| (g as f64 - r).abs())
            .collect();

        // Robust threshold: median plus three scaled MADs.
        let m = median(&diff);
        let deviations: Vec<f64> = diff.iter().map(|d| (d - m).abs()).collect();
        let mad = median(&deviations);
        let threshold = m + 3.0 * 1.4826 * mad;

        let mut mask: Vec<u8> = diff
            .iter()
            .map(|&d| if d > threshold { 255 } else { 0 })
            .collect();

        self.drop_small_components(&mut mask, rows)?;

        // Two-level hysteresis, both masks formed fresh from the
        // difference image: strong evidence dilated into weak evidence.
        if self.config.hysteresis {
            let low: Vec<u8> = diff
                .iter()
                .map(|&d| if d > threshold / 2.0 { 255 } else { 0 })
                .collect();
            let high: Vec<u8> = diff
                .iter()
                .map(|&d| if d > threshold { 255 } else { 0 })
                .collect();
            let grown = preprocessing::dilate(&high, rows, 3)?;
            for ((out, &g), &l) in mask.iter_mut().zip(&grown).zip(&low) {
                *out = if g == 255 && l == 255 { 255 } else { 0 };
            }
        }

        // Gain test: a region is shadow when it is uniformly darker than
        // the model, but not dark enough to be an object in its own right.
        let (labels, count) = preprocessing::connected_components(&mask, rows)?;
        if count <= 1 {
            return Ok(vec![0; gray.len()]);
        }

        let mut gain_sum = vec![0.0_f64; count];
        let mut area = vec![0_usize; count];
        for (i, &label) in labels.iter().enumerate() {
            let label = label as usize;
            if label == 0 {
                continue;
            }
            gain_sum[label] += gray[i] as f64 / reference[i].max(1.0);
            area[label] += 1;
        }

        let mut is_shadow = vec![false; count];
        for label in 1..count {
            if area[label] == 0 {
                continue;
            }
            let mean_gain = gain_sum[label] / area[label] as f64;
            is_shadow[label] = mean_gain >= self.config.gain_low && mean_gain < self.config.gain_high;
        }

        Ok(labels
            .iter()
            .map(|&l| if is_shadow[l as usize] { 255 } else { 0 })
            .collect())
    }

    fn drop_small_components(&self, mask: &mut [u8], rows: usize) -> Result<()> {
        if mask.iter().all(|&v| v == 0) {
            return Ok(());
        }
        let (labels, count) = preprocessing::connected_components(mask, rows)?;
        let mut area = vec![0_usize; count];
        for &l in &labels {
            area[l as usize] += 1;
        }
        for (v, &l) in mask.iter_mut().zip(&labels) {
            if l > 0 && area[l as usize] < self.config.min_region_area {
                *v = 0;
            }
        }
        Ok(())
    }
}

/// Upper median by partial selection.
fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut scratch = values.to_vec();
    let mid = scratch.len() / 2;
    let (_, m, _) = scratch.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
    *m
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROWS: usize = 16;
    const COLS: usize = 16;

    fn detector() -> ShadowDetector {
        ShadowDetector::new(ShadowConfig::default())
    }

    /// Frame matching the reference except for a square patch scaled by
    /// `gain` over rows/cols 4..8.
    fn patched_frame(base: f64, gain: f64) -> (Vec<u8>, Vec<f64>) {
        let reference = vec![base; ROWS * COLS];
        let mut gray = vec![base as u8; ROWS * COLS];
        for r in 4..8 {
            for c in 4..8 {
                gray[r * COLS + c] = (base * gain) as u8;
            }
        }
        (gray, reference)
    }

    #[test]
    fn test_median_selection() {
        assert_eq!(median(&[5.0, 1.0, 3.0]), 3.0);
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 3.0);
        assert_eq!(median(&[]), 0.0);
    }

    #[test]
    fn test_matching_frame_yields_empty_mask() {
        let reference = vec![180.0; ROWS * COLS];
        let gray = vec![180_u8; ROWS * COLS];
        let mask = detector().detect(&gray, &reference, ROWS).unwrap();
        assert!(mask.iter().all(|&v| v == 0));
    }

    #[test]
    fn test_dimmed_region_is_shadow() {
        let (gray, reference) = patched_frame(180.0, 0.7);
        let mask = detector().detect(&gray, &reference, ROWS).unwrap();
        for r in 4..8 {
            for c in 4..8 {
                assert_eq!(mask[r * COLS + c], 255, "pixel ({}, {})", r, c);
            }
        }
        assert_eq!(mask.iter().filter(|&&v| v == 255).count(), 16);
    }

    #[test]
    fn test_dark_object_is_not_shadow() {
        let (gray, reference) = patched_frame(180.0, 0.1);
        let mask = detector().detect(&gray, &reference, ROWS).unwrap();
        assert!(mask.iter().all(|&v| v == 0));
    }

    #[test]
    fn test_brightened_region_is_not_shadow() {
        let (gray, reference) = patched_frame(180.0, 1.3);
        let mask = detector().detect(&gray, &reference, ROWS).unwrap();
        assert!(mask.iter().all(|&v| v == 0));
    }

    #[test]
    fn test_single_pixel_speck_is_dropped() {
        let mut config = ShadowConfig::default();
        config.hysteresis = false;
        let reference = vec![180.0; ROWS * COLS];
        let mut gray = vec![180_u8; ROWS * COLS];
        gray[5 * COLS + 5] = 126;
        let mask = ShadowDetector::new(config)
            .detect(&gray, &reference, ROWS)
            .unwrap();
        assert!(mask.iter().all(|&v| v == 0));
    }

    #[test]
    fn test_area_filter_does_not_starve_hysteresis() {
        // A lone speck below the area floor plus a real shadow region,
        // both dimmed by the same 0.7 gain.
        let reference = vec![180.0; ROWS * COLS];
        let mut gray = vec![180_u8; ROWS * COLS];
        for r in 4..8 {
            for c in 4..8 {
                gray[r * COLS + c] = 126;
            }
        }
        gray[12 * COLS + 12] = 126;

        // Hysteresis re-forms its masks from the difference image, so the
        // speck seeds the dilation even after the area filter drops it.
        let mask = detector().detect(&gray, &reference, ROWS).unwrap();
        assert_eq!(mask[12 * COLS + 12], 255);
        for r in 4..8 {
            for c in 4..8 {
                assert_eq!(mask[r * COLS + c], 255, "pixel ({}, {})", r, c);
            }
        }

        // Without the refinement the area floor is what culls the speck.
        let mut config = ShadowConfig::default();
        config.hysteresis = false;
        let plain = ShadowDetector::new(config)
            .detect(&gray, &reference, ROWS)
            .unwrap();
        assert_eq!(plain[12 * COLS + 12], 0);
        assert_eq!(plain[5 * COLS + 5], 255);
    }
}
