// src/gaussian.rs

use serde::{Deserialize, Serialize};

/// One component of a pixel's luminance mixture.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Gaussian {
    pub mean: f64,
    pub variance: f64,
    pub weight: f64,
}

impl Gaussian {
    pub fn new(mean: f64, variance: f64, weight: f64) -> Self {
        Self {
            mean,
            variance,
            weight,
        }
    }

    /// Gaussian probability density of `intensity` under this component.
    ///
    /// Underflows to 0 far from the mean; any non-finite intermediate also
    /// collapses to 0 so callers can treat the result as a dead match.
    pub fn density(&self, intensity: f64) -> f64 {
        if self.variance <= 0.0 {
            return 0.0;
        }
        let diff = intensity - self.mean;
        let p = (1.0 / (2.0 * std::f64::consts::PI * self.variance).sqrt())
            * (-(diff * diff) / (2.0 * self.variance)).exp();
        if p.is_finite() {
            p
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_density_peaks_at_mean() {
        let g = Gaussian::new(128.0, 100.0, 1.0);
        let peak = g.density(128.0);
        // 1 / sqrt(2 * pi * 100)
        assert!((peak - 0.039894228).abs() < 1e-9);
        assert!(g.density(120.0) < peak);
        assert!(g.density(136.0) < peak);
    }

    #[test]
    fn test_density_is_symmetric() {
        let g = Gaussian::new(100.0, 25.0, 0.5);
        assert!((g.density(90.0) - g.density(110.0)).abs() < 1e-15);
    }

    #[test]
    fn test_density_underflows_to_zero() {
        let g = Gaussian::new(0.0, 1.0, 1.0);
        assert_eq!(g.density(10_000.0), 0.0);
    }

    #[test]
    fn test_degenerate_variance_yields_zero() {
        let g = Gaussian::new(0.0, 0.0, 1.0);
        assert_eq!(g.density(0.0), 0.0);
    }
}
