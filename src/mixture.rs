// src/mixture.rs
//
// Per-pixel adaptive Gaussian mixture with regularized learning rate,
// after Lin, Chuang and Liu, "Regularized Background Adaptation: A Novel
// Learning Rate Control Scheme for Gaussian Mixture Modeling".

use crate::gaussian::Gaussian;
use crate::types::{ModelConfig, Opportunity};

/// Variance floor; keeps components from collapsing onto a single intensity.
const MIN_VARIANCE: f64 = 1.0;

/// Steady-state learning rate the baseline restoration law relaxes toward.
const ETA_BASELINE: f64 = 0.025;

/// Frozen per-mixture coefficients. Copied into every mixture at
/// construction; nothing global is consulted afterwards.
#[derive(Debug, Clone, Copy)]
pub struct MixtureParams {
    pub gaussians: usize,
    pub alpha: f64,
    pub beta_b: f64,
    pub beta_d: f64,
    pub beta_s: f64,
    pub beta_m: f64,
    pub weight_threshold: f64,
    pub initial_variance: f64,
}

impl From<&ModelConfig> for MixtureParams {
    fn from(m: &ModelConfig) -> Self {
        Self {
            gaussians: m.gaussians,
            alpha: m.alpha,
            beta_b: m.beta_b,
            beta_d: m.beta_d,
            beta_s: m.beta_s,
            beta_m: m.beta_m,
            weight_threshold: m.weight_threshold,
            initial_variance: m.initial_variance,
        }
    }
}

impl Default for MixtureParams {
    fn default() -> Self {
        (&ModelConfig::default()).into()
    }
}

/// The luminance model of a single pixel: N Gaussians plus the learning
/// rate eta. All operations are O(N) and mutate only this mixture.
#[derive(Debug, Clone)]
pub struct Mixture {
    params: MixtureParams,
    gaussians: Vec<Gaussian>,
    eta: f64,
    trace: Option<Vec<f64>>,
}

impl Mixture {
    pub fn new(params: MixtureParams, intensity: f64, track_eta: bool) -> Self {
        let mut mixture = Self {
            params,
            gaussians: Vec::with_capacity(params.gaussians),
            eta: params.beta_d,
            trace: if track_eta { Some(Vec::new()) } else { None },
        };
        mixture.initialize(intensity);
        mixture
    }

    /// Populate all components from a single observed intensity and reset
    /// eta to its detection-gain starting value.
    pub fn initialize(&mut self, intensity: f64) {
        let n = self.params.gaussians;
        self.gaussians.clear();
        self.gaussians.resize(
            n,
            Gaussian::new(intensity, self.params.initial_variance, 1.0 / n as f64),
        );
        self.eta = self.params.beta_d;
        if let Some(trace) = &mut self.trace {
            trace.push(self.eta);
        }
    }

    /// Advance the mixture one time step with a new intensity sample.
    pub fn update(&mut self, intensity: f64) {
        // Model matching: among components whose 2.5-sigma window contains
        // the sample (inclusive), the heaviest wins; smallest index breaks
        // ties.
        let mut matched: Option<usize> = None;
        let mut best_distance = f64::INFINITY;
        for (n, g) in self.gaussians.iter().enumerate() {
            if (intensity - g.mean).abs() <= 2.5 * g.variance.sqrt() {
                let distance = -g.weight;
                if distance < best_distance {
                    best_distance = distance;
                    matched = Some(n);
                }
            }
        }

        // Weight renewal
        for (n, g) in self.gaussians.iter_mut().enumerate() {
            let m = if matched == Some(n) { 1.0 } else { 0.0 };
            g.weight = (1.0 - self.eta) * g.weight + self.eta * m;
        }

        match matched {
            Some(l) => {
                let g = &mut self.gaussians[l];
                let mut rho = self.params.alpha * g.density(intensity);
                if !rho.is_finite() {
                    rho = 0.0;
                }
                g.mean = (1.0 - rho) * g.mean + rho * intensity;
                // Variance update uses the freshly moved mean.
                let diff = intensity - g.mean;
                let variance = (1.0 - rho) * g.variance + rho * diff * diff;
                g.variance = if variance.is_finite() {
                    variance.max(MIN_VARIANCE)
                } else {
                    MIN_VARIANCE
                };
            }
            None => {
                // No component explains the sample: overwrite the lightest
                // one. No Gaussian is ever destroyed.
                let mut k = 0;
                for (n, g) in self.gaussians.iter().enumerate().skip(1) {
                    if g.weight < self.gaussians[k].weight {
                        k = n;
                    }
                }
                self.gaussians[k] = Gaussian::new(
                    intensity,
                    self.params.initial_variance,
                    1.0 / self.params.gaussians as f64,
                );
            }
        }

        // Renormalize
        let sum: f64 = self.gaussians.iter().map(|g| g.weight).sum();
        if !(sum > 0.0) || !sum.is_finite() {
            // Degenerate mixture: restart from what the camera shows now.
            self.initialize(intensity);
            return;
        }
        for g in &mut self.gaussians {
            g.weight /= sum;
        }
    }

    /// Foreground decision: the pixel is foreground when even the dominant
    /// component carries little weight.
    pub fn is_foreground(&self) -> bool {
        self.gaussians[self.dominant()].weight < self.params.weight_threshold
    }

    /// Update eta from the pixel's classification outcome.
    pub fn regulate_eta(&mut self, opportunity: Opportunity, intensity: f64) {
        match opportunity {
            Opportunity::Background => {
                self.eta = (1.0 - self.params.beta_b) * self.eta + self.params.beta_b * ETA_BASELINE;
            }
            Opportunity::Shadow => {
                let b = self.dominant();
                let mut eta = self.params.beta_d * self.gaussians[b].density(intensity);
                if eta > self.params.beta_b {
                    eta = self.params.beta_b;
                }
                if eta < self.params.beta_s {
                    eta = self.params.beta_s;
                }
                self.eta = eta;
            }
            Opportunity::StationaryForeground => self.eta = self.params.beta_s,
            Opportunity::MovingForeground => self.eta = self.params.beta_m,
        }

        let ceiling = self.params.beta_b.max(ETA_BASELINE);
        self.eta = self.eta.clamp(self.params.beta_m, ceiling);
        if let Some(trace) = &mut self.trace {
            trace.push(self.eta);
        }
    }

    /// Weighted mean of the model, the expected background luminance at
    /// this pixel.
    pub fn background_estimate(&self) -> f64 {
        self.gaussians.iter().map(|g| g.mean * g.weight).sum()
    }

    fn dominant(&self) -> usize {
        let mut b = 0;
        for (n, g) in self.gaussians.iter().enumerate() {
            if g.weight > self.gaussians[b].weight {
                b = n;
            }
        }
        b
    }

    // ========================================================================
    // Accessors (observability)
    // ========================================================================

    pub fn eta(&self) -> f64 {
        self.eta
    }

    pub fn eta_trace(&self) -> &[f64] {
        self.trace.as_deref().unwrap_or(&[])
    }

    pub fn gaussians(&self) -> &[Gaussian] {
        &self.gaussians
    }

    pub fn means(&self) -> Vec<f64> {
        self.gaussians.iter().map(|g| g.mean).collect()
    }

    pub fn variances(&self) -> Vec<f64> {
        self.gaussians.iter().map(|g| g.variance).collect()
    }

    pub fn weights(&self) -> Vec<f64> {
        self.gaussians.iter().map(|g| g.weight).collect()
    }
}
