// src/pipeline/orchestrator.rs
//
// Per-frame driver of the background model. Owns one mixture per pixel,
// the scratch masks, and the worker pool; steps within a frame run in
// the fixed order maintenance -> foreground -> shadow -> extraction ->
// regulation, with a barrier between steps.

use crate::gaussian::Gaussian;
use crate::mixture::{Mixture, MixtureParams};
use crate::pipeline::metrics::PipelineMetrics;
use crate::preprocessing;
use crate::shadow::ShadowDetector;
use crate::types::{Config, Frame, FrameMasks, Opportunity};
use anyhow::{Context, Result};
use rayon::prelude::*;
use std::time::Instant;

pub struct SegmentationPipeline {
    rows: usize,
    cols: usize,
    fps: f64,
    blur_size: i32,
    open_kernel: i32,
    shadow_enabled: bool,
    mixtures: Vec<Mixture>,
    shadow: ShadowDetector,
    pool: rayon::ThreadPool,
    object_mask: Vec<u8>,
    shadow_mask: Vec<u8>,
    final_mask: Vec<u8>,
    reference: Vec<f64>,
    metrics: PipelineMetrics,
}

impl SegmentationPipeline {
    /// Build the pipeline and seed every pixel's mixture from the first
    /// frame of the stream.
    pub fn new(config: &Config, first_frame: &Frame, fps: f64) -> Result<Self> {
        config.validate()?;

        let rows = first_frame.height;
        let cols = first_frame.width;
        let pixels = rows * cols;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.runtime.workers)
            .build()
            .context("failed to build worker pool")?;

        let gray = preprocessing::gray_blurred(first_frame, config.model.blur_size)?;
        let params = MixtureParams::from(&config.model);
        let track_eta = config.debug.eta_trace;
        let mixtures: Vec<Mixture> = pool.install(|| {
            gray.par_iter()
                .map(|&intensity| Mixture::new(params, intensity as f64, track_eta))
                .collect()
        });

        Ok(Self {
            rows,
            cols,
            fps,
            blur_size: config.model.blur_size,
            open_kernel: config.model.open_kernel,
            shadow_enabled: config.shadow.enabled,
            mixtures,
            shadow: ShadowDetector::new(config.shadow.clone()),
            pool,
            object_mask: vec![0; pixels],
            shadow_mask: vec![0; pixels],
            final_mask: vec![0; pixels],
            reference: vec![0.0; pixels],
            metrics: PipelineMetrics::new(),
        })
    }

    /// Run one frame through the full classification cycle.
    pub fn process_frame(&mut self, frame: &Frame) -> Result<FrameMasks> {
        if frame.width != self.cols || frame.height != self.rows {
            anyhow::bail!(
                "frame geometry changed mid-stream: got {}x{}, model is {}x{}",
                frame.width,
                frame.height,
                self.cols,
                self.rows
            );
        }

        let gray = preprocessing::gray_blurred(frame, self.blur_size)?;
        let cols = self.cols;

        // Background maintenance: one worker per row band, no mixture is
        // touched by more than one worker.
        let started = Instant::now();
        self.pool.install(|| {
            self.mixtures
                .par_chunks_mut(cols)
                .zip(gray.par_chunks(cols))
                .for_each(|(mixtures, intensities)| {
                    for (mixture, &intensity) in mixtures.iter_mut().zip(intensities) {
                        mixture.update(intensity as f64);
                    }
                });
        });
        self.metrics.set_timing(
            &self.metrics.maintenance_time_us,
            started.elapsed().as_micros() as u64,
        );

        // Foreground identification
        self.pool.install(|| {
            self.object_mask
                .par_chunks_mut(cols)
                .zip(self.mixtures.par_chunks(cols))
                .for_each(|(row, mixtures)| {
                    for (px, mixture) in row.iter_mut().zip(mixtures) {
                        *px = if mixture.is_foreground() { 255 } else { 0 };
                    }
                });
        });

        // Shadow detection
        let started = Instant::now();
        if self.shadow_enabled {
            self.pool.install(|| {
                self.reference
                    .par_chunks_mut(cols)
                    .zip(self.mixtures.par_chunks(cols))
                    .for_each(|(row, mixtures)| {
                        for (px, mixture) in row.iter_mut().zip(mixtures) {
                            *px = mixture.background_estimate();
                        }
                    });
            });
            self.shadow_mask = self.shadow.detect(&gray, &self.reference, self.rows)?;
        } else {
            self.shadow_mask.iter_mut().for_each(|px| *px = 0);
        }
        self.metrics.set_timing(
            &self.metrics.shadow_time_us,
            started.elapsed().as_micros() as u64,
        );

        // Object extraction: objects minus shadows, opened and relabeled.
        let started = Instant::now();
        for ((out, &object), &shadow) in self
            .final_mask
            .iter_mut()
            .zip(&self.object_mask)
            .zip(&self.shadow_mask)
        {
            *out = if object == 255 && shadow != 255 { 255 } else { 0 };
        }
        self.extract_objects()?;
        self.metrics.set_timing(
            &self.metrics.extraction_time_us,
            started.elapsed().as_micros() as u64,
        );

        // Learning-rate regulation from this frame's classification. Reads
        // the raw object mask, not the cleaned-up final mask.
        let started = Instant::now();
        self.pool.install(|| {
            self.mixtures
                .par_chunks_mut(cols)
                .zip(self.object_mask.par_chunks(cols))
                .zip(self.shadow_mask.par_chunks(cols))
                .zip(gray.par_chunks(cols))
                .for_each(|(((mixtures, object), shadow), intensities)| {
                    for (i, mixture) in mixtures.iter_mut().enumerate() {
                        let opportunity = Opportunity::from_masks(object[i], shadow[i]);
                        mixture.regulate_eta(opportunity, intensities[i] as f64);
                    }
                });
        });
        self.metrics.set_timing(
            &self.metrics.regulation_time_us,
            started.elapsed().as_micros() as u64,
        );

        self.metrics.add(&self.metrics.total_frames, 1);
        let foreground = self.object_mask.iter().filter(|&&px| px == 255).count();
        let shadowed = self.shadow_mask.iter().filter(|&&px| px == 255).count();
        self.metrics
            .add(&self.metrics.foreground_pixels, foreground as u64);
        self.metrics.add(&self.metrics.shadow_pixels, shadowed as u64);

        Ok(FrameMasks {
            object: self.object_mask.clone(),
            shadow: self.shadow_mask.clone(),
            final_mask: self.final_mask.clone(),
        })
    }

    /// Morphological opening followed by connected-component relabeling;
    /// every surviving component is kept at full intensity.
    fn extract_objects(&mut self) -> Result<()> {
        let opened =
            preprocessing::morphological_open(&self.final_mask, self.rows, self.open_kernel)?;
        let (labels, _) = preprocessing::connected_components(&opened, self.rows)?;
        for (out, &label) in self.final_mask.iter_mut().zip(&labels) {
            *out = if label > 0 { 255 } else { 0 };
        }
        Ok(())
    }

    // ========================================================================
    // Accessors (observability)
    // ========================================================================

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    pub fn pixel_eta(&self, row: usize, col: usize) -> f64 {
        self.mixtures[row * self.cols + col].eta()
    }

    pub fn pixel_etas(&self, row: usize, col: usize) -> &[f64] {
        self.mixtures[row * self.cols + col].eta_trace()
    }

    pub fn pixel_gaussians(&self, row: usize, col: usize) -> &[Gaussian] {
        self.mixtures[row * self.cols + col].gaussians()
    }
}
