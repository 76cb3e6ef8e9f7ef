use agmm_bgsub::gaussian::Gaussian;
use agmm_bgsub::{types, video, SegmentationPipeline};
use anyhow::Result;
use std::path::Path;
use tracing::{error, info, warn};

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter("agmm_bgsub=info")
        .init();

    info!("🎥 AGMM Background Subtraction Starting");

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.yaml".to_string());
    let config = types::Config::load(&config_path)?;
    info!("✓ Configuration loaded from {}", config_path);

    // Find all video files
    let video_processor = video::VideoProcessor::new(config.clone());
    let video_files = video_processor.find_video_files()?;

    if video_files.is_empty() {
        error!("No video files found in {}", config.video.input_dir);
        return Ok(());
    }

    // Process each video
    for (idx, video_path) in video_files.iter().enumerate() {
        info!("\n========================================");
        info!(
            "Processing video {}/{}: {}",
            idx + 1,
            video_files.len(),
            video_path.display()
        );
        info!("========================================\n");

        match process_video(video_path, &video_processor, &config) {
            Ok(stats) => {
                info!("\n✓ Video processed successfully!");
                info!("  Total frames: {}", stats.total_frames);
                info!("  Foreground pixels: {}", stats.foreground_pixels);
                info!("  Shadow pixels: {}", stats.shadow_pixels);
                info!("  Processing time: {:.2}s", stats.duration_secs);
                info!("  Average FPS: {:.2}", stats.avg_fps);
            }
            Err(e) => {
                error!("Failed to process video: {}", e);
            }
        }
    }

    info!("\n🎉 All videos processed!");
    Ok(())
}

struct ProcessingStats {
    total_frames: u64,
    foreground_pixels: u64,
    shadow_pixels: u64,
    duration_secs: f64,
    avg_fps: f64,
}

fn process_video(
    video_path: &Path,
    video_processor: &video::VideoProcessor,
    config: &types::Config,
) -> Result<ProcessingStats> {
    use std::time::Instant;

    let start_time = Instant::now();

    // Open video
    let mut reader = video_processor.open_video(video_path)?;

    // The first frame only seeds the model; classification starts on the
    // second.
    let first_frame = match reader.read_frame()? {
        Some(frame) => frame,
        None => anyhow::bail!("video {} has no frames", video_path.display()),
    };
    let mut segmentation = SegmentationPipeline::new(config, &first_frame, reader.fps)?;
    info!(
        "✓ Model initialized: {}x{} pixels, {} Gaussians each",
        segmentation.cols(),
        segmentation.rows(),
        config.model.gaussians
    );

    let mut writers =
        video_processor.create_writers(video_path, reader.width, reader.height, reader.fps)?;

    // Process frames
    let mut frame_count = 0_u64;
    while let Some(frame) = reader.read_frame()? {
        frame_count += 1;

        if frame_count % config.runtime.progress_every == 0 {
            info!(
                "Progress: {:.1}% ({}/{}) | pipeline {:.1} fps",
                reader.progress(),
                reader.current_frame,
                reader.total_frames,
                segmentation.metrics().fps()
            );
        }

        match segmentation.process_frame(&frame) {
            Ok(masks) => {
                writers.write(&frame, &masks)?;
            }
            Err(e) => {
                error!("Frame {} processing failed: {}", frame_count, e);
            }
        }
    }

    let duration = start_time.elapsed();
    let avg_fps = frame_count as f64 / duration.as_secs_f64().max(1e-6);

    save_summary(video_path, &segmentation, config)?;
    if let Some((row, col)) = config.debug.probe_pixel {
        save_probe_dump(video_path, &segmentation, row, col, config)?;
    }

    let summary = segmentation.metrics().summary();
    Ok(ProcessingStats {
        total_frames: summary.total_frames,
        foreground_pixels: summary.foreground_pixels,
        shadow_pixels: summary.shadow_pixels,
        duration_secs: duration.as_secs_f64(),
        avg_fps,
    })
}

fn save_summary(
    video_path: &Path,
    segmentation: &SegmentationPipeline,
    config: &types::Config,
) -> Result<()> {
    std::fs::create_dir_all(&config.video.output_dir)?;
    let stem = video_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("video");
    let out = Path::new(&config.video.output_dir).join(format!("{}_summary.json", stem));

    let json = serde_json::to_string_pretty(&segmentation.metrics().summary())?;
    std::fs::write(&out, json)?;
    info!("💾 Saved run summary to {}", out.display());
    Ok(())
}

#[derive(serde::Serialize)]
struct ProbeDump {
    row: usize,
    col: usize,
    etas: Vec<f64>,
    gaussians: Vec<Gaussian>,
}

/// Dump one pixel's eta trajectory and mixture state for offline analysis.
fn save_probe_dump(
    video_path: &Path,
    segmentation: &SegmentationPipeline,
    row: usize,
    col: usize,
    config: &types::Config,
) -> Result<()> {
    if row >= segmentation.rows() || col >= segmentation.cols() {
        warn!(
            "probe pixel ({}, {}) outside {}x{} frame, skipping dump",
            row,
            col,
            segmentation.rows(),
            segmentation.cols()
        );
        return Ok(());
    }
    if !config.debug.eta_trace {
        warn!("probe pixel configured without debug.eta_trace; trace will be empty");
    }

    let stem = video_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("video");
    let out = Path::new(&config.video.output_dir).join(format!("{}_probe_{}_{}.json", stem, row, col));

    let dump = ProbeDump {
        row,
        col,
        etas: segmentation.pixel_etas(row, col).to_vec(),
        gaussians: segmentation.pixel_gaussians(row, col).to_vec(),
    };
    std::fs::write(&out, serde_json::to_string_pretty(&dump)?)?;
    info!("💾 Saved probe dump to {}", out.display());
    Ok(())
}
