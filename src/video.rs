// src/video.rs

use crate::types::{Config, Frame, FrameMasks};
use anyhow::Result;
use opencv::{
    core::{self, Mat},
    imgproc,
    prelude::*,
    videoio::{self, VideoCapture, VideoCaptureTraitConst, VideoWriter},
};
use std::path::{Path, PathBuf};
use tracing::info;
use walkdir::WalkDir;

// ============================================================================
// VIDEO PROCESSOR
// ============================================================================

pub struct VideoProcessor {
    config: Config,
}

impl VideoProcessor {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn find_video_files(&self) -> Result<Vec<PathBuf>> {
        let mut videos = Vec::new();
        let video_extensions = vec!["mp4", "avi", "mov", "mkv", "MP4", "AVI", "MOV", "MKV"];

        for entry in WalkDir::new(&self.config.video.input_dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if let Some(ext) = path.extension() {
                if video_extensions.contains(&ext.to_str().unwrap_or("")) {
                    videos.push(path.to_path_buf());
                }
            }
        }
        videos.sort();
        info!("Found {} video files", videos.len());
        Ok(videos)
    }

    pub fn open_video(&self, path: &Path) -> Result<VideoReader> {
        info!("Opening video: {}", path.display());
        let cap = VideoCapture::from_file(path.to_str().unwrap_or_default(), videoio::CAP_ANY)?;

        if !cap.is_opened()? {
            anyhow::bail!("Failed to open video file {}", path.display());
        }

        let fps = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FPS)?;
        let total_frames = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FRAME_COUNT)? as i32;
        let width = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FRAME_WIDTH)? as i32;
        let height = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FRAME_HEIGHT)? as i32;

        Ok(VideoReader {
            cap,
            fps,
            total_frames,
            current_frame: 0,
            width,
            height,
        })
    }

    /// Open the writers the configuration asks for. Mask videos carry the
    /// binary masks; the result video carries the original frame gated by
    /// the final mask.
    pub fn create_writers(
        &self,
        input_path: &Path,
        width: i32,
        height: i32,
        fps: f64,
    ) -> Result<MaskWriters> {
        let video = &self.config.video;
        if !video.save_masks && !video.save_result {
            return Ok(MaskWriters::default());
        }

        std::fs::create_dir_all(&video.output_dir)?;
        let stem = input_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("video");

        let open = |suffix: &str| -> Result<Option<VideoWriter>> {
            let output_path =
                PathBuf::from(&video.output_dir).join(format!("{}_{}.mp4", stem, suffix));
            let fourcc = VideoWriter::fourcc('m', 'p', '4', 'v')?;
            let writer = VideoWriter::new(
                output_path.to_str().unwrap_or_default(),
                fourcc,
                fps,
                core::Size::new(width, height),
                true,
            )?;
            Ok(Some(writer))
        };

        Ok(MaskWriters {
            object: if video.save_masks { open("object")? } else { None },
            shadow: if video.save_masks { open("shadow")? } else { None },
            final_mask: if video.save_masks { open("final")? } else { None },
            result: if video.save_result { open("result")? } else { None },
        })
    }
}

// ============================================================================
// VIDEO READER
// ============================================================================

pub struct VideoReader {
    pub cap: VideoCapture,
    pub fps: f64,
    pub total_frames: i32,
    pub current_frame: i32,
    pub width: i32,
    pub height: i32,
}

impl VideoReader {
    /// Pull the next BGR frame; `None` signals end of stream.
    pub fn read_frame(&mut self) -> Result<Option<Frame>> {
        use opencv::videoio::VideoCaptureTrait;
        let mut mat = Mat::default();
        if !VideoCaptureTrait::read(&mut self.cap, &mut mat)? || mat.empty() {
            return Ok(None);
        }
        self.current_frame += 1;
        let timestamp_ms = if self.fps > 0.0 {
            (self.current_frame as f64 / self.fps) * 1000.0
        } else {
            0.0
        };

        Ok(Some(Frame {
            data: mat.data_bytes()?.to_vec(),
            width: self.width as usize,
            height: self.height as usize,
            frame_id: self.current_frame as u64,
            timestamp_ms,
        }))
    }

    pub fn progress(&self) -> f32 {
        if self.total_frames <= 0 {
            return 0.0;
        }
        (self.current_frame as f32 / self.total_frames as f32) * 100.0
    }
}

// ============================================================================
// MASK WRITERS
// ============================================================================

#[derive(Default)]
pub struct MaskWriters {
    object: Option<VideoWriter>,
    shadow: Option<VideoWriter>,
    final_mask: Option<VideoWriter>,
    result: Option<VideoWriter>,
}

impl MaskWriters {
    pub fn write(&mut self, frame: &Frame, masks: &FrameMasks) -> Result<()> {
        use opencv::videoio::VideoWriterTrait;

        let rows = frame.height as i32;
        if let Some(writer) = &mut self.object {
            writer.write(&mask_to_bgr(&masks.object, rows)?)?;
        }
        if let Some(writer) = &mut self.shadow {
            writer.write(&mask_to_bgr(&masks.shadow, rows)?)?;
        }
        if let Some(writer) = &mut self.final_mask {
            writer.write(&mask_to_bgr(&masks.final_mask, rows)?)?;
        }
        if let Some(writer) = &mut self.result {
            writer.write(&masked_frame(frame, &masks.final_mask)?)?;
        }
        Ok(())
    }
}

fn mask_to_bgr(mask: &[u8], rows: i32) -> Result<Mat> {
    let mat = Mat::from_slice(mask)?;
    let mat = mat.reshape(1, rows)?;
    let mut bgr = Mat::default();
    imgproc::cvt_color(&mat, &mut bgr, imgproc::COLOR_GRAY2BGR, 0)?;
    Ok(bgr)
}

/// Original frame where the final mask is set, black elsewhere.
fn masked_frame(frame: &Frame, mask: &[u8]) -> Result<Mat> {
    let rows = frame.height as i32;
    let bgr = Mat::from_slice(&frame.data)?;
    let bgr = bgr.reshape(3, rows)?;
    let mask_mat = Mat::from_slice(mask)?;
    let mask_mat = mask_mat.reshape(1, rows)?;

    let mut result =
        Mat::new_rows_cols_with_default(rows, frame.width as i32, core::CV_8UC3, core::Scalar::all(0.0))?;
    core::bitwise_and(&bgr, &bgr, &mut result, &mask_mat)?;
    Ok(result)
}
