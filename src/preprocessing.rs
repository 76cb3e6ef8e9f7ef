// src/preprocessing.rs
//
// Thin wrappers over the imaging library. Everything here is a pure
// function from buffers to buffers; the pipeline owns all state.

use crate::types::Frame;
use anyhow::Result;
use opencv::{
    core::{self, Mat},
    imgproc,
    prelude::*,
};

/// Convert a BGR frame to single-channel luminance and soften it with a
/// small Gaussian blur.
pub fn gray_blurred(frame: &Frame, blur_size: i32) -> Result<Vec<u8>> {
    let mat = Mat::from_slice(&frame.data)?;
    let mat = mat.reshape(3, frame.height as i32)?;

    let mut gray = Mat::default();
    imgproc::cvt_color(&mat, &mut gray, imgproc::COLOR_BGR2GRAY, 0)?;

    let mut blurred = Mat::default();
    imgproc::gaussian_blur(
        &gray,
        &mut blurred,
        core::Size::new(blur_size, blur_size),
        0.0,
        0.0,
        core::BORDER_DEFAULT,
    )?;

    Ok(blurred.data_bytes()?.to_vec())
}

/// Morphological opening with a square structuring element.
pub fn morphological_open(mask: &[u8], rows: usize, kernel: i32) -> Result<Vec<u8>> {
    let mat = Mat::from_slice(mask)?;
    let mat = mat.reshape(1, rows as i32)?;

    let element = imgproc::get_structuring_element(
        imgproc::MORPH_RECT,
        core::Size::new(kernel, kernel),
        core::Point::new(-1, -1),
    )?;

    let mut opened = Mat::default();
    imgproc::morphology_ex(
        &mat,
        &mut opened,
        imgproc::MORPH_OPEN,
        &element,
        core::Point::new(-1, -1),
        1,
        core::BORDER_CONSTANT,
        imgproc::morphology_default_border_value()?,
    )?;

    Ok(opened.data_bytes()?.to_vec())
}

/// Dilation with a square structuring element.
pub fn dilate(mask: &[u8], rows: usize, kernel: i32) -> Result<Vec<u8>> {
    let mat = Mat::from_slice(mask)?;
    let mat = mat.reshape(1, rows as i32)?;

    let element = imgproc::get_structuring_element(
        imgproc::MORPH_RECT,
        core::Size::new(kernel, kernel),
        core::Point::new(-1, -1),
    )?;

    let mut dilated = Mat::default();
    imgproc::dilate(
        &mat,
        &mut dilated,
        &element,
        core::Point::new(-1, -1),
        1,
        core::BORDER_CONSTANT,
        imgproc::morphology_default_border_value()?,
    )?;

    Ok(dilated.data_bytes()?.to_vec())
}

/// 8-connected component labeling. Returns the flat label image and the
/// number of labels including background label 0.
pub fn connected_components(mask: &[u8], rows: usize) -> Result<(Vec<i32>, usize)> {
    let mat = Mat::from_slice(mask)?;
    let mat = mat.reshape(1, rows as i32)?;

    let mut labels = Mat::default();
    let count = imgproc::connected_components(&mat, &mut labels, 8, core::CV_32S)?;

    Ok((labels.data_typed::<i32>()?.to_vec(), count as usize))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform_frame(width: usize, height: usize, bgr: [u8; 3]) -> Frame {
        let mut data = Vec::with_capacity(width * height * 3);
        for _ in 0..width * height {
            data.extend_from_slice(&bgr);
        }
        Frame {
            data,
            width,
            height,
            frame_id: 0,
            timestamp_ms: 0.0,
        }
    }

    #[test]
    fn test_gray_blurred_preserves_uniform_frames() {
        let frame = uniform_frame(8, 8, [128, 128, 128]);
        let gray = gray_blurred(&frame, 3).unwrap();
        assert_eq!(gray.len(), 64);
        assert!(gray.iter().all(|&v| v == 128));
    }

    #[test]
    fn test_gray_uses_luminance_weights() {
        // Pure blue carries the smallest luminance coefficient.
        let frame = uniform_frame(8, 8, [255, 0, 0]);
        let gray = gray_blurred(&frame, 3).unwrap();
        assert!(gray.iter().all(|&v| v >= 28 && v <= 30), "got {}", gray[0]);
    }

    #[test]
    fn test_opening_removes_isolated_pixel() {
        let mut mask = vec![0u8; 64];
        mask[3 * 8 + 3] = 255;
        let opened = morphological_open(&mask, 8, 4).unwrap();
        assert!(opened.iter().all(|&v| v == 0));
    }

    #[test]
    fn test_opening_keeps_solid_block() {
        let mut mask = vec![0u8; 64];
        for r in 1..7 {
            for c in 1..7 {
                mask[r * 8 + c] = 255;
            }
        }
        let opened = morphological_open(&mask, 8, 4).unwrap();
        assert!(opened.iter().any(|&v| v == 255));
    }

    #[test]
    fn test_dilate_grows_single_pixel() {
        let mut mask = vec![0u8; 64];
        mask[3 * 8 + 3] = 255;
        let dilated = dilate(&mask, 8, 3).unwrap();
        let on = dilated.iter().filter(|&&v| v == 255).count();
        assert_eq!(on, 9);
    }

    #[test]
    fn test_connected_components_counts_blobs() {
        let mut mask = vec![0u8; 64];
        mask[0] = 255;
        mask[1] = 255;
        mask[7 * 8 + 7] = 255;
        let (labels, count) = connected_components(&mask, 8).unwrap();
        assert_eq!(count, 3);
        assert_eq!(labels[0], labels[1]);
        assert_ne!(labels[0], labels[7 * 8 + 7]);
        assert_eq!(labels[10], 0);
    }
}
