use anyhow::Result;
use std::path::Path;

use crate::detect::FaceDetector;
use crate::geometry::CropTarget;
use crate::media;
use crate::study::VideoKey;
use crate::util::debug_println;

/// Framing measured on one reference video: face-area fraction of the frame
/// and normalized chin row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FramingStats {
    pub ratio: f64,
    pub anchor_y: f64,
}

/// Measures the face framing of a video. `None` when no face is detected.
pub fn measure_framing(detector: &mut FaceDetector, video: &Path) -> Result<Option<FramingStats>> {
    let (frame, total_frames) = media::probe_video(video)?;
    let Some(face) = detector.detect_face(video, frame, total_frames)? else {
        return Ok(None);
    };
    Ok(Some(FramingStats {
        ratio: face.area() as f64 / frame.area() as f64,
        anchor_y: face.bottom() as f64 / frame.height as f64,
    }))
}

/// Mean framing across reference measurements; the crop target every
/// candidate method is normalized towards.
pub fn target_from_measurements(stats: &[FramingStats]) -> Option<CropTarget> {
    if stats.is_empty() {
        return None;
    }
    let n = stats.len() as f64;
    Some(CropTarget::new(
        stats.iter().map(|s| s.ratio).sum::<f64>() / n,
        stats.iter().map(|s| s.anchor_y).sum::<f64>() / n,
    ))
}

/// Derives the crop target for a subject+sentence by measuring that
/// subject's videos under each reference method and averaging.
///
/// Reference videos live at `{root}/{method}/{method}/{method}_heygen_
/// {sentence}_{subject}.mp4`. Missing or unmeasurable videos are skipped;
/// `None` means no reference was usable and the caller should skip the
/// candidate video.
pub fn reference_target(
    detector: &mut FaceDetector,
    reference_root: &Path,
    reference_methods: &[String],
    key: &VideoKey,
) -> Result<Option<CropTarget>> {
    let mut measurements = Vec::new();

    for method in reference_methods {
        let video = reference_root
            .join(method)
            .join(method)
            .join(format!("{method}_heygen_{}_{}.mp4", key.sentence, key.subject));
        if !video.exists() {
            continue;
        }
        match measure_framing(detector, &video) {
            Ok(Some(stats)) => {
                debug_println(format_args!(
                    "reference {method} for {}: ratio {:.4} chin {:.4}",
                    key.cache_key(),
                    stats.ratio,
                    stats.anchor_y
                ));
                measurements.push(stats);
            }
            Ok(None) => {}
            Err(e) => {
                println!("      Warning: could not measure {}: {e}", video.display());
            }
        }
    }

    Ok(target_from_measurements(&measurements))
}
