use anyhow::{Context, Result};
use std::path::Path;
use usls::{DataLoader, Hbb, Image, Y, models::YOLO};

use crate::config::build_detector_config;
use crate::geometry::{FrameDims, Rect, mean_rect};
use crate::util::debug_println;

/// Face-detector model options, shared by the crop and inspect commands.
#[derive(Debug, Clone)]
pub struct DetectorOpts {
    /// explicit model file, empty to use the packaged default
    pub model: Option<String>,
    /// model task
    pub task: String,
    /// model version
    pub ver: f32,
    /// model scale: n, s, m, l
    pub scale: String,
    /// model dtype
    pub dtype: String,
    /// device: cuda, cpu, mps
    pub device: String,
    /// class name the detector reports for faces
    pub object: String,
    /// minimum detection confidence
    pub confidence: f32,
    /// number of frames sampled evenly across the video
    pub samples: usize,
}

/// Off-the-shelf face-detection oracle. Returns zero-or-one rectangle per
/// video; everything downstream treats absence as the center-crop fallback,
/// never as an error.
pub struct FaceDetector {
    model: YOLO,
    object: String,
    confidence: f32,
    samples: usize,
}

impl FaceDetector {
    pub fn new(opts: &DetectorOpts) -> Result<Self> {
        let config = build_detector_config(opts)?;
        let model = YOLO::new(config)?;
        Ok(Self {
            model,
            object: opts.object.clone(),
            confidence: opts.confidence,
            samples: opts.samples.max(1),
        })
    }

    /// Detects the face box for a video by sampling frames evenly, keeping
    /// the largest confident detection per frame, and averaging the samples.
    ///
    /// `total_frames` (when the container reports it) spreads the samples
    /// across the whole clip; without it the first frames are used.
    pub fn detect_face(
        &mut self,
        video: &Path,
        frame: FrameDims,
        total_frames: Option<u64>,
    ) -> Result<Option<Rect>> {
        let stride = total_frames
            .map(|total| (total / self.samples as u64).max(1))
            .unwrap_or(1);

        let source = video
            .to_str()
            .with_context(|| format!("Non-UTF8 video path {}", video.display()))?;
        let data_loader = DataLoader::new(source)?.with_batch(1).build()?;

        let mut detections = Vec::new();
        let mut index: u64 = 0;
        for xs in data_loader {
            if index % stride == 0 {
                let ys = self.model.forward(&xs)?;
                for y in ys.iter() {
                    if let Some(face) = largest_face(y, &self.object, self.confidence, frame) {
                        detections.push(face);
                    }
                }
            }
            index += xs.len() as u64;
            if detections.len() >= self.samples {
                break;
            }
        }

        if detections.is_empty() {
            println!("      Warning: no faces detected in {}", video.display());
        }
        debug_println(format_args!(
            "face samples for {}: {:?}",
            video.display(),
            detections
        ));

        Ok(mean_rect(&detections))
    }

    /// Grabs the first decodable frame, for annotation output.
    pub fn first_frame(&self, video: &Path) -> Result<Image> {
        let source = video
            .to_str()
            .with_context(|| format!("Non-UTF8 video path {}", video.display()))?;
        let data_loader = DataLoader::new(source)?.with_batch(1).build()?;
        for xs in data_loader {
            if let Some(x) = xs.into_iter().next() {
                return Ok(x);
            }
        }
        anyhow::bail!("Could not read a frame from {}", video.display())
    }
}

/// Picks the largest face detection above the confidence threshold from one
/// frame's results, clamped to the frame bounds.
fn largest_face(detection: &Y, object_name: &str, confidence: f32, frame: FrameDims) -> Option<Rect> {
    let hbbs = detection.hbbs()?;
    let best = hbbs
        .iter()
        .filter(|hbb| {
            let meets_threshold = hbb.confidence().is_some_and(|c| c >= confidence);
            let matches_name = hbb.name().is_some_and(|n| n == object_name);
            meets_threshold && matches_name
        })
        .max_by(|a, b| a.area().partial_cmp(&b.area()).unwrap())?;
    Some(hbb_to_rect(best, frame))
}

/// Converts a detection box to an integer pixel rectangle inside the frame.
fn hbb_to_rect(hbb: &Hbb, frame: FrameDims) -> Rect {
    let x = hbb.xmin().max(0.0).round() as u32;
    let y = hbb.ymin().max(0.0).round() as u32;
    let width = hbb.width().round() as u32;
    let height = hbb.height().round() as u32;
    Rect::new(x, y, width, height).clamped_to(frame)
}
