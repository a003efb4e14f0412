use anyhow::Result;
use image::RgbImage;
use std::path::Path;

use crate::detect::FaceDetector;
use crate::geometry::{CropTarget, FrameDims, Rect, compute_crop};
use crate::media;

/// Everything the framing report prints for one video.
#[derive(Debug)]
pub struct FramingReport {
    pub frame: FrameDims,
    pub face: Option<Rect>,
    /// Crop the given target would produce, with achieved framing
    pub crop: Option<(CropTarget, Rect)>,
}

impl FramingReport {
    pub fn print(&self, video: &Path) {
        println!("{}", "=".repeat(80));
        println!("FRAMING REPORT: {}", video.display());
        println!("{}", "=".repeat(80));
        println!("Video size: {}x{}", self.frame.width, self.frame.height);

        match &self.face {
            Some(face) => {
                println!(
                    "Face bbox: ({}, {}) size {}x{}",
                    face.x, face.y, face.width, face.height
                );
                println!("Face bottom (chin): {} pixels from top", face.bottom());
                println!("Space above face: {} pixels", face.y);
                println!(
                    "Space below face: {} pixels",
                    self.frame.height.saturating_sub(face.bottom())
                );
                println!(
                    "Normalized chin Y: {:.4}",
                    face.bottom() as f64 / self.frame.height as f64
                );
                println!(
                    "Face-to-frame ratio: {:.4}",
                    face.area() as f64 / self.frame.area() as f64
                );
            }
            None => println!("No face detected - crops would fall back to center"),
        }

        if let Some((target, crop)) = &self.crop {
            println!(
                "Target ratio: {:.4}, target chin Y: {:.4}",
                target.ratio, target.anchor_y
            );
            println!("Crop box: ({}, {}) size {}x{}", crop.x, crop.y, crop.width, crop.height);
            if let Some(face) = &self.face {
                // Achieved values drift from the target when bounds repair
                // moved the crop off a frame edge
                println!(
                    "Resulting face ratio: {:.4}, chin position in crop: {:.4}",
                    face.area() as f64 / crop.area() as f64,
                    (face.bottom() as f64 - crop.y as f64) / crop.width as f64
                );
            }
        }
    }
}

/// Probes and measures one video, printing the framing report; optionally
/// writes a frame with the face and crop rectangles drawn in.
pub fn run(
    detector: &mut FaceDetector,
    video: &Path,
    target: Option<CropTarget>,
    annotate: Option<&Path>,
) -> Result<()> {
    let (frame, total_frames) = media::probe_video(video)?;
    let face = detector.detect_face(video, frame, total_frames)?;

    let crop = target.map(|target| (target, compute_crop(frame, face.as_ref(), target)));
    let report = FramingReport { frame, face, crop };
    report.print(video);

    if let Some(out) = annotate {
        let image = detector.first_frame(video)?;
        let mut rgb = image.to_rgb8();
        if let Some(face) = &report.face {
            draw_rect(&mut rgb, face, [0, 255, 0]);
        }
        if let Some((_, crop)) = &report.crop {
            draw_rect(&mut rgb, crop, [255, 0, 0]);
        }
        rgb.save(out)?;
        println!("Annotated frame saved to {}", out.display());
    }

    Ok(())
}

/// Draws a 2px rectangle outline, ignoring parts outside the image.
fn draw_rect(image: &mut RgbImage, rect: &Rect, color: [u8; 3]) {
    let pixel = image::Rgb(color);
    let (w, h) = (image.width(), image.height());

    for dx in 0..rect.width {
        for edge_y in [rect.y, rect.y + 1, rect.bottom().saturating_sub(2), rect.bottom().saturating_sub(1)] {
            let x = rect.x + dx;
            if x < w && edge_y < h {
                image.put_pixel(x, edge_y, pixel);
            }
        }
    }
    for dy in 0..rect.height {
        for edge_x in [rect.x, rect.x + 1, rect.right().saturating_sub(2), rect.right().saturating_sub(1)] {
            let y = rect.y + dy;
            if edge_x < w && y < h {
                image.put_pixel(edge_x, y, pixel);
            }
        }
    }
}
