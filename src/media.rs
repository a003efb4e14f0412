use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::process::Command;

use crate::geometry::{FrameDims, Rect};

/// Checks if ffmpeg and ffprobe are installed and available in the system
pub fn check_ffmpeg_installed() -> Result<()> {
    for tool in ["ffmpeg", "ffprobe"] {
        let status = Command::new(tool)
            .arg("-version")
            .output()
            .with_context(|| format!("Failed to execute {tool}. Is ffmpeg installed?"))?
            .status;

        if !status.success() {
            anyhow::bail!("{tool} is not properly installed");
        }
    }
    Ok(())
}

/// FFprobe JSON output, reduced to the stream fields we read.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    width: Option<u32>,
    height: Option<u32>,
    nb_frames: Option<String>,
}

/// Probes a video file for its pixel dimensions using ffprobe.
pub fn probe_dimensions(path: &Path) -> Result<FrameDims> {
    let (dims, _) = probe_video(path)?;
    Ok(dims)
}

/// Probes a video for dimensions and, when the container reports it, the
/// total frame count.
pub fn probe_video(path: &Path) -> Result<(FrameDims, Option<u64>)> {
    let output = Command::new("ffprobe")
        .args(["-v", "quiet", "-print_format", "json", "-show_streams"])
        .arg(path)
        .output()
        .context("Failed to execute ffprobe command")?;

    if !output.status.success() {
        anyhow::bail!(
            "ffprobe failed for {}: {}",
            path.display(),
            String::from_utf8_lossy(&output.stderr)
        );
    }

    let probe: FfprobeOutput =
        serde_json::from_slice(&output.stdout).context("Failed to parse ffprobe output")?;

    let stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "video")
        .with_context(|| format!("No video stream found in {}", path.display()))?;

    let (Some(width), Some(height)) = (stream.width, stream.height) else {
        anyhow::bail!("Video stream in {} has no dimensions", path.display());
    };
    if width == 0 || height == 0 {
        anyhow::bail!("Video stream in {} has zero dimensions", path.display());
    }

    let frames = stream.nb_frames.as_ref().and_then(|n| n.parse().ok());
    Ok((FrameDims::new(width, height), frames))
}

/// Crops a video to the given square and resizes it to `out_size`x`out_size`
/// using ffmpeg. Audio is copied through untouched.
pub fn crop_and_resize(input: &Path, output: &Path, crop: &Rect, out_size: u32) -> Result<()> {
    let filter = format!(
        "crop={}:{}:{}:{},scale={}:{}:flags=lanczos",
        crop.width, crop.height, crop.x, crop.y, out_size, out_size
    );

    let status = Command::new("ffmpeg")
        .arg("-i")
        .arg(input)
        .args(["-vf", &filter])
        .args(["-c:v", "libx264", "-crf", "10", "-preset", "veryslow"])
        .args(["-pix_fmt", "yuv420p"])
        .args(["-c:a", "copy"])
        .arg("-y")
        .arg(output)
        .output()
        .context("Failed to execute ffmpeg command to crop video")?
        .status;

    if !status.success() {
        anyhow::bail!("ffmpeg crop failed with status {status} for {}", input.display());
    }

    Ok(())
}

/// Re-encodes a video with the study's encoder settings but no crop, for
/// reference methods whose framing is already canonical.
pub fn reencode(input: &Path, output: &Path) -> Result<()> {
    let status = Command::new("ffmpeg")
        .arg("-i")
        .arg(input)
        .args(["-c:v", "libx264", "-crf", "10", "-preset", "veryslow"])
        .args(["-pix_fmt", "yuv420p"])
        .args(["-c:a", "copy"])
        .arg("-y")
        .arg(output)
        .output()
        .context("Failed to execute ffmpeg command to re-encode video")?
        .status;

    if !status.success() {
        anyhow::bail!(
            "ffmpeg re-encode failed with status {status} for {}",
            input.display()
        );
    }

    Ok(())
}
