use anyhow::{Context, Result};
use chrono::Local;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::cache::{CachedCrop, CropCache};
use crate::detect::FaceDetector;
use crate::geometry::compute_crop;
use crate::media;
use crate::progress::BatchProgressTracker;
use crate::reference;
use crate::study;
use crate::util::debug_println;

/// Batch crop configuration assembled from the command line.
pub struct CropOptions {
    /// Directories searched for method subdirectories
    pub base_dirs: Vec<PathBuf>,
    /// Directory the reference framing is always measured from
    pub reference_dir: PathBuf,
    pub output_front: PathBuf,
    pub output_rotated: PathBuf,
    pub cache_dir: PathBuf,
    /// Methods to process this run
    pub methods: Vec<String>,
    /// Methods whose framing defines the target; these are re-encoded only
    pub reference_methods: Vec<String>,
    /// Square output resolution handed to the encoder
    pub out_size: u32,
}

/// Counts reported at the end of a run and persisted to the run report.
#[derive(Debug, Default, Serialize)]
pub struct RunSummary {
    pub processed: u64,
    pub errors: u64,
}

impl RunSummary {
    fn absorb(&mut self, other: RunSummary) {
        self.processed += other.processed;
        self.errors += other.errors;
    }
}

/// Processes every requested method: reference methods are re-encoded
/// without cropping, candidate methods get reference-matched crops, and
/// rotated variants replay the crop cached from their front video.
pub fn run(opts: &CropOptions, detector: &mut FaceDetector, run_dir: &Path) -> Result<RunSummary> {
    fs::create_dir_all(&opts.output_front)?;
    fs::create_dir_all(&opts.output_rotated)?;
    fs::create_dir_all(&opts.cache_dir)?;

    let mut summary = RunSummary::default();

    for method in &opts.methods {
        println!("\n============================================================");
        println!("Processing method: {method}");
        println!("============================================================");

        summary.absorb(process_method(opts, detector, method)?);
    }

    write_report(run_dir, opts, &summary)?;

    println!("\n=== Processing Summary ===");
    println!("Videos processed: {}", summary.processed);
    println!("Errors: {}", summary.errors);
    Ok(summary)
}

fn process_method(
    opts: &CropOptions,
    detector: &mut FaceDetector,
    method: &str,
) -> Result<RunSummary> {
    let is_reference = opts.reference_methods.iter().any(|m| m == method);
    let cache_file = opts.cache_dir.join(format!("{method}_crop_cache.json"));
    let mut cache = if is_reference {
        println!("  Note: {method} is a reference method - re-encoding without crop");
        CropCache::new()
    } else {
        CropCache::load(&cache_file)
    };

    let mut summary = RunSummary::default();
    let mut method_found = false;

    for base_dir in &opts.base_dirs {
        if !base_dir.join(method).exists() {
            continue;
        }
        method_found = true;
        println!("\n  Found method in: {}", base_dir.display());

        summary.absorb(process_front(opts, detector, &mut cache, base_dir, method, is_reference)?);

        if !is_reference {
            cache.save(&cache_file)?;
            println!("    Saved crop cache to {}", cache_file.display());
        }

        summary.absorb(process_rotated(opts, &cache, base_dir, method, is_reference)?);
    }

    if !method_found {
        println!("  Warning: method '{method}' not found in any base directory, skipping");
    }

    Ok(summary)
}

fn process_front(
    opts: &CropOptions,
    detector: &mut FaceDetector,
    cache: &mut CropCache,
    base_dir: &Path,
    method: &str,
    is_reference: bool,
) -> Result<RunSummary> {
    let input_dir = if is_reference {
        base_dir.join(method).join(method)
    } else {
        base_dir.join(method).join(format!("{method}_scale1.5"))
    };

    let mut summary = RunSummary::default();
    if !input_dir.exists() {
        println!(
            "    Warning: input directory {} not found, skipping front videos",
            input_dir.display()
        );
        return Ok(summary);
    }

    let output_dir = opts.output_front.join(method);
    fs::create_dir_all(&output_dir)?;

    let videos = list_videos(&input_dir)?;
    println!("    Found {} front videos", videos.len());
    let mut progress = BatchProgressTracker::new(videos.len() as u64, method);

    for video in &videos {
        let file_name = file_name_of(video)?;
        let output = output_dir.join(study::front_output_name(file_name));

        let outcome = if is_reference {
            media::reencode(video, &output)
        } else {
            crop_front_video(opts, detector, cache, video, &output)
        };

        match outcome {
            Ok(()) => summary.processed += 1,
            Err(e) => {
                println!("      Warning: {}: {e}", video.display());
                summary.errors += 1;
            }
        }
        progress.update_video(file_name);
    }
    progress.finish();

    Ok(summary)
}

/// Crops one candidate front video, computing (and caching) its crop
/// parameters unless a previous run already did.
fn crop_front_video(
    opts: &CropOptions,
    detector: &mut FaceDetector,
    cache: &mut CropCache,
    video: &Path,
    output: &Path,
) -> Result<()> {
    let stem = video
        .file_stem()
        .and_then(|s| s.to_str())
        .with_context(|| format!("Unreadable file name {}", video.display()))?;
    let key = study::parse_video_stem(stem)
        .with_context(|| format!("Could not parse study filename {stem}"))?;
    let cache_key = key.cache_key();

    let entry = match cache.get(&cache_key) {
        Some(entry) => {
            debug_println(format_args!("using cached crop for {cache_key}"));
            entry.clone()
        }
        None => {
            let target = reference::reference_target(
                detector,
                &opts.reference_dir,
                &opts.reference_methods,
                &key,
            )?
            .with_context(|| format!("No reference framing available for {cache_key}"))?;

            let (frame, total_frames) = media::probe_video(video)?;
            let face = detector.detect_face(video, frame, total_frames)?;

            if let Some(face) = &face {
                debug_println(format_args!(
                    "{cache_key}: face ({}, {}) {}x{}, current ratio {:.4}, chin {:.4}",
                    face.x,
                    face.y,
                    face.width,
                    face.height,
                    face.area() as f64 / frame.area() as f64,
                    face.bottom() as f64 / frame.height as f64,
                ));
            }

            let crop = compute_crop(frame, face.as_ref(), target);
            let entry = CachedCrop::from_parts(target, face.as_ref(), &crop, frame);
            cache.insert(cache_key.clone(), entry.clone());
            entry
        }
    };

    let crop = entry.crop();
    if let Some(face) = entry.face() {
        debug_println(format_args!(
            "{cache_key}: crop ({}, {}) size {}, achieved ratio {:.4}, chin {:.4}",
            crop.x,
            crop.y,
            crop.width,
            face.area() as f64 / crop.area() as f64,
            (face.bottom() as f64 - crop.y as f64) / crop.width as f64,
        ));
    }

    media::crop_and_resize(video, output, &crop, opts.out_size)
}

fn process_rotated(
    opts: &CropOptions,
    cache: &CropCache,
    base_dir: &Path,
    method: &str,
    is_reference: bool,
) -> Result<RunSummary> {
    let input_dir = if is_reference {
        // Reference exports used either naming convention over time
        let plain = base_dir.join(method).join(format!("{method}_rotated"));
        if plain.exists() {
            plain
        } else {
            base_dir.join(method).join(format!("{method}_rotated_scale1.5"))
        }
    } else {
        base_dir.join(method).join(format!("{method}_rotated_scale1.5"))
    };

    let mut summary = RunSummary::default();
    if !input_dir.exists() {
        println!(
            "    Warning: rotated input directory {} not found, skipping rotated videos",
            input_dir.display()
        );
        return Ok(summary);
    }

    let output_dir = opts.output_rotated.join(method);
    fs::create_dir_all(&output_dir)?;

    let videos = list_videos(&input_dir)?;
    println!("    Found {} rotated videos", videos.len());
    let mut progress = BatchProgressTracker::new(videos.len() as u64, method);

    for video in &videos {
        let file_name = file_name_of(video)?;
        let output = output_dir.join(study::rotated_output_name(file_name));

        let outcome = if is_reference {
            media::reencode(video, &output)
        } else {
            crop_rotated_video(opts, cache, video, &output)
        };

        match outcome {
            Ok(()) => summary.processed += 1,
            Err(e) => {
                println!("      Warning: {}: {e}", video.display());
                summary.errors += 1;
            }
        }
        progress.update_video(file_name);
    }
    progress.finish();

    Ok(summary)
}

/// The rotated variant must reuse the exact crop its front video received,
/// so both views stay framed identically.
fn crop_rotated_video(
    opts: &CropOptions,
    cache: &CropCache,
    video: &Path,
    output: &Path,
) -> Result<()> {
    let stem = video
        .file_stem()
        .and_then(|s| s.to_str())
        .with_context(|| format!("Unreadable file name {}", video.display()))?;
    let key = study::parse_video_stem(stem)
        .with_context(|| format!("Could not parse study filename {stem}"))?;

    let entry = cache
        .get(&key.cache_key())
        .with_context(|| format!("No cached front crop for {}", key.cache_key()))?;

    media::crop_and_resize(video, output, &entry.crop(), opts.out_size)
}

fn list_videos(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut videos: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("Failed to read {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "mp4"))
        .collect();
    videos.sort();
    Ok(videos)
}

fn file_name_of(path: &Path) -> Result<&str> {
    path.file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("Unreadable file name {}", path.display()))
}

/// Run report persisted next to the logs, one JSON file per run.
#[derive(Serialize)]
struct RunReport<'a> {
    finished_at: String,
    methods: &'a [String],
    out_size: u32,
    processed: u64,
    errors: u64,
}

fn write_report(run_dir: &Path, opts: &CropOptions, summary: &RunSummary) -> Result<()> {
    let report = RunReport {
        finished_at: Local::now().to_rfc3339(),
        methods: &opts.methods,
        out_size: opts.out_size,
        processed: summary.processed,
        errors: summary.errors,
    };
    let path = run_dir.join("report.json");
    fs::write(&path, serde_json::to_string_pretty(&report)?)
        .with_context(|| format!("Failed to write run report {}", path.display()))?;
    println!("Run report saved to {}", path.display());
    Ok(())
}
