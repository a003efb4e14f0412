use argh::FromArgs;
use std::path::PathBuf;

use crate::buckets::StudyPlan;
use crate::detect::DetectorOpts;
use crate::geometry::CropTarget;
use crate::pipeline::CropOptions;

/// User-study video preparation toolkit
#[derive(FromArgs, Debug)]
pub struct Args {
    #[argh(subcommand)]
    pub command: Command,
}

#[derive(FromArgs, Debug)]
#[argh(subcommand)]
pub enum Command {
    Crop(CropArgs),
    Randomize(RandomizeArgs),
    Serve(ServeArgs),
    Inspect(InspectArgs),
}

/// Crop and resize method videos to the reference framing
#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "crop")]
pub struct CropArgs {
    /// directory searched for method subdirectories (repeatable)
    #[argh(option)]
    pub base_dir: Vec<PathBuf>,

    /// directory the reference framing is measured from
    #[argh(option)]
    pub reference_dir: Option<PathBuf>,

    /// output directory for front videos
    #[argh(option, default = "PathBuf::from(\"cropped_front\")")]
    pub output_front: PathBuf,

    /// output directory for rotated videos
    #[argh(option, default = "PathBuf::from(\"cropped_rotated\")")]
    pub output_rotated: PathBuf,

    /// directory holding per-method crop caches
    #[argh(option, default = "PathBuf::from(\"crop_cache\")")]
    pub cache_dir: PathBuf,

    /// method to process (repeatable; defaults to the study set)
    #[argh(option)]
    pub method: Vec<String>,

    /// reference method re-encoded without cropping (repeatable)
    #[argh(option)]
    pub reference_method: Vec<String>,

    /// square output resolution
    #[argh(option, default = "512")]
    pub out_size: u32,

    /// explicit detector model file
    #[argh(option)]
    pub model: Option<String>,

    /// model task
    #[argh(option, default = "String::from(\"det\")")]
    pub task: String,

    /// model version
    #[argh(option, default = "8.0")]
    pub ver: f32,

    /// model scale: n, s, m, l
    #[argh(option, default = "String::from(\"m\")")]
    pub scale: String,

    /// model dtype
    #[argh(option, default = "String::from(\"auto\")")]
    pub dtype: String,

    /// device: cuda, cpu, mps
    #[argh(option, default = "String::from(\"cpu:0\")")]
    pub device: String,

    /// class name the detector reports for faces
    #[argh(option, default = "String::from(\"face\")")]
    pub object: String,

    /// minimum detection confidence
    #[argh(option, default = "0.5")]
    pub confidence: f32,

    /// frames sampled per video for detection
    #[argh(option, default = "10")]
    pub samples: usize,
}

impl CropArgs {
    pub fn detector_opts(&self) -> DetectorOpts {
        DetectorOpts {
            model: self.model.clone(),
            task: self.task.clone(),
            ver: self.ver,
            scale: self.scale.clone(),
            dtype: self.dtype.clone(),
            device: self.device.clone(),
            object: self.object.clone(),
            confidence: self.confidence,
            samples: self.samples,
        }
    }

    pub fn crop_options(&self) -> CropOptions {
        let base_dirs = if self.base_dir.is_empty() {
            vec![
                PathBuf::from("FINAL_BASELINES_V2_CRF"),
                PathBuf::from("FINAL_BRIGHT"),
            ]
        } else {
            self.base_dir.clone()
        };
        let reference_dir = self
            .reference_dir
            .clone()
            .unwrap_or_else(|| base_dirs[0].clone());
        let methods = if self.method.is_empty() {
            ["ga", "4dgs", "hr", "lam", "gaga", "ar"]
                .map(String::from)
                .to_vec()
        } else {
            self.method.clone()
        };
        let reference_methods = if self.reference_method.is_empty() {
            vec!["gaga".to_string(), "ar".to_string()]
        } else {
            self.reference_method.clone()
        };

        CropOptions {
            base_dirs,
            reference_dir,
            output_front: self.output_front.clone(),
            output_rotated: self.output_rotated.clone(),
            cache_dir: self.cache_dir.clone(),
            methods,
            reference_methods,
            out_size: self.out_size,
        }
    }
}

/// Randomize comparison pairings into survey buckets
#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "randomize")]
pub struct RandomizeArgs {
    /// rng seed; the same seed always yields the same assignment
    #[argh(option, default = "45")]
    pub seed: u64,

    /// comma-separated subject ids
    #[argh(
        option,
        default = "String::from(\"074,104,218,253,264,302,304,306,460\")"
    )]
    pub subjects: String,

    /// comma-separated sentence labels
    #[argh(option, default = "String::from(\"A,B\")")]
    pub sentences: String,

    /// comma-separated baseline methods
    #[argh(option, default = "String::from(\"ga,gaga,4dgs,hr,ar,lam\")")]
    pub baselines: String,

    /// responders per pairing (must be even)
    #[argh(option, default = "10")]
    pub responders: usize,

    /// comparisons per bucket
    #[argh(option, default = "9")]
    pub bucket_size: usize,

    /// output directory for the HIT CSVs
    #[argh(option, default = "PathBuf::from(\"final_csv\")")]
    pub out_dir: PathBuf,
}

impl RandomizeArgs {
    pub fn plan(&self) -> StudyPlan {
        StudyPlan {
            subjects: split_list(&self.subjects),
            sentences: split_list(&self.sentences),
            baselines: split_list(&self.baselines),
            responders: self.responders,
            bucket_size: self.bucket_size,
        }
    }
}

/// Serve the side-by-side debug comparison page
#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "serve")]
pub struct ServeArgs {
    /// directory whose method subdirectories are compared
    #[argh(option)]
    pub path: PathBuf,

    /// port to run the server on
    #[argh(option, default = "5000")]
    pub port: u16,
}

/// Print a framing report for one video
#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "inspect")]
pub struct InspectArgs {
    /// video to inspect
    #[argh(positional)]
    pub source: PathBuf,

    /// target face-to-crop area ratio to preview a crop for
    #[argh(option)]
    pub ratio: Option<f64>,

    /// target normalized chin position to preview a crop for
    #[argh(option)]
    pub anchor: Option<f64>,

    /// write a frame with face and crop rectangles drawn to this path
    #[argh(option)]
    pub annotate: Option<PathBuf>,

    /// explicit detector model file
    #[argh(option)]
    pub model: Option<String>,

    /// model task
    #[argh(option, default = "String::from(\"det\")")]
    pub task: String,

    /// model version
    #[argh(option, default = "8.0")]
    pub ver: f32,

    /// model scale: n, s, m, l
    #[argh(option, default = "String::from(\"m\")")]
    pub scale: String,

    /// model dtype
    #[argh(option, default = "String::from(\"auto\")")]
    pub dtype: String,

    /// device: cuda, cpu, mps
    #[argh(option, default = "String::from(\"cpu:0\")")]
    pub device: String,

    /// class name the detector reports for faces
    #[argh(option, default = "String::from(\"face\")")]
    pub object: String,

    /// minimum detection confidence
    #[argh(option, default = "0.5")]
    pub confidence: f32,

    /// frames sampled per video for detection
    #[argh(option, default = "10")]
    pub samples: usize,
}

impl InspectArgs {
    pub fn detector_opts(&self) -> DetectorOpts {
        DetectorOpts {
            model: self.model.clone(),
            task: self.task.clone(),
            ver: self.ver,
            scale: self.scale.clone(),
            dtype: self.dtype.clone(),
            device: self.device.clone(),
            object: self.object.clone(),
            confidence: self.confidence,
            samples: self.samples,
        }
    }

    /// Crop preview target, only when both halves were given.
    pub fn target(&self) -> Option<CropTarget> {
        match (self.ratio, self.anchor) {
            (Some(ratio), Some(anchor_y)) => Some(CropTarget::new(ratio, anchor_y)),
            _ => None,
        }
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
