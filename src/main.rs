use anyhow::Result;
use chrono::Local;
use std::fs;
use std::path::PathBuf;

use studycrop::buckets;
use studycrop::cli::{Args, Command};
use studycrop::detect::FaceDetector;
use studycrop::inspect;
use studycrop::media;
use studycrop::pipeline;
use studycrop::viewer;

/// Creates a timestamped run directory and returns its path
fn create_run_dir() -> Result<PathBuf> {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let run_dir = PathBuf::from(format!("./runs/{}", timestamp));
    fs::create_dir_all(&run_dir)?;
    Ok(run_dir)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Args = argh::from_env();

    match args.command {
        Command::Crop(cmd) => {
            media::check_ffmpeg_installed()?;

            let run_dir = create_run_dir()?;
            println!("Created run directory: {}", run_dir.display());

            let mut detector = FaceDetector::new(&cmd.detector_opts())?;
            let opts = cmd.crop_options();
            println!("Methods to process: {}", opts.methods.join(", "));

            pipeline::run(&opts, &mut detector, &run_dir)?;
        }
        Command::Randomize(cmd) => {
            let plan = cmd.plan();
            let assignment = buckets::assign(cmd.seed, &plan)?;

            for (i, bucket) in assignment.iter().enumerate() {
                println!("Bucket {}:", i + 1);
                for c in bucket {
                    println!(
                        "{}, {}, {}, {}",
                        c.key.subject, c.key.sentence, c.baseline, c.ours_left
                    );
                }
            }

            buckets::write_hit_csvs(&cmd.out_dir, &assignment)?;
            println!(
                "Wrote {} buckets to {}",
                assignment.len(),
                cmd.out_dir.display()
            );
        }
        Command::Serve(cmd) => {
            init_tracing();
            viewer::serve(cmd.path, cmd.port).await?;
        }
        Command::Inspect(cmd) => {
            media::check_ffmpeg_installed()?;

            let mut detector = FaceDetector::new(&cmd.detector_opts())?;
            inspect::run(&mut detector, &cmd.source, cmd.target(), cmd.annotate.as_deref())?;
        }
    }

    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let env_filter = EnvFilter::from_default_env()
        .add_directive("studycrop=info".parse().unwrap())
        .add_directive("tower_http=info".parse().unwrap());

    tracing_subscriber::registry()
        .with(fmt::layer().with_ansi(true).with_target(true))
        .with(env_filter)
        .init();
}
