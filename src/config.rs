use anyhow::Result;
use usls::Config;

use crate::detect::DetectorOpts;

/// Builds the face-detector model configuration from command line options
pub fn build_detector_config(opts: &DetectorOpts) -> Result<Config> {
    let config = Config::yolo()
        .with_model_file(opts.model.as_ref().map_or("", String::as_str))
        .with_task(opts.task.parse()?)
        .with_version(opts.ver.try_into()?)
        .with_scale(opts.scale.parse()?)
        .with_model_dtype(opts.dtype.parse()?)
        .with_model_device(opts.device.parse()?)
        .with_class_confs(&[opts.confidence])
        .with_model_num_dry_run(2);

    Ok(config.commit()?)
}
