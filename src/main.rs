use std::path::PathBuf;

use anyhow::Context;
use log::info;
use survey_pipeline::{ConsolePresenter, CsvPresenter, Pipeline, PipelineConfig};

fn main() -> anyhow::Result<()> {
    // Setup logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => PipelineConfig::from_json_file(&path)
            .with_context(|| format!("Failed to read configuration from {}", path.display()))?,
        None => PipelineConfig::default(),
    }
    .with_env_overrides();
    info!("{config}");

    let pipeline = Pipeline::new(config);
    let output = pipeline.run().context("Survey pipeline failed")?;

    output.present(&ConsolePresenter, pipeline.config())?;
    if let Some(dir) = &pipeline.config().output_dir {
        output
            .present(&CsvPresenter::new(dir), pipeline.config())
            .with_context(|| format!("Failed to write summaries to {}", dir.display()))?;
    }

    println!("{}", output.report);
    Ok(())
}
