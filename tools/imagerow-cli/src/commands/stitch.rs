//! Composite images into one strip and save it.

use std::path::PathBuf;

use imagerow_common::config::AppConfig;
use imagerow_render_engine::pipeline::{AcceptOutcome, ExportOutcome, Pipeline};

pub async fn run(files: Vec<PathBuf>, config: AppConfig) -> anyhow::Result<()> {
    let sources = super::read_sources(&files)?;
    let pipeline = Pipeline::from_config(&config);

    println!("Laying out {} image(s)", sources.len());
    let layout = match pipeline.accept(sources).await {
        Ok(AcceptOutcome::Ready(layout)) => layout,
        Ok(other) => anyhow::bail!("Nothing to export ({other:?})"),
        Err(e) => {
            println!("Could not measure every image; re-run with readable files.");
            return Err(e.into());
        }
    };
    println!("  Canvas width: {}", layout.canvas_width);

    match pipeline.export().await? {
        ExportOutcome::Saved(saved) => {
            println!(
                "Export complete: {} ({} bytes)",
                saved.location.display(),
                saved.bytes_written
            );
            Ok(())
        }
        other => anyhow::bail!("Export did not run ({other:?})"),
    }
}
