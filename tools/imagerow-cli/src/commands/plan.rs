//! Show the layout of a set of images.

use std::path::PathBuf;

use imagerow_common::config::AppConfig;
use imagerow_render_engine::pipeline::{AcceptOutcome, Pipeline};

pub async fn run(files: Vec<PathBuf>, config: AppConfig, json: bool) -> anyhow::Result<()> {
    let sources = super::read_sources(&files)?;
    let pipeline = Pipeline::from_config(&config);

    let layout = match pipeline.accept(sources).await? {
        AcceptOutcome::Ready(layout) => layout,
        other => anyhow::bail!("Nothing to lay out ({other:?})"),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&layout)?);
        return Ok(());
    }

    println!("Batch {}: {} image(s)", layout.batch, layout.items.len());
    for item in &layout.items {
        println!(
            "  [{}] {}  width={}  x={}",
            item.id, item.name, item.width, item.x_offset
        );
    }
    println!("Canvas width: {}", layout.canvas_width);

    Ok(())
}
