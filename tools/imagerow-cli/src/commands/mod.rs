pub mod plan;
pub mod stitch;

use std::path::PathBuf;

use imagerow_layout_model::source::SourceFile;

/// Read every file in argument order. Argument order is layout order.
pub fn read_sources(files: &[PathBuf]) -> anyhow::Result<Vec<SourceFile>> {
    files
        .iter()
        .map(|path| {
            SourceFile::read(path)
                .map_err(|e| anyhow::anyhow!("Failed to read {}: {e}", path.display()))
        })
        .collect()
}
