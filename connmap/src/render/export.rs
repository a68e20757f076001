//! File export of rendered images and snapshot data.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use image::RgbaImage;
use serde::Serialize;
use thiserror::Error;

use crate::grid::GridDimensions;
use crate::store::{CellCount, GridSnapshot};

/// Errors writing export files.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image encoding failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// JSON document layout.
#[derive(Debug, Serialize)]
struct SnapshotDocument {
    width: u32,
    height: u32,
    total: u64,
    cells: Vec<CellCount>,
}

/// Write an image as PNG, replacing the file atomically.
///
/// The image is written next to `path` and renamed into place, so a viewer
/// polling the file never reads a half-written PNG.
pub fn write_png(image: &RgbaImage, path: &Path) -> Result<(), ExportError> {
    let tmp = path.with_extension("png.tmp");
    image.save_with_format(&tmp, image::ImageFormat::Png)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Write a snapshot as JSON: grid size, total and cells sorted by row, column.
pub fn write_json(
    snapshot: &GridSnapshot,
    dims: GridDimensions,
    path: &Path,
) -> Result<(), ExportError> {
    let document = SnapshotDocument {
        width: dims.width(),
        height: dims.height(),
        total: snapshot.total(),
        cells: snapshot.sorted(),
    };

    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, &document)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridCell;
    use crate::render::{GridRenderer, RenderConfig};

    #[test]
    fn test_write_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        let snapshot: GridSnapshot = vec![(GridCell::new(116, 256), 2), (GridCell::new(1, 1), 1)]
            .into_iter()
            .collect();

        write_json(&snapshot, GridDimensions::default(), &path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["width"], 720);
        assert_eq!(value["total"], 3);
        assert_eq!(value["cells"][0]["column"], 1);
        assert_eq!(value["cells"][1]["count"], 2);
    }

    #[test]
    fn test_write_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.png");
        let renderer = GridRenderer::new(GridDimensions::default(), RenderConfig::default());

        write_png(&renderer.render(&GridSnapshot::default()), &path).unwrap();

        let decoded = image::open(&path).unwrap();
        assert_eq!(decoded.width(), 720);
        assert_eq!(decoded.height(), 360);
        assert!(!path.with_extension("png.tmp").exists());
    }
}
