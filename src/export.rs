use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::info;

use crate::error::ExportError;
use crate::log::LogRecord;

/// Write `records` to `path` as an indented JSON array. Returns the row count.
pub fn export_json(records: &[LogRecord], path: &Path) -> Result<usize, ExportError> {
    let io_err = |source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = File::create(path).map_err(io_err)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, records).map_err(|source| ExportError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    writer.write_all(b"\n").map_err(io_err)?;
    writer.flush().map_err(io_err)?;

    info!(rows = records.len(), path = %path.display(), "exported logs");
    Ok(records.len())
}
