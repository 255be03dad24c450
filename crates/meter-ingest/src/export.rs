//! Flat CSV export of ingested records

use chrono::{DateTime, Local};
use meter_common::types::{Measurement, CSV_COLUMNS};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{IngestError, Result};

/// Written instead of a table when there is nothing to export
pub const NO_DATA_MARKER: &str = "No measurements available";

/// `device_measurements_<label>_<YYYYmmdd_HHMMSS>.csv`
pub fn default_file_name(label: &str, at: DateTime<Local>) -> String {
    format!(
        "device_measurements_{label}_{}.csv",
        at.format("%Y%m%d_%H%M%S")
    )
}

/// Write records as CSV, header first, in the order given
pub fn write_records<W: Write>(records: &[Measurement], writer: W, sink: &str) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);

    if records.is_empty() {
        csv.write_record([NO_DATA_MARKER])
            .map_err(|e| IngestError::sink_write(sink, e))?;
    } else {
        csv.write_record(CSV_COLUMNS)
            .map_err(|e| IngestError::sink_write(sink, e))?;
        for record in records {
            csv.write_record(record.to_row())
                .map_err(|e| IngestError::sink_write(sink, e))?;
        }
    }

    csv.flush().map_err(|e| IngestError::sink_write(sink, e))
}

/// Export to a file, creating parent directories as needed
pub fn export_csv(records: &[Measurement], path: &Path) -> Result<PathBuf> {
    let sink = path.display().to_string();

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| IngestError::sink_write(&sink, e))?;
    }

    let file = File::create(path).map_err(|e| IngestError::sink_write(&sink, e))?;
    write_records(records, file, &sink)?;

    info!(path = %sink, records = records.len(), "Exported measurements");
    Ok(path.to_path_buf())
}
