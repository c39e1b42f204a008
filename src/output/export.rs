//! Exports of stored recipe URLs

use crate::storage::{RecipeStore, SqliteStorage};
use crate::HarvestError;
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

/// Export file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// One URL per line
    Txt,
    /// A single `url` column with a header row
    Csv,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Txt => "txt",
            Self::Csv => "csv",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "txt" => Ok(Self::Txt),
            "csv" => Ok(Self::Csv),
            other => Err(format!("unsupported export format '{}'", other)),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Writes URLs in the given format
pub fn write_urls<W: Write>(urls: &[String], format: ExportFormat, writer: W) -> Result<(), HarvestError> {
    match format {
        ExportFormat::Txt => {
            let mut writer = writer;
            for url in urls {
                writeln!(writer, "{}", url)?;
            }
            writer.flush()?;
        }
        ExportFormat::Csv => {
            let mut csv_writer = csv::Writer::from_writer(writer);
            csv_writer.write_record(["url"])?;
            for url in urls {
                csv_writer.write_record([url])?;
            }
            csv_writer.flush()?;
        }
    }
    Ok(())
}

/// Exports every stored recipe URL, in discovery order
///
/// Writes to `output` when given, otherwise to stdout. Returns the number of
/// URLs written.
pub fn export_recipes(
    storage: &SqliteStorage,
    format: ExportFormat,
    output: Option<&Path>,
) -> Result<usize, HarvestError> {
    let urls = storage.all_urls()?;

    match output {
        Some(path) => {
            let file = File::create(path)?;
            write_urls(&urls, format, BufWriter::new(file))?;
            tracing::info!("Exported {} recipes to {}", urls.len(), path.display());
        }
        None => {
            let stdout = std::io::stdout();
            write_urls(&urls, format, stdout.lock())?;
        }
    }

    Ok(urls.len())
}
