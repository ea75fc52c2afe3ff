//! CSV export of recorded entries
//!
//! Produces the `person,year,views` table consumed by downstream analysis,
//! one row per recorded entry, ordered by year then name.

use crate::state::CrawlState;
use crate::ObitError;
use std::borrow::Cow;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub const CSV_HEADER: &str = "person,year,views";

/// Quotes a field when it contains a delimiter, quote or line break
fn quote_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

/// Writes every recorded entry as CSV, returning the number of rows
pub fn write_csv<W: Write>(state: &CrawlState, writer: &mut W) -> std::io::Result<usize> {
    writeln!(writer, "{}", CSV_HEADER)?;
    let rows = state.entries();
    for row in &rows {
        writeln!(writer, "{},{},{}", quote_field(&row.name), row.year, row.views)?;
    }
    Ok(rows.len())
}

/// Exports a crawl state to a CSV file
///
/// Names recorded under more than one year are exported once per year and
/// logged as a warning, since downstream consumers key rows by name.
///
/// # Arguments
///
/// * `state` - The loaded crawl state
/// * `path` - Destination file, overwritten if present
pub fn export_csv(state: &CrawlState, path: &Path) -> Result<usize, ObitError> {
    let duplicates = state.duplicate_names();
    for (name, years) in &duplicates {
        tracing::warn!("{} is recorded under several years: {:?}", name, years);
    }

    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    let rows = write_csv(state, &mut writer)?;
    writer.flush()?;

    tracing::info!("Exported {} rows to {}", rows, path.display());
    Ok(rows)
}
