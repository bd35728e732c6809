//! CSV export of result tables

use crate::error::Result;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// A row type of a result table.
///
/// `COLUMNS` lists the serialized field names in declaration order; it is
/// written as the header so that a table without rows still has one.
pub trait TableRow: Serialize {
    const COLUMNS: &'static [&'static str];
}

/// Write rows as CSV under the row type's header
pub fn write_csv_table<S, P>(rows: &[S], path: P) -> Result<()>
where
    S: TableRow,
    P: AsRef<Path>,
{
    let file = File::create(path.as_ref())?;
    write_csv_to(rows, file)
}

/// Same as [`write_csv_table`] into any writer
pub fn write_csv_to<S, W>(rows: &[S], writer: W) -> Result<()>
where
    S: TableRow,
    W: Write,
{
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    wtr.write_record(S::COLUMNS)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}
