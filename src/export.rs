//! CSV export of the reconciliation store
//!
//! Each table is written to `<dir>/<table>.csv` with a header row. Rows are
//! read in pages so large tables never sit in memory at once.

use std::path::{Path, PathBuf};

use rusqlite::types::Value;
use tracing::{debug, info, instrument};

use crate::error::Result;
use crate::store::{ARTICLES_TABLE, ReconciliationStore, SEARCH_TERMS_TABLE, value_to_string};

/// Rows read from SQLite per page
pub const EXPORT_CHUNK_SIZE: usize = 10_000;

/// Export both store tables as CSV files into `dir`
///
/// The directory is created if needed. Returns the written paths in table
/// order (`searchterms`, then `pubmeddata`).
pub fn export_tables<P: AsRef<Path>>(store: &ReconciliationStore, dir: P) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;

    let mut written = Vec::new();
    for table in [SEARCH_TERMS_TABLE, ARTICLES_TABLE] {
        let path = dir.join(format!("{}.csv", table));
        let rows = export_table(store, table, &path)?;
        info!(table, rows, path = %path.display(), "Exported table");
        written.push(path);
    }
    Ok(written)
}

#[instrument(skip(store, path), fields(table = %table))]
fn export_table(store: &ReconciliationStore, table: &str, path: &Path) -> Result<usize> {
    let conn = store.connection();
    let mut writer = csv::Writer::from_path(path)?;

    let sql = format!("SELECT * FROM {} ORDER BY rowid LIMIT ?1 OFFSET ?2", table);
    let mut stmt = conn.prepare(&sql)?;
    let headers: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
    writer.write_record(&headers)?;

    let mut offset = 0usize;
    loop {
        let page = stmt
            .query_map([EXPORT_CHUNK_SIZE as i64, offset as i64], |row| {
                (0..headers.len())
                    .map(|idx| row.get::<_, Value>(idx).map(value_to_string))
                    .collect::<rusqlite::Result<Vec<String>>>()
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        for record in &page {
            writer.write_record(record)?;
        }

        offset += page.len();
        debug!(offset, "Exported page");
        if page.len() < EXPORT_CHUNK_SIZE {
            break;
        }
    }

    writer.flush()?;
    Ok(offset)
}
