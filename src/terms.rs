//! Search term source
//!
//! Terms come from a CSV file with a `keyword` column, one term per row.
//! The file may be UTF-8 or Windows-1252 (spreadsheet exports); each field is
//! decoded as UTF-8 when valid and as Windows-1252 otherwise. Duplicate and blank keywords are dropped.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::{debug, info};

use crate::error::{HarvestError, Result};

/// Column holding the search keywords
pub const KEYWORD_COLUMN: &str = "keyword";

/// Load the deduplicated set of search terms from a CSV file
pub fn load_terms<P: AsRef<Path>>(path: P) -> Result<BTreeSet<String>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let terms = read_terms(file, &path.display().to_string())?;
    info!(count = terms.len(), path = %path.display(), "Loaded search terms");
    Ok(terms)
}

/// Read search terms from any CSV source
///
/// `source_name` only appears in error messages.
pub fn read_terms<R: Read>(reader: R, source_name: &str) -> Result<BTreeSet<String>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = csv_reader.byte_headers()?.clone();
    let column = headers
        .iter()
        .position(|h| decode_field(h).trim() == KEYWORD_COLUMN)
        .ok_or_else(|| HarvestError::MissingColumn {
            column: KEYWORD_COLUMN.to_string(),
            source_name: source_name.to_string(),
        })?;

    let mut terms = BTreeSet::new();
    for row in csv_reader.byte_records() {
        let row = row?;
        let Some(raw) = row.get(column) else {
            continue;
        };
        let term = decode_field(raw).trim().to_string();
        if term.is_empty() {
            continue;
        }
        if !terms.insert(term.clone()) {
            debug!(term = %term, "Duplicate search term ignored");
        }
    }

    Ok(terms)
}

fn decode_field(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => {
            let (decoded, _) = encoding_rs::WINDOWS_1252.decode_without_bom_handling(bytes);
            decoded.into_owned()
        }
    }
}
