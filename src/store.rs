//! SQLite reconciliation store
//!
//! Two tables back the harvester:
//!
//! - `searchterms(pmid, searchterm)` records every identifier a term returned.
//! - `pubmeddata(pmid, ...)` holds one flattened record per fetched article.
//!
//! Both are append-only. Inserts use `INSERT OR IGNORE`, so re-running a
//! harvest never duplicates rows or rewrites stored values. Completion is
//! tracked per identifier: once `pubmeddata` has a row for a PMID it is no
//! longer pending under any term.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::OnceLock;

use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, ToSql, params};
use tracing::{debug, info, instrument};

use crate::common::PubMedId;
use crate::error::Result;
use crate::pubmed::record::{ArticleRecord, FIELDS};

/// Name of the search hit table
pub const SEARCH_TERMS_TABLE: &str = "searchterms";

/// Name of the article record table
pub const ARTICLES_TABLE: &str = "pubmeddata";

const SEARCH_TERMS_SCHEMA: &str = "CREATE TABLE IF NOT EXISTS searchterms (
    pmid INTEGER,
    searchterm VARCHAR(100),
    PRIMARY KEY(pmid, searchterm)
);";

fn articles_schema() -> &'static str {
    static SCHEMA: OnceLock<String> = OnceLock::new();
    SCHEMA.get_or_init(|| {
        let mut columns = vec!["    pmid INTEGER".to_string()];
        columns.extend(
            FIELDS
                .iter()
                .map(|spec| format!("    {} {}", spec.column, spec.sql_type)),
        );
        columns.push("    PRIMARY KEY (pmid)".to_string());
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n{}\n);",
            ARTICLES_TABLE,
            columns.join(",\n")
        )
    })
}

fn insert_record_sql() -> &'static str {
    static SQL: OnceLock<String> = OnceLock::new();
    SQL.get_or_init(|| {
        let columns: Vec<&str> = ArticleRecord::column_names().collect();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
        format!(
            "INSERT OR IGNORE INTO {} ({}) VALUES ({})",
            ARTICLES_TABLE,
            columns.join(", "),
            placeholders.join(", ")
        )
    })
}

/// Render a stored SQLite value as text
///
/// `INTEGER` columns hold numeric text as integers, so they come back in
/// canonical form (`"05"` is read as `"5"`).
pub(crate) fn value_to_string(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Integer(i) => i.to_string(),
        Value::Real(f) => f.to_string(),
        Value::Text(s) => s,
        Value::Blob(b) => String::from_utf8_lossy(&b).into_owned(),
    }
}

/// Durable record of search hits and fetched articles
///
/// The store owns its connection; dropping the store (or calling
/// [`ReconciliationStore::close`]) releases it.
pub struct ReconciliationStore {
    conn: Connection,
}

impl ReconciliationStore {
    /// Open (or create) a database file and make sure both tables exist
    ///
    /// Missing parent directories are created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        info!(path = %path.display(), "Opening reconciliation store");
        Self::from_connection(Connection::open(path)?)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let store = Self { conn };
        store.ensure_schema()?;
        Ok(store)
    }

    /// Create both tables if absent. Safe to call repeatedly.
    pub fn ensure_schema(&self) -> Result<()> {
        self.conn.execute_batch(SEARCH_TERMS_SCHEMA)?;
        self.conn.execute_batch(articles_schema())?;
        debug!("Schema ready");
        Ok(())
    }

    /// Record that `identifiers` were returned for `term`
    ///
    /// Pairs that already exist are ignored. All pairs are committed in one
    /// transaction. Returns the number of newly recorded pairs.
    #[instrument(skip(self, identifiers), fields(term = %term, count = identifiers.len()))]
    pub fn record_hits(&mut self, term: &str, identifiers: &[PubMedId]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR IGNORE INTO searchterms (pmid, searchterm) VALUES (?1, ?2)",
            )?;
            for pmid in identifiers {
                inserted += stmt.execute(params![pmid, term])?;
            }
        }
        tx.commit()?;

        debug!(inserted, "Search hits recorded");
        Ok(inserted)
    }

    /// Identifiers hit by `term` that have no stored record yet
    pub fn pending_identifiers(&self, term: &str) -> Result<BTreeSet<PubMedId>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT DISTINCT pmid FROM searchterms
             WHERE searchterm = ?1
               AND pmid NOT IN (SELECT pmid FROM pubmeddata)",
        )?;
        let pending = stmt
            .query_map([term], |row| row.get::<_, PubMedId>(0))?
            .collect::<rusqlite::Result<BTreeSet<_>>>()?;
        Ok(pending)
    }

    /// Store a record unless one already exists for its identifier
    ///
    /// Existing rows are never overwritten. Returns `true` if the record
    /// was inserted.
    #[instrument(skip(self, record), fields(pmid = %record.pmid))]
    pub fn upsert_record(&mut self, record: &ArticleRecord) -> Result<bool> {
        let mut values: Vec<&dyn ToSql> = Vec::with_capacity(FIELDS.len() + 1);
        values.push(&record.pmid);
        values.extend(FIELDS.iter().map(|spec| {
            let value: &dyn ToSql = spec.value_ref(record);
            value
        }));

        let changed = self
            .conn
            .prepare_cached(insert_record_sql())?
            .execute(values.as_slice())?;

        if changed == 0 {
            debug!("Record already stored, leaving it untouched");
        }
        Ok(changed > 0)
    }

    /// Number of distinct identifiers recorded for each term
    pub fn all_search_term_counts(&self) -> Result<BTreeMap<String, u64>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT searchterm, COUNT(DISTINCT pmid) FROM searchterms GROUP BY searchterm",
        )?;
        let counts = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<rusqlite::Result<BTreeMap<_, _>>>()?;
        Ok(counts)
    }

    /// Load a stored record
    pub fn get_record(&self, pmid: PubMedId) -> Result<Option<ArticleRecord>> {
        let columns: Vec<&str> = ArticleRecord::column_names().collect();
        let sql = format!(
            "SELECT {} FROM {} WHERE pmid = ?1",
            columns.join(", "),
            ARTICLES_TABLE
        );

        let record = self
            .conn
            .query_row(&sql, [pmid], |row| {
                let mut record = ArticleRecord::empty(row.get(0)?);
                for (idx, spec) in FIELDS.iter().enumerate() {
                    *spec.slot(&mut record) = value_to_string(row.get::<_, Value>(idx + 1)?);
                }
                Ok(record)
            })
            .optional()?;
        Ok(record)
    }

    /// Number of stored article records
    pub fn record_count(&self) -> Result<u64> {
        self.count("SELECT COUNT(*) FROM pubmeddata")
    }

    /// Number of (identifier, term) pairs
    pub fn hit_count(&self) -> Result<u64> {
        self.count("SELECT COUNT(*) FROM searchterms")
    }

    /// Number of distinct identifiers hit by any term
    pub fn unique_article_count(&self) -> Result<u64> {
        self.count("SELECT COUNT(DISTINCT pmid) FROM searchterms")
    }

    fn count(&self, sql: &str) -> Result<u64> {
        let count: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
        Ok(count as u64)
    }

    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Close the connection, reporting any error SQLite raises on close
    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| e)?;
        Ok(())
    }
}
