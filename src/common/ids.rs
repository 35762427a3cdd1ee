//! Validated PubMed identifiers

use crate::error::{HarvestError, Result};
use rusqlite::ToSql;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use std::fmt;
use std::str::FromStr;

/// A validated PubMed ID (PMID)
///
/// PMIDs are positive integers. They are stored as `INTEGER` columns in the
/// store and travel as strings on the wire.
///
/// # Examples
///
/// ```
/// use pubmed_harvester::PubMedId;
///
/// let pmid = PubMedId::parse("31978945").unwrap();
/// assert_eq!(pmid.as_u32(), 31978945);
///
/// // Whitespace is cleaned
/// let pmid = PubMedId::parse("  31978945\n").unwrap();
/// assert_eq!(pmid.to_string(), "31978945");
///
/// assert!(PubMedId::parse("").is_err());
/// assert!(PubMedId::parse("0").is_err());
/// assert!(PubMedId::parse("PMC123").is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PubMedId {
    value: u32,
}

impl PubMedId {
    /// Parse a PMID from a string, trimming surrounding whitespace
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(HarvestError::InvalidPmid {
                pmid: s.to_string(),
            });
        }

        let value = trimmed
            .parse::<u32>()
            .map_err(|_| HarvestError::InvalidPmid {
                pmid: s.to_string(),
            })?;

        Self::try_from_u32(value).map_err(|_| HarvestError::InvalidPmid {
            pmid: s.to_string(),
        })
    }

    /// Create a PubMedId from a non-zero u32
    pub fn try_from_u32(value: u32) -> Result<Self> {
        if value == 0 {
            return Err(HarvestError::InvalidPmid {
                pmid: value.to_string(),
            });
        }
        Ok(Self { value })
    }

    pub fn as_u32(&self) -> u32 {
        self.value
    }
}

impl fmt::Display for PubMedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl FromStr for PubMedId {
    type Err = HarvestError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<PubMedId> for u32 {
    fn from(pmid: PubMedId) -> Self {
        pmid.value
    }
}

impl ToSql for PubMedId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(i64::from(self.value)))
    }
}

impl FromSql for PubMedId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = i64::column_result(value)?;
        u32::try_from(raw)
            .ok()
            .filter(|v| *v > 0)
            .map(|value| Self { value })
            .ok_or(FromSqlError::OutOfRange(raw))
    }
}
