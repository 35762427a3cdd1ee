//! PubMed E-utilities access: keyword search, detail fetch, and flattening
//!
//! - `client` - HTTP transport, ESearch term search, EFetch detail retrieval
//! - `flatten` - generic XML walk and tag→column projection
//! - `record` - the flat `ArticleRecord` and its column table
//! - `responses` - ESearch JSON response types

pub mod client;
pub mod flatten;
pub mod record;
pub mod responses;

pub use client::PubMedClient;
pub use flatten::{Flattener, OccurrencePolicy, XmlElement, collect_elements};
pub use record::{ArticleRecord, FIELDS, FieldSpec};
