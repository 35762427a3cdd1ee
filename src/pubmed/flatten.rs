//! Projection of EFetch XML onto the flat [`ArticleRecord`] schema
//!
//! The walk itself knows nothing about PubMed: [`collect_elements`] turns any
//! XML document into a document-ordered list of `(tag, own text)` pairs, and
//! [`Flattener`] applies the tag→column table from [`super::record`] to it.

use quick_xml::Reader;
use quick_xml::events::Event;
use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, instrument, warn};

use crate::common::PubMedId;
use crate::error::{HarvestError, Result};
use crate::pubmed::record::{ArticleRecord, FIELDS, FieldSpec};

/// How repeated tags are resolved onto a single column
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OccurrencePolicy {
    /// The first non-empty occurrence in document order is kept
    FirstWins,
    /// Each occurrence overwrites the previous one
    #[default]
    LastWins,
}

/// An element in document (pre-)order with its own text content
///
/// `text` is `None` when the element contains no character data of its own,
/// which is different from containing only whitespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    pub tag: String,
    pub text: Option<String>,
}

/// Strip inline formatting tags (`<i>`, `<sup>`, ...) so their text stays
/// part of the enclosing element.
pub(crate) fn strip_inline_html_tags(xml: &str) -> String {
    static INLINE_TAG_REGEX: OnceLock<Regex> = OnceLock::new();
    let re = INLINE_TAG_REGEX.get_or_init(|| {
        Regex::new(r"</?(?:i|b|u|sup|sub|em|strong|italic|bold)>")
            .expect("Failed to compile inline tag regex")
    });

    let cleaned = re.replace_all(xml, "");
    if cleaned.len() != xml.len() {
        debug!(
            removed_bytes = xml.len() - cleaned.len(),
            "Stripped inline HTML tags"
        );
    }
    cleaned.into_owned()
}

/// Walk an XML document and list every element with its direct text.
///
/// Elements are returned in the order their start tags appear. Text of
/// nested children is not included in the parent's text.
pub fn collect_elements(xml: &str) -> Result<Vec<XmlElement>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().expand_empty_elements = true;

    let mut elements: Vec<XmlElement> = Vec::new();
    // Indices into `elements` for the currently open elements
    let mut open: Vec<usize> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                open.push(elements.len());
                elements.push(XmlElement { tag, text: None });
            }
            Ok(Event::End(_)) => {
                open.pop();
            }
            Ok(Event::Text(e)) => {
                let text = e
                    .unescape()
                    .map_err(|err| HarvestError::XmlError(err.to_string()))?;
                append_text(&mut elements, &open, &text);
            }
            Ok(Event::CData(e)) => {
                let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                append_text(&mut elements, &open, &text);
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(HarvestError::XmlError(format!(
                    "error at position {}: {}",
                    reader.buffer_position(),
                    e
                )));
            }
            _ => {}
        }
    }

    if !open.is_empty() {
        return Err(HarvestError::XmlError(format!(
            "document ended with {} unclosed element(s)",
            open.len()
        )));
    }

    Ok(elements)
}

fn append_text(elements: &mut [XmlElement], open: &[usize], text: &str) {
    // Character data outside the root element is ignored
    if let Some(&idx) = open.last() {
        elements[idx]
            .text
            .get_or_insert_with(String::new)
            .push_str(text);
    }
}

/// Flattens EFetch documents into [`ArticleRecord`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct Flattener {
    policy: OccurrencePolicy,
}

impl Flattener {
    pub fn new(policy: OccurrencePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> OccurrencePolicy {
        self.policy
    }

    /// Flatten a document, failing on malformed XML
    ///
    /// The record's `pmid` is always the requested identifier; `PMID`
    /// elements inside the document are not consulted because comment and
    /// correction lists carry other articles' PMIDs.
    ///
    /// # Example
    ///
    /// ```
    /// use pubmed_harvester::{Flattener, PubMedId};
    ///
    /// let xml = "<PubmedArticleSet><PubmedArticle><MedlineCitation>\
    ///            <Article><ArticleTitle> X </ArticleTitle></Article>\
    ///            </MedlineCitation></PubmedArticle></PubmedArticleSet>";
    /// let pmid = PubMedId::parse("100").unwrap();
    /// let record = Flattener::default().flatten(pmid, xml).unwrap();
    ///
    /// assert_eq!(record.article_title, "X");
    /// assert_eq!(record.abstract_text, "");
    /// ```
    pub fn flatten(&self, pmid: PubMedId, xml: &str) -> Result<ArticleRecord> {
        let cleaned = strip_inline_html_tags(xml);
        let elements = collect_elements(&cleaned)?;
        Ok(self.project(pmid, &elements))
    }

    /// Flatten a document, degrading to an all-empty record on malformed input
    #[instrument(skip(self, xml), fields(pmid = %pmid, xml_size = xml.len()))]
    pub fn flatten_lossy(&self, pmid: PubMedId, xml: &str) -> ArticleRecord {
        if xml.trim().is_empty() {
            warn!("Empty EFetch response, storing blank record");
            return ArticleRecord::empty(pmid);
        }

        match self.flatten(pmid, xml) {
            Ok(record) => {
                if record.is_blank() {
                    warn!("EFetch response contained no known fields");
                }
                record
            }
            Err(e) => {
                warn!(error = %e, "Malformed EFetch response, storing blank record");
                ArticleRecord::empty(pmid)
            }
        }
    }

    /// Apply the tag→column table to a list of elements
    pub fn project(&self, pmid: PubMedId, elements: &[XmlElement]) -> ArticleRecord {
        let mut record = ArticleRecord::empty(pmid);
        let mut filled = vec![false; FIELDS.len()];

        for element in elements {
            let Some(text) = element.text.as_deref() else {
                continue;
            };
            let Some(idx) = FieldSpec::index_for_tag(&element.tag) else {
                continue;
            };
            let spec = &FIELDS[idx];

            let value = spec.normalize(text);
            match self.policy {
                // A column only counts as set once it holds a non-empty value
                OccurrencePolicy::FirstWins => {
                    if filled[idx] || value.is_empty() {
                        continue;
                    }
                    filled[idx] = true;
                }
                OccurrencePolicy::LastWins => {}
            }

            *spec.slot(&mut record) = value;
        }

        record
    }
}
