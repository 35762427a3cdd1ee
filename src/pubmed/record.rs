//! Flat article record and its column/tag table
//!
//! Every EFetch element the harvester keeps maps to exactly one column of the
//! `pubmeddata` table. The table below is the single source of truth for the
//! column order, the XML tag a column is filled from, and which columns are
//! restricted to ASCII.

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::common::PubMedId;

/// One column of the flat schema
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    /// Column name in `pubmeddata`
    pub column: &'static str,
    /// EFetch XML tag the value is taken from
    pub tag: &'static str,
    /// SQL type used in the table definition
    pub sql_type: &'static str,
    /// Drop non-ASCII characters from the value
    pub ascii_only: bool,
    get: fn(&ArticleRecord) -> &String,
    get_mut: fn(&mut ArticleRecord) -> &mut String,
}

impl FieldSpec {
    /// Position in [`FIELDS`] of the column filled by an XML tag
    pub fn index_for_tag(tag: &str) -> Option<usize> {
        static BY_TAG: OnceLock<HashMap<&'static str, usize>> = OnceLock::new();
        BY_TAG
            .get_or_init(|| {
                FIELDS
                    .iter()
                    .enumerate()
                    .map(|(idx, spec)| (spec.tag, idx))
                    .collect()
            })
            .get(tag)
            .copied()
    }

    pub(crate) fn value_ref<'a>(&self, record: &'a ArticleRecord) -> &'a String {
        (self.get)(record)
    }

    /// Normalise raw element text the way this column stores it
    pub fn normalize(&self, raw: &str) -> String {
        let trimmed = raw.trim();
        if self.ascii_only {
            trimmed.chars().filter(char::is_ascii).collect()
        } else {
            trimmed.to_string()
        }
    }

    pub(crate) fn slot<'a>(&self, record: &'a mut ArticleRecord) -> &'a mut String {
        (self.get_mut)(record)
    }
}

macro_rules! article_record {
    ($( $(#[$doc:meta])* $field:ident: $column:literal <= $tag:literal, $sql_type:literal, $ascii:literal; )*) => {
        /// Flattened metadata for one PubMed article
        ///
        /// All text columns are always present; a field missing from the
        /// source document is an empty string.
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct ArticleRecord {
            /// PubMed ID, primary key
            pub pmid: PubMedId,
            $( $(#[$doc])* pub $field: String, )*
        }

        impl ArticleRecord {
            /// A record with every text column empty
            pub fn empty(pmid: PubMedId) -> Self {
                Self {
                    pmid,
                    $( $field: String::new(), )*
                }
            }
        }

        /// Text columns of `pubmeddata`, in table order (after `pmid`)
        pub static FIELDS: &[FieldSpec] = &[
            $(
                FieldSpec {
                    column: $column,
                    tag: $tag,
                    sql_type: $sql_type,
                    ascii_only: $ascii,
                    get: |record| &record.$field,
                    get_mut: |record| &mut record.$field,
                },
            )*
        ];
    };
}

article_record! {
    pubmed_article_set: "pubmedarticleset" <= "PubmedArticleSet", "VARCHAR(10)", false;
    pubmed_article: "pubmedarticle" <= "PubmedArticle", "VARCHAR(10)", false;
    medline_citation: "medlinecitation" <= "MedlineCitation", "VARCHAR(100)", false;
    date_revised: "daterevised" <= "DateRevised", "VARCHAR(10)", false;
    /// Year of the last date element seen (revision, publication, or history)
    year: "year" <= "Year", "INTEGER", false;
    month: "month" <= "Month", "INTEGER", false;
    day: "day" <= "Day", "INTEGER", false;
    article: "article" <= "Article", "VARCHAR(100)", false;
    journal: "journal" <= "Journal", "VARCHAR(50)", false;
    issn: "issn" <= "ISSN", "VARCHAR(10)", false;
    journal_issue: "journalissue" <= "JournalIssue", "VARCHAR(10)", false;
    pub_date: "pubdate" <= "PubDate", "VARCHAR(10)", false;
    /// Journal title
    title: "title" <= "Title", "VARCHAR(100)", false;
    iso_abbreviation: "isoabbreviation" <= "ISOAbbreviation", "VARCHAR(50)", false;
    /// Article title, ASCII only
    article_title: "articletitle" <= "ArticleTitle", "VARCHAR(100)", true;
    elocation_id: "elocationid" <= "ELocationID", "VARCHAR(20)", false;
    r#abstract: "abstract" <= "Abstract", "VARCHAR(1000)", false;
    /// Abstract body, ASCII only
    abstract_text: "abstracttext" <= "AbstractText", "VARCHAR(1000)", true;
    author_list: "authorlist" <= "AuthorList", "VARCHAR(200)", false;
    author: "author" <= "Author", "VARCHAR(100)", false;
    last_name: "lastname" <= "LastName", "VARCHAR(20)", false;
    fore_name: "forename" <= "ForeName", "VARCHAR(20)", false;
    initials: "initials" <= "Initials", "VARCHAR(5)", false;
    affiliation_info: "affiliationinfo" <= "AffiliationInfo", "VARCHAR(30)", false;
    affiliation: "affiliation" <= "Affiliation", "VARCHAR(50)", false;
    language: "language" <= "Language", "VARCHAR(5)", false;
    publication_type_list: "publicationtypelist" <= "PublicationTypeList", "VARCHAR(10)", false;
    publication_type: "publicationtype" <= "PublicationType", "VARCHAR(10)", false;
    article_date: "articledate" <= "ArticleDate", "VARCHAR(10)", false;
    medline_journal_info: "medlinejournalinfo" <= "MedlineJournalInfo", "VARCHAR(20)", false;
    country: "country" <= "Country", "VARCHAR(25)", false;
    medline_ta: "medlineta" <= "MedlineTA", "VARCHAR(25)", false;
    nlm_unique_id: "nlmuniqueid" <= "NlmUniqueID", "INTEGER", false;
    issn_linking: "issnlinking" <= "ISSNLinking", "VARCHAR(9)", false;
    pubmed_data: "pubmeddata" <= "PubmedData", "VARCHAR(20)", false;
    history: "history" <= "History", "VARCHAR(10)", false;
    pubmed_pub_date: "pubmedpubdate" <= "PubMedPubDate", "VARCHAR(10)", false;
    hour: "hour" <= "Hour", "INTEGER", false;
    minute: "minute" <= "Minute", "INTEGER", false;
    publication_status: "publicationstatus" <= "PublicationStatus", "VARCHAR(15)", false;
    article_id_list: "articleidlist" <= "ArticleIdList", "VARCHAR(10)", false;
    /// Last article identifier seen (typically the DOI or PII)
    article_id: "articleid" <= "ArticleId", "VARCHAR(30)", false;
}

impl ArticleRecord {
    /// All column names of `pubmeddata`, `pmid` first
    pub fn column_names() -> impl Iterator<Item = &'static str> {
        std::iter::once("pmid").chain(FIELDS.iter().map(|spec| spec.column))
    }

    fn values(&self) -> impl Iterator<Item = &str> {
        FIELDS.iter().map(move |spec| spec.value_ref(self).as_str())
    }

    /// True when no text column carries a value
    pub fn is_blank(&self) -> bool {
        self.values().all(str::is_empty)
    }
}
