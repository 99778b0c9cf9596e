//! CSV output for article records.
//!
//! Flattens each [`ArticleRecord`] into one row: authors become a `; `-joined display
//! string and the industry flag a `yes`/`no` column.

use crate::error::Result;
use crate::extractor::ArticleRecord;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tracing::info;

/// CSV column order
pub const CSV_COLUMNS: &[&str] = &[
    "PubmedID",
    "Title",
    "Publication Date",
    "Authors",
    "Non-academic Author(s)",
    "Company Affiliation(s)",
    "Industry Affiliation",
    "Corresponding Author Email",
];

/// One flattened CSV row
#[derive(Debug, Serialize)]
pub struct ArticleRow<'a> {
    #[serde(rename = "PubmedID")]
    pub pubmed_id: &'a str,
    #[serde(rename = "Title")]
    pub title: &'a str,
    #[serde(rename = "Publication Date")]
    pub publication_date: &'a str,
    #[serde(rename = "Authors")]
    pub authors: String,
    #[serde(rename = "Non-academic Author(s)")]
    pub industry_authors: String,
    #[serde(rename = "Company Affiliation(s)")]
    pub company_affiliations: String,
    #[serde(rename = "Industry Affiliation")]
    pub industry_affiliation: &'static str,
    #[serde(rename = "Corresponding Author Email")]
    pub corresponding_email: &'a str,
}

impl<'a> From<&'a ArticleRecord> for ArticleRow<'a> {
    fn from(record: &'a ArticleRecord) -> Self {
        Self {
            pubmed_id: &record.pubmed_id,
            title: &record.title,
            publication_date: record.publication_date.as_deref().unwrap_or_default(),
            authors: record.author_names().join("; "),
            industry_authors: record.industry_authors().join("; "),
            company_affiliations: record.company_affiliations().join(" | "),
            industry_affiliation: if record.has_industry_affiliation { "yes" } else { "no" },
            corresponding_email: record.corresponding_email.as_deref().unwrap_or_default(),
        }
    }
}

/// Only the records with at least one industry-affiliated author.
pub fn industry_only(records: &[ArticleRecord]) -> Vec<ArticleRecord> {
    records
        .iter()
        .filter(|r| r.has_industry_affiliation)
        .cloned()
        .collect()
}

/// Write records as CSV (header always included) to any writer.
pub fn write_records<W: Write>(writer: W, records: &[ArticleRecord]) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(writer);

    wtr.write_record(CSV_COLUMNS)?;
    for record in records {
        wtr.serialize(ArticleRow::from(record))?;
    }

    wtr.flush()?;
    Ok(())
}

/// Write records to a CSV file, creating parent directories as needed.
pub fn write_csv(path: &Path, records: &[ArticleRecord]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let file = std::fs::File::create(path)?;
    write_records(file, records)?;

    info!(path = %path.display(), records = records.len(), "Wrote CSV");
    Ok(())
}
