//! PubMed article → [`ArticleRecord`] extraction.
//!
//! Walks one `PubmedArticle` tree, pulls out the bibliographic fields and classifies
//! every author's affiliation. Only the PMID is mandatory; every other field degrades
//! to `None`/empty instead of failing.

use crate::classifier::{AffiliationClassifier, Classification};
use crate::error::{PubmedError, Result};
use crate::xml::XmlNode;
use chrono::{Month, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::LazyLock;
use tracing::debug;

/// First email-like token in free text.
static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\w.+-]+@[\w-]+\.[\w.-]+").expect("email regex is valid")
});

/// Leading `YYYY [Mon]` of a `MedlineDate` such as "2019 Nov-Dec" or "1998 Spring".
static MEDLINE_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d{4})(?:\s+([A-Za-z]+))?").expect("medline date regex is valid")
});

/// Separator used when an author lists several affiliations.
pub const AFFILIATION_SEPARATOR: &str = "; ";

/// One author of an article with the classification of their affiliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorEntry {
    pub name: String,
    pub affiliation_text: Option<String>,
    pub affiliation_classification: Classification,
    pub matched_terms: BTreeSet<String>,
}

/// Normalized article record. Built once by [`RecordExtractor::extract`], never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub pubmed_id: String,
    pub title: String,
    pub abstract_text: Option<String>,
    pub publication_date: Option<String>,
    pub journal: Option<String>,
    pub doi: Option<String>,
    pub authors: Vec<AuthorEntry>,
    pub has_industry_affiliation: bool,
    pub corresponding_email: Option<String>,
}

impl ArticleRecord {
    /// Names of authors whose affiliation was classified as industry.
    pub fn industry_authors(&self) -> Vec<&str> {
        self.authors
            .iter()
            .filter(|a| a.affiliation_classification == Classification::Industry)
            .map(|a| a.name.as_str())
            .filter(|name| !name.is_empty())
            .collect()
    }

    /// Display names of all named authors, in listed order.
    pub fn author_names(&self) -> Vec<&str> {
        self.authors
            .iter()
            .map(|a| a.name.as_str())
            .filter(|name| !name.is_empty())
            .collect()
    }

    /// Distinct industry affiliation texts in first-seen order.
    pub fn company_affiliations(&self) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        self.authors
            .iter()
            .filter(|a| a.affiliation_classification == Classification::Industry)
            .filter_map(|a| a.affiliation_text.as_deref())
            .filter(|text| seen.insert(*text))
            .collect()
    }
}

/// Turns `PubmedArticle` trees into [`ArticleRecord`]s.
#[derive(Debug, Clone)]
pub struct RecordExtractor {
    classifier: AffiliationClassifier,
}

impl RecordExtractor {
    pub fn new(classifier: AffiliationClassifier) -> Self {
        Self { classifier }
    }

    pub fn classifier(&self) -> &AffiliationClassifier {
        &self.classifier
    }

    /// Extract one article.
    ///
    /// # Errors
    ///
    /// [`PubmedError::MalformedRecord`] when the PMID is missing or not numeric.
    pub fn extract(&self, article: &XmlNode) -> Result<ArticleRecord> {
        let pubmed_id = extract_pmid(article)?;

        let citation = article.child("MedlineCitation");
        let article_node = citation.and_then(|c| c.child("Article"));

        let title = article_node
            .and_then(|a| a.child("ArticleTitle"))
            .map(XmlNode::text)
            .unwrap_or_default();

        let abstract_text = article_node.and_then(extract_abstract);

        let publication_date = article_node.and_then(extract_publication_date);

        let journal = article_node
            .and_then(|a| a.path("Journal/Title"))
            .and_then(XmlNode::text_opt);

        let doi = extract_doi(article);

        let authors: Vec<AuthorEntry> = article_node
            .and_then(|a| a.child("AuthorList"))
            .map(|list| {
                list.children_named("Author")
                    .map(|author| self.extract_author(&pubmed_id, author))
                    .collect()
            })
            .unwrap_or_default();

        let corresponding_email = authors
            .iter()
            .filter_map(|a| a.affiliation_text.as_deref())
            .find_map(find_email);

        let has_industry_affiliation = authors
            .iter()
            .any(|a| a.affiliation_classification == Classification::Industry);

        debug!(
            pubmed_id = %pubmed_id,
            authors = authors.len(),
            has_industry_affiliation,
            "Extracted article"
        );

        Ok(ArticleRecord {
            pubmed_id,
            title,
            abstract_text,
            publication_date,
            journal,
            doi,
            authors,
            has_industry_affiliation,
            corresponding_email,
        })
    }

    fn extract_author(&self, pubmed_id: &str, author: &XmlNode) -> AuthorEntry {
        let name = author_display_name(author).unwrap_or_else(|| {
            debug!(pubmed_id, "Author without a name");
            String::new()
        });

        let affiliations: Vec<String> = author
            .path_all("AffiliationInfo/Affiliation")
            .into_iter()
            .filter_map(XmlNode::text_opt)
            .collect();

        let affiliation_text = if affiliations.is_empty() {
            None
        } else {
            Some(affiliations.join(AFFILIATION_SEPARATOR))
        };

        let verdict = self.classifier.classify(affiliation_text.as_deref());

        AuthorEntry {
            name,
            affiliation_text,
            affiliation_classification: verdict.classification,
            matched_terms: verdict.matched_terms,
        }
    }
}

/// `MedlineCitation/PMID`, falling back to `PubmedData/ArticleIdList/ArticleId[@IdType="pubmed"]`.
fn extract_pmid(article: &XmlNode) -> Result<String> {
    let raw = article
        .path("MedlineCitation/PMID")
        .and_then(XmlNode::text_opt)
        .or_else(|| {
            article
                .path_all("PubmedData/ArticleIdList/ArticleId")
                .into_iter()
                .find(|id| id.attr("IdType") == Some("pubmed"))
                .and_then(XmlNode::text_opt)
        });

    match raw {
        None => Err(PubmedError::malformed(None, "missing PMID")),
        Some(id) if id.chars().all(|c| c.is_ascii_digit()) => Ok(id),
        Some(id) => Err(PubmedError::malformed(Some(id), "PMID is not numeric")),
    }
}

/// `Abstract/AbstractText` sections joined with a space; structured sections keep
/// their `Label` as a prefix.
fn extract_abstract(article: &XmlNode) -> Option<String> {
    let sections: Vec<String> = article
        .path_all("Abstract/AbstractText")
        .into_iter()
        .filter_map(|section| {
            let text = section.text_opt()?;
            Some(match section.attr("Label") {
                Some(label) => format!("{}: {}", label, text),
                None => text,
            })
        })
        .collect();

    Some(sections.join(" ")).filter(|text| !text.is_empty())
}

fn extract_doi(article: &XmlNode) -> Option<String> {
    let from_elocation = article
        .path_all("MedlineCitation/Article/ELocationID")
        .into_iter()
        .find(|e| e.attr("EIdType") == Some("doi"))
        .and_then(XmlNode::text_opt);

    from_elocation.or_else(|| {
        article
            .path_all("PubmedData/ArticleIdList/ArticleId")
            .into_iter()
            .find(|id| id.attr("IdType") == Some("doi"))
            .and_then(XmlNode::text_opt)
    })
}

/// Best-effort date from `Journal/JournalIssue/PubDate`, then `ArticleDate`.
///
/// Returns `YYYY`, `YYYY-MM` or `YYYY-MM-DD`; a day is only kept when the full date is
/// valid.
fn extract_publication_date(article: &XmlNode) -> Option<String> {
    let from_pub_date = article
        .path("Journal/JournalIssue/PubDate")
        .and_then(|pub_date| {
            let year = pub_date.child("Year").and_then(XmlNode::text_opt);
            match year {
                Some(year) => format_date(
                    &year,
                    pub_date.child("Month").and_then(XmlNode::text_opt).as_deref(),
                    pub_date.child("Day").and_then(XmlNode::text_opt).as_deref(),
                ),
                None => pub_date
                    .child("MedlineDate")
                    .and_then(XmlNode::text_opt)
                    .and_then(|d| parse_medline_date(&d)),
            }
        });

    from_pub_date.or_else(|| {
        let date = article.child("ArticleDate")?;
        format_date(
            &date.child("Year")?.text(),
            date.child("Month").and_then(XmlNode::text_opt).as_deref(),
            date.child("Day").and_then(XmlNode::text_opt).as_deref(),
        )
    })
}

fn format_date(year: &str, month: Option<&str>, day: Option<&str>) -> Option<String> {
    let year = year.trim();
    if year.len() != 4 || !year.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let Some(month) = month.and_then(parse_month) else {
        return Some(year.to_string());
    };

    let full = day
        .and_then(|d| d.trim().parse::<u32>().ok())
        .and_then(|d| {
            let y: i32 = year.parse().ok()?;
            NaiveDate::from_ymd_opt(y, month, d)
        });

    Some(match full {
        Some(date) => date.format("%Y-%m-%d").to_string(),
        None => format!("{}-{:02}", year, month),
    })
}

/// Numeric ("6", "06") or named ("Jun", "June") month.
fn parse_month(month: &str) -> Option<u32> {
    let month = month.trim();
    if let Ok(n) = month.parse::<u32>() {
        return (1..=12).contains(&n).then_some(n);
    }
    month.parse::<Month>().ok().map(|m| m.number_from_month())
}

fn parse_medline_date(raw: &str) -> Option<String> {
    let caps = MEDLINE_DATE_RE.captures(raw)?;
    let year = caps.get(1)?.as_str();
    format_date(year, caps.get(2).map(|m| m.as_str()), None)
}

/// Display name: "Last Initials", then "Last", then `CollectiveName`, then `ForeName`.
fn author_display_name(author: &XmlNode) -> Option<String> {
    let last = author.child("LastName").and_then(XmlNode::text_opt);
    let fore = author.child("ForeName").and_then(XmlNode::text_opt);

    if let Some(last) = last {
        let initials = author
            .child("Initials")
            .and_then(XmlNode::text_opt)
            .or_else(|| fore.as_deref().and_then(initials_from));
        return Some(match initials {
            Some(initials) => format!("{} {}", last, initials),
            None => last,
        });
    }

    author
        .child("CollectiveName")
        .and_then(XmlNode::text_opt)
        .or(fore)
}

/// "John Paul" → "JP", "Jean-Luc" → "JL".
fn initials_from(fore_name: &str) -> Option<String> {
    let initials: String = fore_name
        .split(|c: char| c.is_whitespace() || c == '-')
        .filter_map(|part| part.chars().find(|c| c.is_alphabetic()))
        .flat_map(char::to_uppercase)
        .collect();
    Some(initials).filter(|i| !i.is_empty())
}

/// First email-like token, with trailing sentence punctuation removed.
pub fn find_email(text: &str) -> Option<String> {
    EMAIL_RE
        .find(text)
        .map(|m| m.as_str().trim_end_matches(['.', '-']).to_string())
        .filter(|email| email.contains('@') && !email.ends_with('@'))
}
