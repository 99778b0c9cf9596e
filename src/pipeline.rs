//! Batch coordinator: blobs in, ordered records out.
//!
//! Each article is extracted independently. A malformed article is logged and
//! recorded as a [`SkippedArticle`]; it never aborts the batch.

use crate::error::{PubmedError, Result};
use crate::extractor::{ArticleRecord, RecordExtractor};
use crate::xml::{split_articles, XmlNode};
use serde::Serialize;
use tracing::{info, warn};

/// An article that was dropped from a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedArticle {
    /// Position of the blob in the input batch
    pub index: usize,
    /// PMID text when one was present but rejected
    pub pubmed_id: Option<String>,
    pub reason: String,
}

/// Records in input order plus the skipped articles.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub records: Vec<ArticleRecord>,
    pub skipped: Vec<SkippedArticle>,
}

/// Runs the extractor over batches of article blobs.
#[derive(Debug, Clone)]
pub struct Pipeline {
    extractor: RecordExtractor,
}

impl Pipeline {
    pub fn new(extractor: RecordExtractor) -> Self {
        Self { extractor }
    }

    pub fn extractor(&self) -> &RecordExtractor {
        &self.extractor
    }

    /// Extract every blob, keeping input order and dropping malformed ones.
    pub fn process_batch(&self, blobs: &[XmlNode]) -> Vec<ArticleRecord> {
        self.run_batch(blobs).records
    }

    /// [`Pipeline::process_batch`] that also reports what was skipped.
    pub fn run_batch(&self, blobs: &[XmlNode]) -> BatchReport {
        let mut report = BatchReport {
            records: Vec::with_capacity(blobs.len()),
            skipped: Vec::new(),
        };

        for (index, blob) in blobs.iter().enumerate() {
            match self.extractor.extract(blob) {
                Ok(record) => report.records.push(record),
                Err(PubmedError::MalformedRecord { pubmed_id, reason }) => {
                    warn!(
                        index,
                        pubmed_id = pubmed_id.as_deref().unwrap_or(""),
                        reason = %reason,
                        "Skipping malformed article"
                    );
                    report.skipped.push(SkippedArticle {
                        index,
                        pubmed_id,
                        reason,
                    });
                }
                Err(e) => {
                    warn!(index, error = %e, "Skipping article after extraction error");
                    report.skipped.push(SkippedArticle {
                        index,
                        pubmed_id: None,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let industry = report
            .records
            .iter()
            .filter(|r| r.has_industry_affiliation)
            .count();
        info!(
            total = blobs.len(),
            extracted = report.records.len(),
            skipped = report.skipped.len(),
            industry,
            "Batch processed"
        );

        report
    }

    /// Split an efetch XML document into articles and run them as one batch.
    ///
    /// # Errors
    ///
    /// Only when the document as a whole is not well-formed XML.
    pub fn process_xml(&self, document: &str) -> Result<BatchReport> {
        let blobs = split_articles(document)?;
        Ok(self.run_batch(&blobs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::AffiliationClassifier;
    use crate::lexicon::Lexicon;
    use std::sync::Arc;

    fn pipeline() -> Pipeline {
        let lexicon = Arc::new(Lexicon::builtin().unwrap());
        Pipeline::new(RecordExtractor::new(AffiliationClassifier::new(lexicon)))
    }

    fn blob(pmid: Option<&str>, affiliation: &str) -> XmlNode {
        let pmid = pmid.map(|p| format!("<PMID>{}</PMID>", p)).unwrap_or_default();
        XmlNode::parse(&format!(
            r#"<PubmedArticle><MedlineCitation>{pmid}<Article>
                 <ArticleTitle>Title {affiliation}</ArticleTitle>
                 <AuthorList><Author><LastName>Lee</LastName><Initials>K</Initials>
                   <AffiliationInfo><Affiliation>{affiliation}</Affiliation></AffiliationInfo>
                 </Author></AuthorList>
               </Article></MedlineCitation></PubmedArticle>"#
        ))
        .unwrap()
    }

    #[test]
    fn test_malformed_blob_is_skipped_in_order() {
        let blobs = vec![
            blob(Some("1"), "Pfizer Inc., New York, NY"),
            blob(None, "Harvard University"),
            blob(Some("3"), "Department of Biology, Harvard University"),
        ];

        let report = pipeline().run_batch(&blobs);

        let ids: Vec<&str> = report.records.iter().map(|r| r.pubmed_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);
        assert!(report.records[0].has_industry_affiliation);
        assert!(!report.records[1].has_industry_affiliation);

        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].index, 1);
        assert_eq!(report.skipped[0].pubmed_id, None);
    }

    #[test]
    fn test_process_batch_matches_individual_extraction() {
        let p = pipeline();
        let blobs = vec![
            blob(Some("10"), "Novartis Institutes for BioMedical Research"),
            blob(Some("bad"), "Roche, Basel"),
            blob(Some("12"), "Roche, Basel"),
        ];

        let records = p.process_batch(&blobs);
        assert!(records.len() <= blobs.len());
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], p.extractor().extract(&blobs[0]).unwrap());
        assert_eq!(records[1], p.extractor().extract(&blobs[2]).unwrap());
    }

    #[test]
    fn test_empty_batch() {
        let report = pipeline().run_batch(&[]);
        assert!(report.records.is_empty());
        assert!(report.skipped.is_empty());
    }

    #[test]
    fn test_process_xml() {
        let document = r#"<PubmedArticleSet>
            <PubmedArticle><MedlineCitation><PMID>5</PMID></MedlineCitation></PubmedArticle>
            <PubmedArticle><MedlineCitation></MedlineCitation></PubmedArticle>
        </PubmedArticleSet>"#;
        let report = pipeline().process_xml(document).unwrap();
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.skipped.len(), 1);

        assert!(pipeline().process_xml("<PubmedArticleSet>").is_err());
    }
}
