//! # rustpubmed
//!
//! PubMed fetcher that flags papers with pharmaceutical/biotech author affiliations.
//!
//! ## Modules
//!
//! - [`lexicon`] - Academic/industry vocabularies
//! - [`classifier`] - Affiliation classification with evidence
//! - [`xml`] - Owned XML tree and efetch document splitting
//! - [`extractor`] - `PubmedArticle` → [`ArticleRecord`]
//! - [`pipeline`] - Batch processing with per-article failure isolation
//! - [`pubmed`] - E-utilities client (esearch/efetch)
//! - [`export`] - CSV output
//! - [`error`] - Custom error types
//!
//! ## Usage
//!
//! ```rust,no_run
//! use rustpubmed::{pubmed::{FetchOptions, PubmedClient}, Lexicon, AffiliationClassifier, RecordExtractor, Pipeline};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let lexicon = Arc::new(Lexicon::builtin()?);
//!     let pipeline = Pipeline::new(RecordExtractor::new(AffiliationClassifier::new(lexicon)));
//!
//!     let client = PubmedClient::new(None, None)?;
//!     let blobs = client.search("cancer immunotherapy", &FetchOptions::default()).await?;
//!     let records = pipeline.process_batch(&blobs);
//!     println!("{} papers with industry authors", records.iter().filter(|r| r.has_industry_affiliation).count());
//!     Ok(())
//! }
//! ```

pub mod classifier;
pub mod error;
pub mod export;
pub mod extractor;
pub mod lexicon;
pub mod pipeline;
pub mod pubmed;
pub mod xml;

pub use classifier::{AffiliationClassifier, AffiliationVerdict, Classification, TieBreak};
pub use error::{PubmedError, Result};
pub use extractor::{ArticleRecord, AuthorEntry, RecordExtractor};
pub use lexicon::Lexicon;
pub use pipeline::{BatchReport, Pipeline, SkippedArticle};
pub use xml::XmlNode;
