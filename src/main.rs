//! rustpubmed - PubMed fetcher with industry affiliation detection
//!
//! ## Usage
//!
//! ### CLI Mode
//! ```bash
//! rustpubmed search "cancer immunotherapy" -f results.csv
//! rustpubmed parse saved_efetch.xml --industry-only
//! rustpubmed classify "Pfizer Inc., New York, NY"
//! ```
//!
//! ### HTTP Server Mode
//! ```bash
//! rustpubmed serve --port 3000
//! ```

use anyhow::{Context, Result};
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use clap::{Parser, Subcommand};
use rustpubmed::{
    export,
    pubmed::{FetchOptions, PubmedClient},
    AffiliationClassifier, ArticleRecord, BatchReport, Classification, Lexicon, Pipeline,
    RecordExtractor, SkippedArticle, TieBreak,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

/// Fetch papers from PubMed with industry affiliation detection
#[derive(Parser)]
#[command(name = "rustpubmed")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// JSON lexicon override file
    #[arg(long, global = true)]
    lexicon: Option<PathBuf>,

    /// Policy when an affiliation has both academic and industry evidence
    #[arg(
        long,
        global = true,
        default_value = "ambiguous",
        value_parser = ["ambiguous", "prefer-industry", "prefer-academic"]
    )]
    tie_break: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search PubMed and classify author affiliations
    Search {
        /// Search query for PubMed papers
        query: String,

        /// Save results to CSV file
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Show only papers with industry authors
        #[arg(short, long)]
        industry_only: bool,

        /// Maximum number of results to fetch
        #[arg(short, long, default_value = "50")]
        max_results: usize,

        /// PMIDs per esearch request
        #[arg(long, default_value = "100")]
        page_size: usize,

        /// NCBI API key (raises the rate limit)
        #[arg(long, env = "NCBI_API_KEY")]
        api_key: Option<String>,

        /// Contact email sent to NCBI
        #[arg(long, env = "NCBI_EMAIL")]
        email: Option<String>,
    },

    /// Process a saved efetch XML document
    Parse {
        /// efetch XML file (PubmedArticleSet)
        input: PathBuf,

        /// Save results to CSV file
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Show only papers with industry authors
        #[arg(short, long)]
        industry_only: bool,
    },

    /// Classify affiliation strings
    Classify {
        /// Affiliation texts
        #[arg(required = true)]
        affiliations: Vec<String>,
    },

    /// Run as HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .init();

    let pipeline = build_pipeline(cli.lexicon.as_deref(), &cli.tie_break)?;

    match cli.command {
        Commands::Search {
            query,
            file,
            industry_only,
            max_results,
            page_size,
            api_key,
            email,
        } => {
            let options = FetchOptions {
                max_results,
                page_size,
                ..Default::default()
            };
            run_search(&pipeline, &query, &options, api_key, email, file, industry_only).await
        }
        Commands::Parse {
            input,
            file,
            industry_only,
        } => run_parse(&pipeline, &input, file, industry_only),
        Commands::Classify { affiliations } => {
            run_classify(pipeline.extractor().classifier(), &affiliations);
            Ok(())
        }
        Commands::Serve { port, host } => run_server(pipeline, host, port).await,
    }
}

fn build_pipeline(lexicon_path: Option<&Path>, tie_break: &str) -> Result<Pipeline> {
    let lexicon = match lexicon_path {
        Some(path) => Lexicon::from_json_file(path)
            .with_context(|| format!("Failed to load lexicon {}", path.display()))?,
        None => Lexicon::builtin().context("Failed to build builtin lexicon")?,
    };
    let tie_break: TieBreak = tie_break.parse().map_err(anyhow::Error::msg)?;

    let classifier = AffiliationClassifier::new(Arc::new(lexicon)).with_tie_break(tie_break);
    Ok(Pipeline::new(RecordExtractor::new(classifier)))
}

// ============================================================================
// Commands
// ============================================================================

async fn run_search(
    pipeline: &Pipeline,
    query: &str,
    options: &FetchOptions,
    api_key: Option<String>,
    email: Option<String>,
    file: Option<PathBuf>,
    industry_only: bool,
) -> Result<()> {
    let client = PubmedClient::new(api_key, email)?;

    let blobs = client
        .search(query, options)
        .await
        .context("PubMed search failed")?;

    info!(articles = blobs.len(), "Retrieved papers");

    let report = pipeline.run_batch(&blobs);
    finish(report, file, industry_only)
}

fn run_parse(pipeline: &Pipeline, input: &Path, file: Option<PathBuf>, industry_only: bool) -> Result<()> {
    let xml = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;

    let report = pipeline
        .process_xml(&xml)
        .with_context(|| format!("Failed to parse {}", input.display()))?;

    finish(report, file, industry_only)
}

fn finish(report: BatchReport, file: Option<PathBuf>, industry_only: bool) -> Result<()> {
    let records = if industry_only {
        export::industry_only(&report.records)
    } else {
        report.records
    };

    display_papers(&records, industry_only);

    if let Some(path) = &file {
        export::write_csv(path, &records)
            .with_context(|| format!("Failed to save CSV {}", path.display()))?;
    }

    let industry = records.iter().filter(|r| r.has_industry_affiliation).count();
    println!("\nSummary:");
    println!("  Total papers: {}", records.len());
    println!("  Papers with industry authors: {}", industry);
    if !report.skipped.is_empty() {
        println!("  Skipped (malformed): {}", report.skipped.len());
    }
    if let Some(path) = &file {
        println!("  Results saved to: {}", path.display());
    }

    Ok(())
}

fn display_papers(records: &[ArticleRecord], industry_only: bool) {
    if records.is_empty() {
        if industry_only {
            println!("No papers with industry authors found.");
        } else {
            println!("No papers found.");
        }
        return;
    }

    println!("\nFound {} papers:", records.len());
    println!("{}", "=".repeat(80));

    for (i, record) in records.iter().enumerate() {
        println!("\n{}. {}", i + 1, record.title);
        println!("   PMID: {}", record.pubmed_id);
        let authors = record.author_names();
        if !authors.is_empty() {
            println!("   Authors: {}", authors.join(", "));
        }
        println!("   Journal: {}", record.journal.as_deref().unwrap_or("Unknown"));
        println!("   Date: {}", record.publication_date.as_deref().unwrap_or("Unknown"));
        if let Some(doi) = &record.doi {
            println!("   DOI: {}", doi);
        }
        if let Some(email) = &record.corresponding_email {
            println!("   Corresponding Email: {}", email);
        }

        let industry_authors = record.industry_authors();
        if !industry_authors.is_empty() {
            println!("   Industry Authors: {}", industry_authors.join(", "));
            println!("   Industry Affiliations: {}", record.company_affiliations().join(" | "));
        }

        let ambiguous: Vec<&str> = record
            .authors
            .iter()
            .filter(|a| a.affiliation_classification == Classification::Ambiguous)
            .map(|a| a.name.as_str())
            .filter(|name| !name.is_empty())
            .collect();
        if !ambiguous.is_empty() {
            println!("   Ambiguous Affiliations: {}", ambiguous.join(", "));
        }

        println!("{}", "-".repeat(80));
    }
}

fn run_classify(classifier: &AffiliationClassifier, affiliations: &[String]) {
    for text in affiliations {
        let verdict = classifier.classify(Some(text.as_str()));
        let evidence: Vec<&str> = verdict.matched_terms.iter().map(String::as_str).collect();
        println!("{}\t{}\t[{}]", verdict.classification, text, evidence.join(", "));
    }
}

// ============================================================================
// HTTP Server
// ============================================================================

async fn run_server(pipeline: Pipeline, host: String, port: u16) -> Result<()> {
    info!(host = %host, port = port, "Starting HTTP server");

    let app_state = Arc::new(AppState { pipeline });

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/classify", post(classify_handler))
        .route("/extract", post(extract_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .context("Invalid host:port")?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    println!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .await
        .context("Server error")?;

    Ok(())
}

struct AppState {
    pipeline: Pipeline,
}

/// Health check endpoint
async fn health_handler() -> &'static str {
    "OK"
}

/// Classify request body
#[derive(Debug, Deserialize)]
struct ClassifyRequest {
    affiliations: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ClassifyResult {
    affiliation: String,
    classification: Classification,
    matched_terms: BTreeSet<String>,
}

#[derive(Debug, Serialize)]
struct ClassifyResponse {
    results: Vec<ClassifyResult>,
}

/// Classify endpoint handler
async fn classify_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ClassifyRequest>,
) -> Json<ClassifyResponse> {
    let classifier = state.pipeline.extractor().classifier();
    let results = req
        .affiliations
        .into_iter()
        .map(|affiliation| {
            let verdict = classifier.classify(Some(affiliation.as_str()));
            ClassifyResult {
                affiliation,
                classification: verdict.classification,
                matched_terms: verdict.matched_terms,
            }
        })
        .collect();

    Json(ClassifyResponse { results })
}

/// Extract response
#[derive(Debug, Serialize)]
struct ExtractResponse {
    status: String,
    count: usize,
    skipped: Vec<SkippedArticle>,
    records: Vec<ArticleRecord>,
}

/// Extract endpoint handler: body is an efetch XML document
async fn extract_handler(State(state): State<Arc<AppState>>, body: String) -> Json<ExtractResponse> {
    match state.pipeline.process_xml(&body) {
        Ok(report) => Json(ExtractResponse {
            status: "success".to_string(),
            count: report.records.len(),
            skipped: report.skipped,
            records: report.records,
        }),
        Err(e) => {
            error!(error = %e, "Extraction failed");
            Json(ExtractResponse {
                status: format!("error: {}", e),
                count: 0,
                skipped: vec![],
                records: vec![],
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> State<Arc<AppState>> {
        let pipeline = build_pipeline(None, "ambiguous").unwrap();
        State(Arc::new(AppState { pipeline }))
    }

    #[test]
    fn test_build_pipeline_rejects_unknown_policy() {
        assert!(build_pipeline(None, "coin-flip").is_err());
        let pipeline = build_pipeline(None, "prefer-industry").unwrap();
        assert_eq!(
            pipeline.extractor().classifier().tie_break(),
            TieBreak::PreferIndustry
        );
    }

    #[tokio::test]
    async fn test_classify_handler() {
        let req = ClassifyRequest {
            affiliations: vec![
                "Pfizer Inc., New York, NY".to_string(),
                "Department of Biology, Harvard University".to_string(),
            ],
        };
        let Json(resp) = classify_handler(state(), Json(req)).await;
        assert_eq!(resp.results.len(), 2);
        assert_eq!(resp.results[0].classification, Classification::Industry);
        assert_eq!(resp.results[1].classification, Classification::Academic);
    }

    #[tokio::test]
    async fn test_extract_handler() {
        let body = r#"<PubmedArticleSet>
            <PubmedArticle><MedlineCitation><PMID>1</PMID></MedlineCitation></PubmedArticle>
            <PubmedArticle><MedlineCitation/></PubmedArticle>
        </PubmedArticleSet>"#;
        let Json(resp) = extract_handler(state(), body.to_string()).await;
        assert_eq!(resp.status, "success");
        assert_eq!(resp.count, 1);
        assert_eq!(resp.skipped.len(), 1);

        let Json(resp) = extract_handler(state(), "<broken".to_string()).await;
        assert!(resp.status.starts_with("error"));
    }

    #[test]
    fn test_cli_parses_search() {
        let cli = Cli::try_parse_from([
            "rustpubmed",
            "search",
            "covid vaccine",
            "-f",
            "out.csv",
            "-i",
            "-m",
            "20",
            "--tie-break",
            "prefer-academic",
        ])
        .unwrap();
        assert_eq!(cli.tie_break, "prefer-academic");
        match cli.command {
            Commands::Search {
                query,
                file,
                industry_only,
                max_results,
                ..
            } => {
                assert_eq!(query, "covid vaccine");
                assert_eq!(file, Some(PathBuf::from("out.csv")));
                assert!(industry_only);
                assert_eq!(max_results, 20);
            }
            _ => panic!("expected search command"),
        }
    }
}
