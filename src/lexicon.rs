//! Affiliation vocabularies.
//!
//! A [`Lexicon`] holds the term lists the classifier matches against. It is built once
//! at startup (either [`Lexicon::builtin`] or a JSON override file) and shared read-only
//! behind an `Arc`.

use crate::error::{PubmedError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Markers of universities, hospitals and public bodies.
const ACADEMIC_TERMS: &[&str] = &[
    "university",
    "universite",
    "universidad",
    "universita",
    "universitat",
    "college",
    "institute",
    "institut",
    "school",
    "academy",
    "hospital",
    "medical center",
    "medical centre",
    "foundation",
    "government",
    "ministry",
    "department of",
    "faculty of",
    "national institute",
    "centre national",
    "world health organization",
    "who",
    "nih",
    "nsf",
    "nci",
    "cdc",
    "fda",
    "inserm",
    "cnrs",
];

/// Academic markers that must match as whole words ("clinic" but not "clinical"), as
/// (evidence label, case-insensitive regex).
const ACADEMIC_PATTERNS: &[(&str, &str)] = &[("clinic", r"\bclinics?\b")];

/// Generic commercial markers.
const INDUSTRY_TERMS: &[&str] = &[
    "pharma",
    "biotech",
    "biotechnology",
    "pharmaceutical",
    "biopharmaceutical",
    "inc.",
    "ltd.",
    "corporation",
    "corp.",
    "company",
    "co.",
    "limited",
    "llc",
    "l.l.c.",
];

/// Known pharmaceutical, biotech and life-science tooling companies.
const COMPANY_NAMES: &[&str] = &[
    "Novartis",
    "Pfizer",
    "Merck",
    "Johnson & Johnson",
    "Janssen",
    "Roche",
    "Hoffmann-La Roche",
    "AstraZeneca",
    "Astra",
    "Zeneca",
    "Bristol-Myers Squibb",
    "Bristol Myers Squibb",
    "Eli Lilly",
    "Sanofi",
    "Gilead",
    "Amgen",
    "Biogen",
    "Genentech",
    "Regeneron",
    "Moderna",
    "BioNTech",
    "GlaxoSmithKline",
    "GSK",
    "AbbVie",
    "Takeda",
    "Bayer",
    "Boehringer Ingelheim",
    "Boehringer",
    "Abbott",
    "Medtronic",
    "Baxter",
    "Thermo Fisher",
    "Illumina",
    "Qiagen",
    "Agilent",
    "PerkinElmer",
    "Novo Nordisk",
    "Vertex",
    "Daiichi Sankyo",
    "Astellas",
];

/// Legal-entity suffixes as (evidence label, case-insensitive regex).
const LEGAL_SUFFIXES: &[(&str, &str)] = &[
    ("Inc.", r"\binc\b\.?"),
    ("Ltd.", r"\bltd\b\.?"),
    ("LLC", r"\bl\.?l\.?c\b\.?"),
    ("Corp.", r"\bcorp\b\.?"),
    ("Co., Ltd.", r"\bco\.?\s+ltd\b"),
    ("GmbH", r"\bgmbh\b"),
    ("AG", r"\bag$"),
    ("KGaA", r"\bkgaa\b"),
    ("S.A.", r"\bs\.a\.(?:\s|$)"),
    ("S.p.A.", r"\bs\.p\.a\.?(?:\s|$)"),
    ("S.r.l.", r"\bs\.r\.l\.?(?:\s|$)"),
    ("B.V.", r"\bb\.v\.?(?:\s|$)"),
    ("N.V.", r"\bn\.v\.?(?:\s|$)"),
    ("K.K.", r"\bk\.k\.?(?:\s|$)"),
    ("PLC", r"\bplc\b"),
    ("Pty", r"\bpty\b"),
];

/// Descriptive company-name shapes ("Acme Therapeutics"). These are weak signals and
/// only count when no other evidence was found.
const INDUSTRY_NAME_PATTERNS: &[(&str, &str)] = &[
    ("Therapeutics", r"\b\w+\s+therapeutics\b"),
    ("Sciences", r"\b\w+\s+sciences\b"),
    ("Technologies", r"\b\w+\s+technologies\b"),
    ("Solutions", r"\b\w+\s+solutions\b"),
    ("Partners", r"\b\w+\s+partners\b"),
    ("Research", r"\b\w+\s+research\b"),
];

/// A pattern together with the label reported as evidence when it matches.
#[derive(Debug, Clone)]
pub struct LabeledPattern {
    pub label: String,
    pub regex: Regex,
}

impl LabeledPattern {
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

/// Read-only classification vocabularies.
///
/// Terms are stored lowercase; company names keep their display casing and are matched
/// case-insensitively as whole words.
#[derive(Debug, Clone)]
pub struct Lexicon {
    pub academic_terms: Vec<String>,
    pub academic_patterns: Vec<LabeledPattern>,
    pub industry_terms: Vec<String>,
    pub company_names: Vec<String>,
    pub legal_suffix_patterns: Vec<LabeledPattern>,
    pub industry_name_patterns: Vec<LabeledPattern>,
}

/// On-disk lexicon override.
///
/// Every field is optional; a missing field keeps the builtin list. With `extend` set,
/// listed entries are appended to the builtin lists instead of replacing them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LexiconFile {
    #[serde(default)]
    pub extend: bool,
    pub academic_terms: Option<Vec<String>>,
    pub academic_patterns: Option<Vec<PatternEntry>>,
    pub industry_terms: Option<Vec<String>>,
    pub company_names: Option<Vec<String>>,
    pub legal_suffixes: Option<Vec<PatternEntry>>,
    pub industry_name_patterns: Option<Vec<PatternEntry>>,
}

/// One `{ "label": "GmbH", "pattern": "\\bgmbh\\b" }` entry of a [`LexiconFile`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternEntry {
    pub label: String,
    pub pattern: String,
}

impl Lexicon {
    /// Build the default vocabularies.
    pub fn builtin() -> Result<Self> {
        Ok(Self {
            academic_terms: lowercase_all(ACADEMIC_TERMS.iter().copied()),
            academic_patterns: compile_all(ACADEMIC_PATTERNS.iter().copied())?,
            industry_terms: lowercase_all(INDUSTRY_TERMS.iter().copied()),
            company_names: COMPANY_NAMES.iter().map(|s| s.to_string()).collect(),
            legal_suffix_patterns: compile_all(LEGAL_SUFFIXES.iter().copied())?,
            industry_name_patterns: compile_all(INDUSTRY_NAME_PATTERNS.iter().copied())?,
        })
    }

    /// Load a JSON override file and merge it over the builtin lexicon.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let file: LexiconFile = serde_json::from_str(&content)?;
        let lexicon = Self::builtin()?.merge(file)?;

        info!(
            path = %path.display(),
            academic = lexicon.academic_terms.len(),
            industry = lexicon.industry_terms.len(),
            companies = lexicon.company_names.len(),
            "Loaded lexicon override"
        );

        Ok(lexicon)
    }

    /// Apply a [`LexiconFile`] on top of this lexicon.
    pub fn merge(mut self, file: LexiconFile) -> Result<Self> {
        let extend = file.extend;

        if let Some(terms) = file.academic_terms {
            merge_list(&mut self.academic_terms, lowercase_all(terms.iter().map(String::as_str)), extend);
        }
        if let Some(entries) = file.academic_patterns {
            merge_list(&mut self.academic_patterns, compile_entries(&entries)?, extend);
        }
        if let Some(terms) = file.industry_terms {
            merge_list(&mut self.industry_terms, lowercase_all(terms.iter().map(String::as_str)), extend);
        }
        if let Some(names) = file.company_names {
            let names = names
                .into_iter()
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty())
                .collect();
            merge_list(&mut self.company_names, names, extend);
        }
        if let Some(entries) = file.legal_suffixes {
            merge_list(&mut self.legal_suffix_patterns, compile_entries(&entries)?, extend);
        }
        if let Some(entries) = file.industry_name_patterns {
            merge_list(&mut self.industry_name_patterns, compile_entries(&entries)?, extend);
        }

        debug!(extend, "Merged lexicon file");
        Ok(self)
    }
}

fn merge_list<T>(target: &mut Vec<T>, items: Vec<T>, extend: bool) {
    if extend {
        target.extend(items);
    } else {
        *target = items;
    }
}

fn lowercase_all<'a>(terms: impl Iterator<Item = &'a str>) -> Vec<String> {
    terms
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

fn compile_pattern(label: &str, pattern: &str) -> Result<LabeledPattern> {
    let regex = Regex::new(&format!("(?i){}", pattern))
        .map_err(|e| PubmedError::Config(format!("Invalid lexicon pattern {:?}: {}", pattern, e)))?;
    Ok(LabeledPattern {
        label: label.to_string(),
        regex,
    })
}

fn compile_all<'a>(pairs: impl Iterator<Item = (&'a str, &'a str)>) -> Result<Vec<LabeledPattern>> {
    pairs.map(|(label, pattern)| compile_pattern(label, pattern)).collect()
}

fn compile_entries(entries: &[PatternEntry]) -> Result<Vec<LabeledPattern>> {
    compile_all(entries.iter().map(|e| (e.label.as_str(), e.pattern.as_str())))
}
