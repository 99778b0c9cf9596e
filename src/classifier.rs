//! Academic vs. industry classification of free-text affiliations.
//!
//! The classifier is a pure function of the affiliation text and the [`Lexicon`] it
//! holds: it keeps no state between calls and can be shared across threads.
//!
//! ## Decision order
//!
//! 1. Normalize (lowercase, punctuation noise to spaces, collapse whitespace).
//! 2. Collect academic evidence and strong industry evidence (industry terms, legal
//!    suffixes, company names).
//! 3. Academic only → [`Classification::Academic`]; industry only →
//!    [`Classification::Industry`]; both → resolved by [`TieBreak`]
//!    ([`Classification::Ambiguous`] by default).
//! 4. No evidence at all → try the weak descriptive name patterns, else
//!    [`Classification::Unknown`].

use crate::lexicon::{LabeledPattern, Lexicon};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// Terms up to this many bytes (without a space) only match whole words.
const SHORT_TERM_MAX_LEN: usize = 4;

/// Verdict for a single affiliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Industry,
    Academic,
    Ambiguous,
    Unknown,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Industry => "industry",
            Self::Academic => "academic",
            Self::Ambiguous => "ambiguous",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do when an affiliation carries both academic and industry evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TieBreak {
    /// Report [`Classification::Ambiguous`] and let the consumer decide.
    #[default]
    Ambiguous,
    PreferIndustry,
    PreferAcademic,
}

impl FromStr for TieBreak {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ambiguous" => Ok(Self::Ambiguous),
            "prefer-industry" | "industry" => Ok(Self::PreferIndustry),
            "prefer-academic" | "academic" => Ok(Self::PreferAcademic),
            other => Err(format!("Unknown tie-break policy: {}", other)),
        }
    }
}

/// Classification plus the lexicon entries that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffiliationVerdict {
    pub classification: Classification,
    pub matched_terms: BTreeSet<String>,
}

impl AffiliationVerdict {
    fn unknown() -> Self {
        Self {
            classification: Classification::Unknown,
            matched_terms: BTreeSet::new(),
        }
    }
}

/// Stateless affiliation classifier over a shared [`Lexicon`].
#[derive(Debug, Clone)]
pub struct AffiliationClassifier {
    lexicon: Arc<Lexicon>,
    tie_break: TieBreak,
}

impl AffiliationClassifier {
    pub fn new(lexicon: Arc<Lexicon>) -> Self {
        Self {
            lexicon,
            tie_break: TieBreak::default(),
        }
    }

    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    pub fn tie_break(&self) -> TieBreak {
        self.tie_break
    }

    /// Classify one affiliation string. Never fails: missing or blank text is
    /// [`Classification::Unknown`] with no evidence.
    pub fn classify(&self, affiliation_text: Option<&str>) -> AffiliationVerdict {
        let text = match affiliation_text.map(normalize) {
            Some(t) if !t.is_empty() => t,
            _ => return AffiliationVerdict::unknown(),
        };

        let lexicon = &*self.lexicon;

        let mut academic = longest_matches(
            &text,
            lexicon.academic_terms.iter().map(|t| (normalize(t), t.as_str())),
            false,
        );
        academic.extend(pattern_labels(&lexicon.academic_patterns, &text));

        let mut industry = longest_matches(
            &text,
            lexicon.industry_terms.iter().map(|t| (normalize(t), t.as_str())),
            false,
        );
        industry.extend(pattern_labels(&lexicon.legal_suffix_patterns, &text));
        industry.extend(longest_matches(
            &text,
            lexicon.company_names.iter().map(|n| (normalize(n), n.as_str())),
            true,
        ));

        let classification = match (academic.is_empty(), industry.is_empty()) {
            (false, true) => Classification::Academic,
            (true, false) => Classification::Industry,
            (false, false) => match self.tie_break {
                TieBreak::Ambiguous => Classification::Ambiguous,
                TieBreak::PreferIndustry => Classification::Industry,
                TieBreak::PreferAcademic => Classification::Academic,
            },
            (true, true) => {
                let weak = pattern_labels(&lexicon.industry_name_patterns, &text);

                if weak.is_empty() {
                    return AffiliationVerdict::unknown();
                }
                industry = weak;
                Classification::Industry
            }
        };

        let mut matched_terms = academic;
        matched_terms.extend(industry);

        debug!(
            classification = %classification,
            evidence = ?matched_terms,
            "Classified affiliation"
        );

        AffiliationVerdict {
            classification,
            matched_terms,
        }
    }
}

/// Lowercase, turn punctuation noise into spaces and collapse whitespace.
///
/// `.`, `&`, `-` and `'` survive because lexicon entries rely on them
/// ("inc.", "Johnson & Johnson", "Bristol-Myers Squibb").
pub fn normalize(text: &str) -> String {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() || matches!(c, '.' | '&' | '-' | '\'') {
                c
            } else {
                ' '
            }
        })
        .collect();

    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Find every `(needle, label)` occurrence in `haystack` and keep the labels of the
/// longest non-nested matches: a match lying entirely inside an already accepted
/// longer match is dropped ("astra" inside "astrazeneca").
///
/// With `whole_words` every needle must sit on word boundaries; otherwise only short
/// single-word needles do.
fn longest_matches<'a>(
    haystack: &str,
    entries: impl Iterator<Item = (String, &'a str)>,
    whole_words: bool,
) -> BTreeSet<String> {
    let mut candidates: Vec<(usize, usize, &'a str)> = Vec::new();

    for (needle, label) in entries {
        if needle.is_empty() {
            continue;
        }
        let whole_word =
            whole_words || (needle.len() <= SHORT_TERM_MAX_LEN && !needle.contains(' '));
        for (start, _) in haystack.match_indices(needle.as_str()) {
            let end = start + needle.len();
            if whole_word && !is_word_bounded(haystack, start, end) {
                continue;
            }
            candidates.push((start, end, label));
        }
    }

    candidates.sort_by(|a, b| (b.1 - b.0).cmp(&(a.1 - a.0)).then(a.0.cmp(&b.0)));

    let mut accepted: Vec<(usize, usize)> = Vec::new();
    let mut labels = BTreeSet::new();

    for (start, end, label) in candidates {
        if accepted.iter().any(|&(s, e)| start >= s && end <= e) {
            continue;
        }
        accepted.push((start, end));
        labels.insert(label.to_string());
    }

    labels
}

fn pattern_labels(patterns: &[LabeledPattern], text: &str) -> BTreeSet<String> {
    patterns
        .iter()
        .filter(|p| p.is_match(text))
        .map(|p| p.label.clone())
        .collect()
}

fn is_word_bounded(haystack: &str, start: usize, end: usize) -> bool {
    let before_ok = haystack[..start]
        .chars()
        .next_back()
        .map_or(true, |c| !c.is_alphanumeric());
    let after_ok = haystack[end..]
        .chars()
        .next()
        .map_or(true, |c| !c.is_alphanumeric());
    before_ok && after_ok
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> AffiliationClassifier {
        AffiliationClassifier::new(Arc::new(Lexicon::builtin().unwrap()))
    }

    fn terms(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  Pfizer Inc., New York,   NY "), "pfizer inc. new york ny");
        assert_eq!(normalize("Dept. (Biology); Harvard"), "dept. biology harvard");
        assert_eq!(normalize("Johnson & Johnson"), "johnson & johnson");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_missing_or_blank_is_unknown() {
        let c = classifier();
        for input in [None, Some(""), Some("   "), Some(",;()")] {
            let verdict = c.classify(input);
            assert_eq!(verdict.classification, Classification::Unknown);
            assert!(verdict.matched_terms.is_empty());
        }
    }

    #[test]
    fn test_pfizer_is_industry() {
        let verdict = classifier().classify(Some("Pfizer Inc., New York, NY"));
        assert_eq!(verdict.classification, Classification::Industry);
        assert!(verdict.matched_terms.contains("Pfizer"));
        assert!(verdict.matched_terms.contains("Inc."));
        assert!(verdict.matched_terms.contains("inc."));
    }

    #[test]
    fn test_harvard_is_academic() {
        let verdict = classifier().classify(Some("Department of Biology, Harvard University"));
        assert_eq!(verdict.classification, Classification::Academic);
        assert_eq!(verdict.matched_terms, terms(&["department of", "university"]));
    }

    #[test]
    fn test_novartis_institutes_is_ambiguous() {
        let verdict = classifier().classify(Some("Novartis Institutes for BioMedical Research"));
        assert_eq!(verdict.classification, Classification::Ambiguous);
        assert!(verdict.matched_terms.contains("institute"));
        assert!(verdict.matched_terms.contains("Novartis"));
    }

    #[test]
    fn test_tie_break_policies_keep_evidence() {
        let text = Some("Novartis Institutes for BioMedical Research");
        let ambiguous = classifier().classify(text);

        let industry = classifier()
            .with_tie_break(TieBreak::PreferIndustry)
            .classify(text);
        assert_eq!(industry.classification, Classification::Industry);
        assert_eq!(industry.matched_terms, ambiguous.matched_terms);

        let academic = classifier()
            .with_tie_break(TieBreak::PreferAcademic)
            .classify(text);
        assert_eq!(academic.classification, Classification::Academic);
    }

    #[test]
    fn test_longest_company_match_wins() {
        let verdict = classifier().classify(Some("AstraZeneca, Gothenburg, Sweden"));
        assert_eq!(verdict.classification, Classification::Industry);
        assert!(verdict.matched_terms.contains("AstraZeneca"));
        assert!(!verdict.matched_terms.contains("Astra"));
        assert!(!verdict.matched_terms.contains("Zeneca"));
    }

    #[test]
    fn test_company_names_need_word_boundaries() {
        let c = classifier();
        let verdict = c.classify(Some("Astrakhan State Medical University, Astrakhan, Russia"));
        assert_eq!(verdict.classification, Classification::Academic);
        assert_eq!(verdict.matched_terms, terms(&["university"]));

        let verdict = c.classify(Some("Bayerisches Landesamt fur Gesundheit, Munich"));
        assert_eq!(verdict.classification, Classification::Unknown);

        let verdict = c.classify(Some("Bayer AG, Leverkusen"));
        assert!(verdict.matched_terms.contains("Bayer"));
        assert_eq!(verdict.classification, Classification::Industry);
    }

    #[test]
    fn test_clinic_is_academic_but_clinical_is_not() {
        let c = classifier();
        let verdict = c.classify(Some("Clinic of Neurology, Charite, Berlin"));
        assert_eq!(verdict.classification, Classification::Academic);
        assert_eq!(verdict.matched_terms, terms(&["clinic"]));

        let verdict = c.classify(Some("Clinical Operations, Boston"));
        assert_eq!(verdict.classification, Classification::Unknown);

        let verdict = c.classify(Some("WHO Collaborating Centre, Geneva"));
        assert_eq!(verdict.classification, Classification::Academic);
        assert_eq!(verdict.matched_terms, terms(&["who"]));
    }

    #[test]
    fn test_nested_terms_collapse() {
        let verdict = classifier().classify(Some("Acme Pharmaceutical Corporation"));
        assert_eq!(verdict.classification, Classification::Industry);
        assert!(verdict.matched_terms.contains("pharmaceutical"));
        assert!(!verdict.matched_terms.contains("pharma"));
        assert!(verdict.matched_terms.contains("corporation"));
    }

    #[test]
    fn test_short_terms_need_word_boundaries() {
        let c = classifier();
        // "nci" inside "principal", "co." at the end of "mexico."
        let verdict = c.classify(Some("Principal Investigator Office, Mexico."));
        assert_eq!(verdict.classification, Classification::Unknown);

        let verdict = c.classify(Some("NCI, Bethesda, MD"));
        assert_eq!(verdict.classification, Classification::Academic);
        assert_eq!(verdict.matched_terms, terms(&["nci"]));
    }

    #[test]
    fn test_legal_suffix_alone_is_industry() {
        let verdict = classifier().classify(Some("Evotec SE and Vaximm GmbH, Mannheim"));
        assert_eq!(verdict.classification, Classification::Industry);
        assert!(verdict.matched_terms.contains("GmbH"));
    }

    #[test]
    fn test_weak_pattern_only_without_other_evidence() {
        let c = classifier();
        let verdict = c.classify(Some("Acme Therapeutics, Cambridge, MA"));
        assert_eq!(verdict.classification, Classification::Industry);
        assert_eq!(verdict.matched_terms, terms(&["Therapeutics"]));

        // The research-name pattern must not turn an academic affiliation ambiguous.
        let verdict = c.classify(Some("Institute of Cancer Research, London"));
        assert_eq!(verdict.classification, Classification::Academic);
    }

    #[test]
    fn test_no_evidence_is_unknown() {
        let verdict = classifier().classify(Some("Boston, MA, USA"));
        assert_eq!(verdict.classification, Classification::Unknown);
        assert!(verdict.matched_terms.is_empty());
    }

    #[test]
    fn test_classify_is_pure() {
        let c = classifier();
        let inputs = [
            "Pfizer Inc., New York, NY",
            "Department of Biology, Harvard University",
            "Novartis Institutes for BioMedical Research",
        ];
        let first: Vec<_> = inputs.iter().map(|t| c.classify(Some(*t))).collect();
        let reversed: Vec<_> = inputs.iter().rev().map(|t| c.classify(Some(*t))).collect();
        let reversed: Vec<_> = reversed.into_iter().rev().collect();
        assert_eq!(first, reversed);
    }

    #[test]
    fn test_tie_break_from_str() {
        assert_eq!("ambiguous".parse::<TieBreak>(), Ok(TieBreak::Ambiguous));
        assert_eq!("Prefer-Industry".parse::<TieBreak>(), Ok(TieBreak::PreferIndustry));
        assert_eq!("academic".parse::<TieBreak>(), Ok(TieBreak::PreferAcademic));
        assert!("coin-flip".parse::<TieBreak>().is_err());
    }
}
