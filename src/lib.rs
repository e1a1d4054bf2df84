use std::collections::{BTreeMap, HashMap};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

// ---------------------------------------------------------------------------
// Data structures
// ---------------------------------------------------------------------------

/// The six per-input metrics. Values are rounded to three decimals in the
/// assembled result; the index and recommendations are computed from the
/// unrounded values.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Metrics {
    pub noise: f64,
    pub effort: f64,
    pub context: f64,
    pub details: f64,
    pub bonus_factors: f64,
    pub penalty_factors: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Decision {
    #[serde(rename = "REJECT")]
    Reject,
    #[serde(rename = "MEDIUM_PRIORITY")]
    MediumPriority,
    #[serde(rename = "HIGH_PRIORITY")]
    HighPriority,
}

impl Decision {
    /// Classify an index value. Branch order matters: the branches are not
    /// disjoint without it.
    pub fn from_adi(adi: f64) -> Self {
        if adi > 1.0 {
            Decision::Reject
        } else if adi >= 0.0 {
            Decision::MediumPriority
        } else {
            Decision::HighPriority
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Reject => "REJECT",
            Decision::MediumPriority => "MEDIUM_PRIORITY",
            Decision::HighPriority => "HIGH_PRIORITY",
        }
    }
}

/// A triggered penalty check. Untagged so the penalties map serializes as a
/// plain ratio, count, or flag.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Penalty {
    Ratio(f64),
    Count(usize),
    Flag(bool),
}

impl Penalty {
    fn contribution(self) -> f64 {
        match self {
            Penalty::Ratio(r) => r,
            Penalty::Count(n) => n as f64,
            Penalty::Flag(_) => 1.0,
        }
    }
}

/// Per-category lists of matched substrings.
pub type Findings = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisDetails {
    pub noise_findings: Findings,
    pub technical_details: Findings,
    pub penalties: BTreeMap<String, Penalty>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub adi: f64,
    pub metrics: Metrics,
    pub decision: Decision,
    pub recommendations: Vec<String>,
    pub details: AnalysisDetails,
}

// ---------------------------------------------------------------------------
// Weights
// ---------------------------------------------------------------------------

/// Coefficients for the index formula. Set once at construction, read-only
/// afterward; a constructed [`Analyzer`] is shareable across threads.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Weights {
    pub noise: f64,
    pub effort: f64,
    pub context: f64,
    pub details: f64,
    pub bonus: f64,
    pub penalty: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Weights {
            noise: 1.0,
            effort: 2.0,
            context: 1.5,
            details: 1.5,
            bonus: 0.5,
            penalty: 1.0,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum WeightsError {
    #[error("unknown weight key `{0}`")]
    UnknownKey(String),
    #[error("weight `{key}` must be finite, got {value}")]
    NotFinite { key: &'static str, value: f64 },
}

impl Weights {
    /// Build weights from a named-key override map. Unspecified keys fall
    /// back to the defaults; unknown keys and non-finite values are
    /// configuration errors caught here rather than at analysis time.
    pub fn from_overrides(overrides: &HashMap<String, f64>) -> Result<Self, WeightsError> {
        let mut weights = Weights::default();
        for (key, &value) in overrides {
            match key.as_str() {
                "noise" => weights.noise = value,
                "effort" => weights.effort = value,
                "context" => weights.context = value,
                "details" => weights.details = value,
                "bonus" => weights.bonus = value,
                "penalty" => weights.penalty = value,
                other => return Err(WeightsError::UnknownKey(other.to_string())),
            }
        }
        weights.validate()?;
        Ok(weights)
    }

    fn validate(&self) -> Result<(), WeightsError> {
        let entries = [
            ("noise", self.noise),
            ("effort", self.effort),
            ("context", self.context),
            ("details", self.details),
            ("bonus", self.bonus),
            ("penalty", self.penalty),
        ];
        for (key, value) in entries {
            if !value.is_finite() {
                return Err(WeightsError::NotFinite { key, value });
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Compiled patterns
// ---------------------------------------------------------------------------

// Noise and context patterns run against the lowered text; detail patterns
// are case-sensitive and run against the original.

static NOISE_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    vec![
        (
            "urgency",
            Regex::new(r"\b(?:urgent|asap|emergency|!!+|\?\?+)\b").unwrap(),
        ),
        ("informal", Regex::new(r"\b(?:pls|plz|thx)\b").unwrap()),
        (
            "vague",
            Regex::new(r"\b(?:something|somehow|maybe|probably)\b").unwrap(),
        ),
    ]
});

static DETAIL_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    vec![
        (
            "code_elements",
            Regex::new(r"\b(?:function|class|method|variable|array|object)\b").unwrap(),
        ),
        (
            "technical_terms",
            Regex::new(r"\b(?:error|exception|bug|issue|crash|fail)\b").unwrap(),
        ),
        (
            "specifics",
            Regex::new(r"[a-zA-Z_][a-zA-Z0-9_]*\.[a-zA-Z_][a-zA-Z0-9_]*").unwrap(),
        ),
    ]
});

static CONTEXT_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    vec![
        (
            "background",
            Regex::new(r"\b(?:because|since|as|when|while)\b").unwrap(),
        ),
        (
            "environment",
            Regex::new(r"\b(?:using|version|environment|platform|system)\b").unwrap(),
        ),
        (
            "goal",
            Regex::new(r"\b(?:trying to|want to|need to|goal is|attempting to)\b").unwrap(),
        ),
    ]
});

static SENTENCE_SPLIT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]+").unwrap());

static FORMATTING_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"```|\*\*|\n\s*\n").unwrap());

static CLAUSE_PUNCT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.,;:]").unwrap());

static FENCED_BLOCK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"```[\s\S]*?```").unwrap());

static INLINE_LINK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[.*?\]\(.*?\)").unwrap());

// Requires a preceding line break, so a bullet on the very first line does
// not count.
static BULLET_LINE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*[-*+]\s").unwrap());

static PUNCT_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[!?]{2,}").unwrap());

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

fn collect_matches(pattern: &Regex, haystack: &str) -> Vec<String> {
    pattern
        .find_iter(haystack)
        .map(|m| m.as_str().to_string())
        .collect()
}

// ---------------------------------------------------------------------------
// Metric extraction
// ---------------------------------------------------------------------------

/// Ratio of noise matches to word count. Unbounded by design: a ratio, not a
/// score. Word count comes from the original text, matching from the lowered
/// text.
fn extract_noise(text: &str) -> (f64, Findings) {
    let lowered = text.to_lowercase();
    let mut total = 0usize;
    let mut findings = Findings::new();

    for (category, pattern) in NOISE_PATTERNS.iter() {
        let matches = collect_matches(pattern, &lowered);
        total += matches.len();
        findings.insert((*category).to_string(), matches);
    }

    let words = word_count(text);
    (total as f64 / words.max(1) as f64, findings)
}

fn extract_effort(text: &str) -> f64 {
    let sentences: Vec<&str> = SENTENCE_SPLIT_RE
        .split(text)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if sentences.is_empty() {
        return 0.0;
    }

    let mean_sentence_len = sentences
        .iter()
        .map(|s| s.split_whitespace().count() as f64)
        .sum::<f64>()
        / sentences.len() as f64;

    let mut score: f64 = 0.0;
    if (20.0..=50.0).contains(&mean_sentence_len) {
        score += 2.0;
    }
    if FORMATTING_RE.is_match(text) {
        score += 1.5;
    }
    if CLAUSE_PUNCT_RE.is_match(text) {
        score += 1.5;
    }
    score.min(5.0)
}

fn extract_context(text: &str) -> f64 {
    let lowered = text.to_lowercase();
    let mut score: f64 = 0.0;
    for (_, pattern) in CONTEXT_PATTERNS.iter() {
        if pattern.is_match(&lowered) {
            score += 1.0;
        }
    }
    // Three categories, so the effective ceiling is 3.0. The 5.0 clamp is
    // kept anyway to mirror the detail and penalty metrics.
    score.min(5.0)
}

fn extract_details(text: &str) -> (f64, Findings) {
    let mut score = 0.0;
    let mut findings = Findings::new();

    for (category, pattern) in DETAIL_PATTERNS.iter() {
        let matches = collect_matches(pattern, text);
        score += matches.len() as f64 * 0.5;
        findings.insert((*category).to_string(), matches);
    }

    (score.min(5.0), findings)
}

fn extract_bonus(text: &str) -> f64 {
    let mut score = 0.0;
    if FENCED_BLOCK_RE.is_match(text) {
        score += 1.0;
    }
    if INLINE_LINK_RE.is_match(text) {
        score += 0.5;
    }
    if BULLET_LINE_RE.is_match(text) {
        score += 0.5;
    }
    score
}

fn extract_penalties(text: &str) -> (f64, BTreeMap<String, Penalty>) {
    let mut penalties = BTreeMap::new();

    let uppercase = text.chars().filter(|c| c.is_ascii_uppercase()).count();
    let letters = text.chars().filter(|c| c.is_ascii_alphabetic()).count();
    let caps_ratio = uppercase as f64 / letters.max(1) as f64;
    if caps_ratio > 0.7 {
        penalties.insert("excessive_caps".to_string(), Penalty::Ratio(caps_ratio));
    }

    let punct_runs = PUNCT_RUN_RE.find_iter(text).count();
    if punct_runs > 0 {
        penalties.insert(
            "excessive_punctuation".to_string(),
            Penalty::Count(punct_runs),
        );
    }

    if word_count(text) < 10 {
        penalties.insert("too_short".to_string(), Penalty::Flag(true));
    }

    let score = penalties
        .values()
        .map(|p| p.contribution())
        .sum::<f64>()
        .min(5.0);
    (score, penalties)
}

// ---------------------------------------------------------------------------
// Index calculation
// ---------------------------------------------------------------------------

// The 0.1 floor guards against a near-zero denominator when context, details
// and penalty are all near zero. The denominator is a sum of non-negative
// weighted terms and cannot be negative.
fn compute_adi(weights: &Weights, metrics: &Metrics) -> f64 {
    let numerator = weights.noise * metrics.noise
        - (weights.effort * metrics.effort + weights.bonus * metrics.bonus_factors);
    let denominator = weights.context * metrics.context
        + weights.details * metrics.details
        + weights.penalty * metrics.penalty_factors;
    numerator / denominator.max(0.1)
}

// ---------------------------------------------------------------------------
// Recommendations
// ---------------------------------------------------------------------------

fn generate_recommendations(
    metrics: &Metrics,
    penalties: &BTreeMap<String, Penalty>,
) -> Vec<String> {
    let mut recommendations = Vec::new();

    if metrics.noise > 0.3 {
        recommendations.push("Reduce informal or urgent expressions.".to_string());
    }
    if metrics.context < 1.0 {
        recommendations.push("Provide more context (environment, background, goal).".to_string());
    }
    if metrics.details < 1.0 {
        recommendations.push("Include specific technical details.".to_string());
    }
    if metrics.effort < 2.0 {
        recommendations.push("Improve the structure of your input.".to_string());
    }
    if metrics.penalty_factors > 0.0 {
        if penalties.contains_key("excessive_caps") {
            recommendations.push("Avoid excessive capitalization.".to_string());
        }
        if penalties.contains_key("excessive_punctuation") {
            recommendations.push("Reduce excessive punctuation marks.".to_string());
        }
        if penalties.contains_key("too_short") {
            recommendations.push("Provide a more detailed description.".to_string());
        }
    }

    recommendations
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Scores free-form text and classifies it into a priority tier.
///
/// Holds only the immutable weight configuration; the pattern catalog lives
/// in statics. One instance can serve concurrent callers without locking.
#[derive(Debug, Clone)]
pub struct Analyzer {
    weights: Weights,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer {
    pub fn new() -> Self {
        Analyzer {
            weights: Weights::default(),
        }
    }

    /// Construct with custom weights, failing fast on a bad configuration
    /// instead of carrying a sentinel through to a decision.
    pub fn with_weights(weights: Weights) -> Result<Self, WeightsError> {
        weights.validate()?;
        Ok(Analyzer { weights })
    }

    pub fn weights(&self) -> &Weights {
        &self.weights
    }

    /// Run the full analysis: six metric extractions, the weighted index,
    /// the tier decision, and the recommendation list. Never fails; empty or
    /// whitespace-only input degrades to neutral metric values.
    pub fn analyze(&self, text: &str) -> AnalysisResult {
        let (noise, noise_findings) = extract_noise(text);
        let effort = extract_effort(text);
        let context = extract_context(text);
        let (details, technical_details) = extract_details(text);
        let bonus_factors = extract_bonus(text);
        let (penalty_factors, penalties) = extract_penalties(text);

        let metrics = Metrics {
            noise,
            effort,
            context,
            details,
            bonus_factors,
            penalty_factors,
        };

        let adi = compute_adi(&self.weights, &metrics);
        let decision = Decision::from_adi(adi);
        let recommendations = generate_recommendations(&metrics, &penalties);

        debug!(adi, decision = decision.as_str(), "analysis complete");

        AnalysisResult {
            adi: round3(adi),
            metrics: Metrics {
                noise: round3(noise),
                effort: round3(effort),
                context: round3(context),
                details: round3(details),
                bonus_factors: round3(bonus_factors),
                penalty_factors: round3(penalty_factors),
            },
            decision,
            recommendations,
            details: AnalysisDetails {
                noise_findings,
                technical_details,
                penalties,
            },
        }
    }
}

/// Analyze with the default weights.
pub fn analyze(text: &str) -> AnalysisResult {
    Analyzer::new().analyze(text)
}
