//! Scoring and classification output types

use serde::{Deserialize, Serialize};

use super::{CustomerRecord, ShellRecord};

/// Terminal classification of one customer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MatchStatus {
    Matched,
    Unmatched,
    Flagged,
    Invalid,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Matched => "MATCHED",
            MatchStatus::Unmatched => "UNMATCHED",
            MatchStatus::Flagged => "FLAGGED",
            MatchStatus::Invalid => "INVALID",
        }
    }
}

/// One scored (customer, shell) pair
///
/// Ephemeral: produced by the scorer and consumed by the classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchCandidate {
    pub customer_id: String,
    pub shell_id: String,
    /// 0..=100
    pub website_match: u8,
    /// 0..=100
    pub name_match: u8,
    /// 0..=100, always a subset sum of {30, 30, 30, 10}
    pub address_consistency: u8,
    /// Ordering-only composite
    pub rank_score: f64,
}

/// Short justification for each of the three signals
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalNotes {
    pub website: String,
    pub name: String,
    pub address: String,
}

/// Outcome of the external assessment for a result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AssessmentStatus {
    /// Not a matched pair, or phase 2 has not reached it yet
    NotRequested,
    /// Assessment succeeded and is authoritative
    Assessed,
    /// Assessment failed or was never dispatched; provisional values stand
    Unavailable { reason: String },
}

impl AssessmentStatus {
    pub fn label(&self) -> &'static str {
        match self {
            AssessmentStatus::NotRequested => "not requested",
            AssessmentStatus::Assessed => "assessed",
            AssessmentStatus::Unavailable { .. } => "unavailable",
        }
    }
}

/// Final per-customer recommendation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub customer_id: String,
    pub status: MatchStatus,
    /// Present iff `status == Matched`
    #[serde(default)]
    pub recommended_shell_id: Option<String>,
    /// 0..=100; authoritative value after blending
    pub confidence: u8,
    #[serde(default)]
    pub explanation_bullets: Vec<String>,
    /// Present iff `status != Matched`
    #[serde(default)]
    pub reason: Option<String>,
    /// Computed signals of the recommended pair, kept for audit even when
    /// the assessment supersedes the confidence
    #[serde(default)]
    pub signals: Option<MatchCandidate>,
    #[serde(default)]
    pub signal_notes: Option<SignalNotes>,
    /// Confidence derived purely from the computed signals
    #[serde(default)]
    pub provisional_confidence: Option<u8>,
    pub assessment: AssessmentStatus,
    #[serde(default)]
    pub candidate_count: usize,
    #[serde(default)]
    pub customer: Option<CustomerRecord>,
    #[serde(default)]
    pub recommended_shell: Option<ShellRecord>,
}

impl MatchResult {
    /// A customer that failed validation or directory lookup
    pub fn invalid(customer_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            customer_id: customer_id.into(),
            status: MatchStatus::Invalid,
            recommended_shell_id: None,
            confidence: 0,
            explanation_bullets: Vec::new(),
            reason: Some(reason.into()),
            signals: None,
            signal_notes: None,
            provisional_confidence: None,
            assessment: AssessmentStatus::NotRequested,
            candidate_count: 0,
            customer: None,
            recommended_shell: None,
        }
    }

    pub fn is_matched(&self) -> bool {
        self.status == MatchStatus::Matched
    }
}
