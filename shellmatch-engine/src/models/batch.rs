//! Batch request/response contract

use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use super::{AssessmentStatus, MatchResult, MatchStatus};
use crate::config::BatchConfigOverride;

/// POST /match/batch request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    pub customer_ids: Vec<String>,
    pub shell_ids: Vec<String>,
    /// Customer ids already known to be invalid upstream
    #[serde(default)]
    pub invalid_customer_ids: Vec<String>,
    /// Shell ids already known to be invalid upstream
    #[serde(default)]
    pub invalid_shell_ids: Vec<String>,
    #[serde(default)]
    pub config: Option<BatchConfigOverride>,
}

/// Run summary metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub total_customer_accounts: usize,
    pub matched_pairs: usize,
    pub unmatched_customers: usize,
    pub flagged_customer_accounts: usize,
    pub invalid_customer_accounts: usize,
    pub total_shell_accounts: usize,
    pub invalid_shell_accounts: usize,
    pub assessed_pairs: usize,
    pub assessment_unavailable: usize,
    /// Human readable, e.g. "1.42s"
    pub execution_time: String,
    pub execution_time_ms: u64,
}

/// POST /match/batch response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    pub job_id: Uuid,
    pub cancelled: bool,
    pub summary: BatchSummary,
    /// One entry per input customer id, in input order
    pub results: Vec<MatchResult>,
    pub matched_pairs: Vec<MatchResult>,
    pub unmatched_customers: Vec<MatchResult>,
    pub flagged_customers: Vec<MatchResult>,
    pub invalid_customers: Vec<String>,
}

/// Shell-side counts reported in the summary
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellCounts {
    pub total: usize,
    pub invalid: usize,
}

impl BatchResponse {
    /// Partition input-ordered results into the response views
    pub fn assemble(
        job_id: Uuid,
        results: Vec<MatchResult>,
        shells: ShellCounts,
        cancelled: bool,
        elapsed: Duration,
    ) -> Self {
        let by_status = |status: MatchStatus| -> Vec<MatchResult> {
            results
                .iter()
                .filter(|r| r.status == status)
                .cloned()
                .collect()
        };

        let matched_pairs = by_status(MatchStatus::Matched);
        let unmatched_customers = by_status(MatchStatus::Unmatched);
        let flagged_customers = by_status(MatchStatus::Flagged);
        let invalid_customers: Vec<String> = results
            .iter()
            .filter(|r| r.status == MatchStatus::Invalid)
            .map(|r| r.customer_id.clone())
            .collect();

        let assessed_pairs = matched_pairs
            .iter()
            .filter(|r| r.assessment == AssessmentStatus::Assessed)
            .count();
        let assessment_unavailable = matched_pairs
            .iter()
            .filter(|r| matches!(r.assessment, AssessmentStatus::Unavailable { .. }))
            .count();

        let summary = BatchSummary {
            total_customer_accounts: results.len(),
            matched_pairs: matched_pairs.len(),
            unmatched_customers: unmatched_customers.len(),
            flagged_customer_accounts: flagged_customers.len(),
            invalid_customer_accounts: invalid_customers.len(),
            total_shell_accounts: shells.total,
            invalid_shell_accounts: shells.invalid,
            assessed_pairs,
            assessment_unavailable,
            execution_time: format!("{:.2}s", elapsed.as_secs_f64()),
            execution_time_ms: elapsed.as_millis() as u64,
        };

        Self {
            job_id,
            cancelled,
            summary,
            results,
            matched_pairs,
            unmatched_customers,
            flagged_customers,
            invalid_customers,
        }
    }
}
