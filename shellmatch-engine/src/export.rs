//! Tabular report projection of a batch response
//!
//! Produces the two sheets a spreadsheet writer needs: per-customer detail
//! and run summary metrics. Cells are plain strings; formatting and file
//! output belong to the consumer.

use serde::{Deserialize, Serialize};

use crate::models::{BatchResponse, BatchSummary, MatchResult};

pub const DETAIL_SHEET: &str = "Matching Results";
pub const SUMMARY_SHEET: &str = "Summary";

/// Detail sheet columns, in output order
pub const DETAIL_COLUMNS: [&str; 16] = [
    "Customer ID",
    "Customer Name",
    "Customer Website",
    "Status",
    "Recommended Shell ID",
    "Recommended Shell Name",
    "Recommended Shell Website",
    "Confidence",
    "Provisional Confidence",
    "Assessment",
    "Website Match",
    "Name Match",
    "Address Consistency",
    "Rank Score",
    "Explanation",
    "Reason",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sheet {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub sheets: Vec<Sheet>,
}

impl Report {
    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }
}

/// Build the report for a finished batch
pub fn build_report(response: &BatchResponse) -> Report {
    Report {
        sheets: vec![detail_sheet(&response.results), summary_sheet(&response.summary)],
    }
}

fn opt(value: Option<&str>) -> String {
    value.unwrap_or_default().to_string()
}

fn detail_row(result: &MatchResult) -> Vec<String> {
    let customer = result.customer.as_ref();
    let shell = result.recommended_shell.as_ref();
    let signals = result.signals.as_ref();

    vec![
        result.customer_id.clone(),
        opt(customer.map(|c| c.name.as_str())),
        opt(customer.and_then(|c| c.website.as_deref())),
        result.status.as_str().to_string(),
        opt(result.recommended_shell_id.as_deref()),
        opt(shell.map(|s| s.zi_company_name.as_str())),
        opt(shell.and_then(|s| s.zi_website.as_deref())),
        result.confidence.to_string(),
        result.provisional_confidence.map(|c| c.to_string()).unwrap_or_default(),
        result.assessment.label().to_string(),
        signals.map(|s| s.website_match.to_string()).unwrap_or_default(),
        signals.map(|s| s.name_match.to_string()).unwrap_or_default(),
        signals.map(|s| s.address_consistency.to_string()).unwrap_or_default(),
        signals.map(|s| format!("{:.1}", s.rank_score)).unwrap_or_default(),
        result.explanation_bullets.join("\n"),
        opt(result.reason.as_deref()),
    ]
}

fn detail_sheet(results: &[MatchResult]) -> Sheet {
    Sheet {
        name: DETAIL_SHEET.to_string(),
        headers: DETAIL_COLUMNS.iter().map(|h| h.to_string()).collect(),
        rows: results.iter().map(detail_row).collect(),
    }
}

fn summary_sheet(summary: &BatchSummary) -> Sheet {
    let metrics: [(&str, String); 10] = [
        ("Total Customer Accounts", summary.total_customer_accounts.to_string()),
        ("Matched Pairs", summary.matched_pairs.to_string()),
        ("Unmatched Customers", summary.unmatched_customers.to_string()),
        ("Flagged Customer Accounts", summary.flagged_customer_accounts.to_string()),
        ("Invalid Customer Accounts", summary.invalid_customer_accounts.to_string()),
        ("Total Shell Accounts", summary.total_shell_accounts.to_string()),
        ("Invalid Shell Accounts", summary.invalid_shell_accounts.to_string()),
        ("Assessed Pairs", summary.assessed_pairs.to_string()),
        ("Assessment Unavailable", summary.assessment_unavailable.to_string()),
        ("Execution Time", summary.execution_time.clone()),
    ];

    Sheet {
        name: SUMMARY_SHEET.to_string(),
        headers: vec!["Metric".to_string(), "Value".to_string()],
        rows: metrics
            .into_iter()
            .map(|(metric, value)| vec![metric.to_string(), value])
            .collect(),
    }
}
