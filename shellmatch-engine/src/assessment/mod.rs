//! External assessment collaborator
//!
//! A matched pair is described to an external, knowledge-augmented service
//! which answers with a confidence and explanation bullets. The service
//! returns raw text; [`adapter`] validates it and applies the retry and
//! blending rules.

pub mod adapter;
pub mod openai_client;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::error::MatchError;
use crate::models::MatchResult;

pub use adapter::{parse_assessment, Assessment, AssessmentAdapter};
pub use openai_client::OpenAiAssessmentClient;

/// Assessment client errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AssessmentError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Assessment service disabled (no API key configured)")]
    Disabled,

    #[error("Batch cancelled before dispatch")]
    Cancelled,
}

impl AssessmentError {
    /// Disabled and Cancelled are permanent for the run
    pub fn is_retryable(&self) -> bool {
        !matches!(self, AssessmentError::Disabled | AssessmentError::Cancelled)
    }

    /// Text stored on a result whose assessment was unavailable
    pub fn reason(&self) -> String {
        match self {
            AssessmentError::Timeout(d) => MatchError::AssessmentTimeout(*d).to_string(),
            AssessmentError::Schema(msg) => MatchError::AssessmentSchema(msg.clone()).to_string(),
            other => other.to_string(),
        }
    }
}

/// One side of the pair as shown to the assessment service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
    pub name: String,
    pub website: Option<String>,
    pub billing_address: Option<String>,
}

/// A computed signal with its justification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalSummary {
    pub score: u8,
    pub explanation: String,
}

/// Assessment request payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentRequest {
    pub customer: AccountSummary,
    pub shell: AccountSummary,
    pub website_match: SignalSummary,
    pub name_match: SignalSummary,
    pub address_consistency: SignalSummary,
}

impl AssessmentRequest {
    /// Build the payload for a MATCHED result
    ///
    /// Returns `None` when the result lacks the records or signals a matched
    /// result always carries.
    pub fn from_result(result: &MatchResult) -> Option<Self> {
        let customer = result.customer.as_ref()?;
        let shell = result.recommended_shell.as_ref()?;
        let signals = result.signals.as_ref()?;
        let notes = result.signal_notes.clone().unwrap_or_default();

        Some(Self {
            customer: AccountSummary {
                name: customer.name.clone(),
                website: customer.website.clone(),
                billing_address: customer.billing_address_line(),
            },
            shell: AccountSummary {
                name: shell.zi_company_name.clone(),
                website: shell.zi_website.clone(),
                billing_address: shell.billing_address_line(),
            },
            website_match: SignalSummary {
                score: signals.website_match,
                explanation: notes.website,
            },
            name_match: SignalSummary {
                score: signals.name_match,
                explanation: notes.name,
            },
            address_consistency: SignalSummary {
                score: signals.address_consistency,
                explanation: notes.address,
            },
        })
    }
}

/// External assessment service
#[async_trait]
pub trait AssessmentService: Send + Sync {
    fn name(&self) -> &'static str;

    /// Send one request and return the raw response text
    async fn assess(&self, request: &AssessmentRequest) -> Result<String, AssessmentError>;
}

/// Used when no API key is configured; every pair keeps provisional values
pub struct DisabledAssessment;

#[async_trait]
impl AssessmentService for DisabledAssessment {
    fn name(&self) -> &'static str {
        "disabled"
    }

    async fn assess(&self, _request: &AssessmentRequest) -> Result<String, AssessmentError> {
        Err(AssessmentError::Disabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CustomerRecord, MatchCandidate, MatchStatus, ShellRecord, SignalNotes};

    #[test]
    fn test_request_payload_is_camel_case() {
        let mut result = MatchResult::invalid("001000000000001", "x");
        result.status = MatchStatus::Matched;
        result.customer = Some(CustomerRecord {
            id: "001000000000001".into(),
            name: "Acme Corp".into(),
            website: Some("acme.com".into()),
            billing_city: Some("Austin".into()),
            billing_state: Some("TX".into()),
            billing_country: None,
            billing_postal_code: None,
        });
        result.recommended_shell = Some(ShellRecord {
            id: "001000000000002".into(),
            zi_id: "1".into(),
            zi_company_name: "Acme Corporation".into(),
            zi_website: Some("www.acme.com".into()),
            zi_city: None,
            zi_state: None,
            zi_country: None,
            zi_postal_code: None,
            bad_domain: false,
        });
        result.signals = Some(MatchCandidate {
            customer_id: "001000000000001".into(),
            shell_id: "001000000000002".into(),
            website_match: 100,
            name_match: 100,
            address_consistency: 0,
            rank_score: 90.0,
        });
        result.signal_notes = Some(SignalNotes {
            website: "same domain".into(),
            name: "same name".into(),
            address: "no overlap".into(),
        });

        let request = AssessmentRequest::from_result(&result).unwrap();
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["customer"]["billingAddress"], "Austin, TX");
        assert_eq!(json["shell"]["name"], "Acme Corporation");
        assert_eq!(json["websiteMatch"]["score"], 100);
        assert_eq!(json["addressConsistency"]["explanation"], "no overlap");
    }

    #[test]
    fn test_unmatched_result_has_no_request() {
        let result = MatchResult::invalid("001000000000001", "not found");
        assert!(AssessmentRequest::from_result(&result).is_none());
    }

    #[test]
    fn test_reason_uses_match_error_wording() {
        let reason = AssessmentError::Timeout(Duration::from_millis(50)).reason();
        assert_eq!(reason, "Assessment timed out after 50ms");
        assert!(!AssessmentError::Disabled.is_retryable());
        assert!(AssessmentError::Schema("x".into()).is_retryable());
    }
}
