//! Assessment adapter
//!
//! Validates the untrusted response text, retries once on timeout, schema
//! or transport failure, and blends the outcome into a matched result.

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{AssessmentError, AssessmentRequest, AssessmentService};
use crate::models::{AssessmentStatus, MatchResult};
use crate::orchestrator::rate_limiter::RateLimiter;

const MAX_ATTEMPTS: usize = 2;

/// A validated assessment
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    pub confidence: u8,
    pub explanation_bullets: Vec<String>,
}

pub struct AssessmentAdapter {
    service: Arc<dyn AssessmentService>,
    rate_limiter: Arc<RateLimiter>,
    call_timeout: Duration,
    cancel: CancellationToken,
}

impl AssessmentAdapter {
    pub fn new(service: Arc<dyn AssessmentService>, rate_limiter: Arc<RateLimiter>, call_timeout: Duration) -> Self {
        Self {
            service,
            rate_limiter,
            call_timeout,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop dispatching once `cancel` fires; in-flight calls still finish
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Assess one pair: at most two attempts, each spaced and time-bounded
    pub async fn assess(&self, request: &AssessmentRequest) -> Result<Assessment, AssessmentError> {
        let mut attempt = 1;
        loop {
            match self.attempt(request).await {
                Ok(assessment) => return Ok(assessment),
                Err(e) if e.is_retryable() && attempt < MAX_ATTEMPTS => {
                    warn!(
                        service = self.service.name(),
                        attempt,
                        error = %e,
                        "Assessment attempt failed, retrying"
                    );
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn attempt(&self, request: &AssessmentRequest) -> Result<Assessment, AssessmentError> {
        tokio::select! {
            _ = self.rate_limiter.wait() => {}
            _ = self.cancel.cancelled() => return Err(AssessmentError::Cancelled),
        }
        if self.cancel.is_cancelled() {
            return Err(AssessmentError::Cancelled);
        }

        let raw = tokio::time::timeout(self.call_timeout, self.service.assess(request))
            .await
            .map_err(|_| AssessmentError::Timeout(self.call_timeout))??;

        debug!(bytes = raw.len(), "Assessment response received");
        parse_assessment(&raw)
    }
}

/// Make a successful assessment authoritative on a matched result
///
/// The computed signals stay attached for audit.
pub fn apply_assessment(result: &mut MatchResult, assessment: Assessment) {
    result.confidence = assessment.confidence;
    result.explanation_bullets = assessment.explanation_bullets;
    result.assessment = AssessmentStatus::Assessed;
}

/// Keep the provisional confidence and note why no assessment applies
pub fn mark_unavailable(result: &mut MatchResult, reason: String) {
    if let Some(provisional) = result.provisional_confidence {
        result.confidence = provisional;
    }
    result.explanation_bullets.push(format!(
        "External assessment unavailable ({}); confidence is the provisional signal-based score",
        reason
    ));
    result.assessment = AssessmentStatus::Unavailable { reason };
}

/// Validate raw response text against `{confidence, explanationBullets}`
///
/// Markdown code fences and text around the outermost object are tolerated.
/// Unknown keys, a confidence that is not an integer in 0..=100, and a
/// missing, empty or non-string bullet list are rejected.
pub fn parse_assessment(raw: &str) -> Result<Assessment, AssessmentError> {
    let body = extract_json_object(raw)
        .ok_or_else(|| AssessmentError::Schema("response contains no JSON object".to_string()))?;

    let value: Value = serde_json::from_str(body)
        .map_err(|e| AssessmentError::Schema(format!("invalid JSON: {}", e)))?;

    let Value::Object(map) = value else {
        return Err(AssessmentError::Schema("response is not a JSON object".to_string()));
    };

    let mut confidence: Option<Value> = None;
    let mut bullets: Option<Value> = None;

    for (key, value) in map {
        let slot = match key.as_str() {
            "confidence" | "confidence_score" => &mut confidence,
            "explanationBullets" | "explanation_bullets" => &mut bullets,
            other => {
                return Err(AssessmentError::Schema(format!("unexpected key '{}'", other)));
            }
        };
        if slot.replace(value).is_some() {
            return Err(AssessmentError::Schema(format!("duplicate field '{}'", key)));
        }
    }

    let confidence = confidence
        .ok_or_else(|| AssessmentError::Schema("missing confidence".to_string()))?
        .as_u64()
        .filter(|c| *c <= 100)
        .ok_or_else(|| AssessmentError::Schema("confidence must be an integer in 0..=100".to_string()))?;

    let bullets = match bullets {
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(AssessmentError::Schema("explanationBullets must be a list".to_string()));
        }
        None => return Err(AssessmentError::Schema("missing explanationBullets".to_string())),
    };
    if bullets.is_empty() {
        return Err(AssessmentError::Schema("explanationBullets is empty".to_string()));
    }

    let explanation_bullets = bullets
        .into_iter()
        .map(|b| match b {
            Value::String(s) => Ok(s.trim().to_string()),
            _ => Err(AssessmentError::Schema("explanation bullet is not a string".to_string())),
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Assessment {
        confidence: confidence as u8,
        explanation_bullets,
    })
}

/// Outermost `{...}` after removing markdown code fences
fn extract_json_object(raw: &str) -> Option<&str> {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```") {
        // drop the info string ("json") on the fence line
        text = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
        text = text.trim_end().trim_end_matches("```");
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}
