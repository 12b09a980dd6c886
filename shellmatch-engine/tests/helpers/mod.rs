//! Shared fixtures for shellmatch-engine integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use shellmatch_common::EventBus;
use shellmatch_engine::assessment::{AssessmentError, AssessmentRequest, AssessmentService};
use shellmatch_engine::config::BatchConfig;
use shellmatch_engine::directory::{AccountDirectory, DirectoryError, InMemoryDirectory};
use shellmatch_engine::models::{AccountId, BatchRequest, CustomerRecord, ShellRecord};
use shellmatch_engine::orchestrator::MatchOrchestrator;

/// Account id with the default prefix and a numeric suffix
pub fn account_id(n: u32) -> String {
    format!("001{:012}", n)
}

pub fn customer(n: u32, name: &str, website: Option<&str>) -> CustomerRecord {
    CustomerRecord {
        id: account_id(n),
        name: name.to_string(),
        website: website.map(str::to_string),
        billing_city: None,
        billing_state: None,
        billing_country: None,
        billing_postal_code: None,
    }
}

pub fn shell(n: u32, name: &str, website: Option<&str>) -> ShellRecord {
    ShellRecord {
        id: account_id(n),
        zi_id: format!("zi-{}", n),
        zi_company_name: name.to_string(),
        zi_website: website.map(str::to_string),
        zi_city: None,
        zi_state: None,
        zi_country: None,
        zi_postal_code: None,
        bad_domain: false,
    }
}

pub fn request(customers: &[&CustomerRecord], shells: &[&ShellRecord]) -> BatchRequest {
    BatchRequest {
        customer_ids: customers.iter().map(|c| c.id.clone()).collect(),
        shell_ids: shells.iter().map(|s| s.id.clone()).collect(),
        ..Default::default()
    }
}

/// Fast configuration: no dispatch spacing, short call timeout
pub fn test_config() -> BatchConfig {
    BatchConfig {
        ai_call_spacing_ms: 0,
        ai_call_timeout_ms: 200,
        ..BatchConfig::default()
    }
}

pub fn orchestrator(directory: impl AccountDirectory + 'static, assessment: Arc<dyn AssessmentService>) -> MatchOrchestrator {
    MatchOrchestrator::new(Arc::new(directory), assessment, EventBus::new(256))
}

/// Valid assessment body
pub fn assessment_json(confidence: u8) -> String {
    format!(
        r#"{{"confidence": {}, "explanationBullets": ["Known subsidiary", "Same corporate domain"]}}"#,
        confidence
    )
}

/// Answers every call with the same raw text
pub struct FixedAssessment {
    pub response: String,
    pub calls: AtomicUsize,
}

impl FixedAssessment {
    pub fn new(response: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            response: response.into(),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AssessmentService for FixedAssessment {
    fn name(&self) -> &'static str {
        "fixed"
    }

    async fn assess(&self, _request: &AssessmentRequest) -> Result<String, AssessmentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.response.clone())
    }
}

/// Never answers within any sane timeout
pub struct StalledAssessment {
    pub calls: AtomicUsize,
}

impl StalledAssessment {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AssessmentService for StalledAssessment {
    fn name(&self) -> &'static str {
        "stalled"
    }

    async fn assess(&self, _request: &AssessmentRequest) -> Result<String, AssessmentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(assessment_json(99))
    }
}

/// Answers successfully, cancelling `token` on the first call
pub struct CancellingAssessment {
    pub token: CancellationToken,
    pub calls: AtomicUsize,
}

#[async_trait]
impl AssessmentService for CancellingAssessment {
    fn name(&self) -> &'static str {
        "cancelling"
    }

    async fn assess(&self, _request: &AssessmentRequest) -> Result<String, AssessmentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.token.cancel();
        Ok(assessment_json(80))
    }
}

/// Tracks the peak number of concurrent calls
pub struct ConcurrencyProbe {
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl ConcurrencyProbe {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        })
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AssessmentService for ConcurrencyProbe {
    fn name(&self) -> &'static str {
        "probe"
    }

    async fn assess(&self, _request: &AssessmentRequest) -> Result<String, AssessmentError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(assessment_json(75))
    }
}

/// In-memory directory whose customer chunks fail when they contain a poisoned id
pub struct FlakyDirectory {
    pub inner: InMemoryDirectory,
    pub poisoned: HashSet<String>,
    pub customer_chunks: Mutex<Vec<usize>>,
}

impl FlakyDirectory {
    pub fn new(inner: InMemoryDirectory, poisoned: &[String]) -> Self {
        Self {
            inner,
            poisoned: poisoned.iter().cloned().collect(),
            customer_chunks: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl AccountDirectory for FlakyDirectory {
    fn name(&self) -> &'static str {
        "flaky"
    }

    async fn fetch_customers(&self, ids: &[AccountId]) -> Result<Vec<CustomerRecord>, DirectoryError> {
        self.customer_chunks.lock().unwrap().push(ids.len());
        if ids.iter().any(|id| self.poisoned.contains(id.as_str())) {
            return Err(DirectoryError::ApiError(503, "Service Unavailable".to_string()));
        }
        self.inner.fetch_customers(ids).await
    }

    async fn fetch_shells(&self, ids: &[AccountId]) -> Result<Vec<ShellRecord>, DirectoryError> {
        self.inner.fetch_shells(ids).await
    }
}
