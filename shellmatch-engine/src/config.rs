//! Configuration resolution for shellmatch-engine
//!
//! Provides multi-tier configuration resolution with ENV → TOML → built-in
//! default priority. Batch tuning values are validated before any job starts.

use serde::{Deserialize, Serialize};
use shellmatch_common::config::{env_override, load_toml_config, resolve_config_path, LoggingConfig};
use shellmatch_common::{Error, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::error::MatchError;

/// Module name used for the default config file location
pub const MODULE_NAME: &str = "shellmatch-engine";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub matching: BatchConfig,

    #[serde(default)]
    pub directory: DirectorySettings,

    #[serde(default)]
    pub assessment: AssessmentSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            logging: LoggingConfig::default(),
            matching: BatchConfig::default(),
            directory: DirectorySettings::default(),
            assessment: AssessmentSettings::default(),
        }
    }
}

/// Batch tuning and strictness options
///
/// None of these change the scoring formulas; they only bound throughput
/// and decide how strict classification is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Maximum ids per directory request (1..=2000)
    #[serde(default = "default_directory_chunk_size")]
    pub directory_chunk_size: usize,

    /// Concurrent external assessments (1..=64)
    #[serde(default = "default_ai_concurrency")]
    pub ai_concurrency: usize,

    /// Minimum spacing between successive assessment dispatches, globally
    #[serde(default = "default_ai_call_spacing_ms")]
    pub ai_call_spacing_ms: u64,

    /// Per-call assessment timeout
    #[serde(default = "default_ai_call_timeout_ms")]
    pub ai_call_timeout_ms: u64,

    /// Minimum rank score for a MATCHED classification (0.0..=100.0)
    #[serde(default = "default_min_rank_score")]
    pub min_rank_score: f64,

    /// Cap on the full-universe fallback when a customer has no blocking key hit
    #[serde(default = "default_fallback_candidate_cap")]
    pub fallback_candidate_cap: usize,

    /// Registered domains that disqualify a record from matching
    #[serde(default = "default_disallowed_domains")]
    pub disallowed_domains: Vec<String>,

    /// Legal-entity suffix tokens stripped from the end of company names
    #[serde(default = "default_legal_suffixes")]
    pub legal_suffixes: Vec<String>,

    /// Public suffixes spanning two labels (registered domain keeps three labels)
    #[serde(default = "default_multi_label_suffixes")]
    pub multi_label_suffixes: Vec<String>,

    /// Required account id prefix ("" disables the check)
    #[serde(default = "default_account_id_prefix")]
    pub account_id_prefix: String,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            directory_chunk_size: default_directory_chunk_size(),
            ai_concurrency: default_ai_concurrency(),
            ai_call_spacing_ms: default_ai_call_spacing_ms(),
            ai_call_timeout_ms: default_ai_call_timeout_ms(),
            min_rank_score: default_min_rank_score(),
            fallback_candidate_cap: default_fallback_candidate_cap(),
            disallowed_domains: default_disallowed_domains(),
            legal_suffixes: default_legal_suffixes(),
            multi_label_suffixes: default_multi_label_suffixes(),
            account_id_prefix: default_account_id_prefix(),
        }
    }
}

/// Per-request overrides merged onto the service's `BatchConfig`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchConfigOverride {
    pub directory_chunk_size: Option<usize>,
    pub ai_concurrency: Option<usize>,
    pub ai_call_spacing_ms: Option<u64>,
    pub ai_call_timeout_ms: Option<u64>,
    pub min_rank_score: Option<f64>,
    pub fallback_candidate_cap: Option<usize>,
    pub disallowed_domains: Option<Vec<String>>,
}

impl BatchConfig {
    /// Reject values that would make a run meaningless or unbounded
    pub fn validate(&self) -> std::result::Result<(), MatchError> {
        if !(1..=2000).contains(&self.directory_chunk_size) {
            return Err(MatchError::Configuration(format!(
                "directory_chunk_size must be in 1..=2000, got {}",
                self.directory_chunk_size
            )));
        }
        if !(1..=64).contains(&self.ai_concurrency) {
            return Err(MatchError::Configuration(format!(
                "ai_concurrency must be in 1..=64, got {}",
                self.ai_concurrency
            )));
        }
        if self.ai_call_spacing_ms > 60_000 {
            return Err(MatchError::Configuration(format!(
                "ai_call_spacing_ms must be at most 60000, got {}",
                self.ai_call_spacing_ms
            )));
        }
        if !(1..=600_000).contains(&self.ai_call_timeout_ms) {
            return Err(MatchError::Configuration(format!(
                "ai_call_timeout_ms must be in 1..=600000, got {}",
                self.ai_call_timeout_ms
            )));
        }
        if !self.min_rank_score.is_finite() || !(0.0..=100.0).contains(&self.min_rank_score) {
            return Err(MatchError::Configuration(format!(
                "min_rank_score must be in 0.0..=100.0, got {}",
                self.min_rank_score
            )));
        }
        if self.fallback_candidate_cap == 0 {
            return Err(MatchError::Configuration(
                "fallback_candidate_cap must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Merge a request override, then validate the result
    pub fn with_override(
        &self,
        overrides: Option<&BatchConfigOverride>,
    ) -> std::result::Result<BatchConfig, MatchError> {
        let mut merged = self.clone();

        if let Some(o) = overrides {
            if let Some(v) = o.directory_chunk_size {
                merged.directory_chunk_size = v;
            }
            if let Some(v) = o.ai_concurrency {
                merged.ai_concurrency = v;
            }
            if let Some(v) = o.ai_call_spacing_ms {
                merged.ai_call_spacing_ms = v;
            }
            if let Some(v) = o.ai_call_timeout_ms {
                merged.ai_call_timeout_ms = v;
            }
            if let Some(v) = o.min_rank_score {
                merged.min_rank_score = v;
            }
            if let Some(v) = o.fallback_candidate_cap {
                merged.fallback_candidate_cap = v;
            }
            if let Some(v) = &o.disallowed_domains {
                merged.disallowed_domains = v.clone();
            }
        }

        merged.validate()?;
        Ok(merged)
    }

    pub fn ai_call_spacing(&self) -> Duration {
        Duration::from_millis(self.ai_call_spacing_ms)
    }

    pub fn ai_call_timeout(&self) -> Duration {
        Duration::from_millis(self.ai_call_timeout_ms)
    }
}

/// External account directory settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectorySettings {
    /// REST endpoint of the account directory
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default)]
    pub api_token: Option<String>,

    /// JSON snapshot used instead of the REST directory (offline mode)
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,

    #[serde(default = "default_directory_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for DirectorySettings {
    fn default() -> Self {
        Self {
            base_url: None,
            api_token: None,
            snapshot_path: None,
            request_timeout_secs: default_directory_timeout_secs(),
        }
    }
}

/// External assessment service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentSettings {
    #[serde(default = "default_assessment_base_url")]
    pub base_url: String,

    #[serde(default = "default_assessment_model")]
    pub model: String,

    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for AssessmentSettings {
    fn default() -> Self {
        Self {
            base_url: default_assessment_base_url(),
            model: default_assessment_model(),
            api_key: None,
        }
    }
}

impl EngineConfig {
    /// Resolve, load and validate the engine configuration
    ///
    /// **Priority:** ENV → TOML → built-in defaults
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        let path = resolve_config_path(cli_path, "SHELLMATCH_CONFIG", MODULE_NAME);
        let mut config: EngineConfig = load_toml_config(path.as_deref())?;

        if let Some(port) = env_override::<u16>("SHELLMATCH_PORT")? {
            info!("Port overridden from environment: {}", port);
            config.port = port;
        }
        if let Some(v) = env_override::<usize>("SHELLMATCH_AI_CONCURRENCY")? {
            config.matching.ai_concurrency = v;
        }
        if let Some(v) = env_override::<u64>("SHELLMATCH_AI_CALL_SPACING_MS")? {
            config.matching.ai_call_spacing_ms = v;
        }
        if let Some(v) = env_override::<usize>("SHELLMATCH_DIRECTORY_CHUNK_SIZE")? {
            config.matching.directory_chunk_size = v;
        }

        config
            .matching
            .validate()
            .map_err(|e| Error::Config(e.to_string()))?;

        config.assessment.api_key = resolve_assessment_api_key(&config.assessment);

        Ok(config)
    }
}

/// Resolve the assessment API key
///
/// **Priority:** ENV → TOML. Returns `None` when no usable key exists, in
/// which case every assessment falls back to provisional confidence.
pub fn resolve_assessment_api_key(settings: &AssessmentSettings) -> Option<String> {
    let env_key = std::env::var("SHELLMATCH_ASSESSMENT_API_KEY")
        .ok()
        .filter(|k| is_valid_key(k));
    let toml_key = settings.api_key.clone().filter(|k| is_valid_key(k));

    if env_key.is_some() && toml_key.is_some() {
        warn!("Assessment API key found in both environment and TOML. Using environment.");
    }

    match (env_key, toml_key) {
        (Some(key), _) => {
            info!("Assessment API key loaded from environment variable");
            Some(key)
        }
        (None, Some(key)) => {
            info!("Assessment API key loaded from TOML config");
            Some(key)
        }
        (None, None) => {
            warn!("No assessment API key configured; matched pairs will keep provisional confidence");
            None
        }
    }
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

// Default value functions
fn default_port() -> u16 {
    5790
}

fn default_directory_chunk_size() -> usize {
    200
}

fn default_ai_concurrency() -> usize {
    10
}

fn default_ai_call_spacing_ms() -> u64 {
    1000
}

fn default_ai_call_timeout_ms() -> u64 {
    30_000
}

fn default_min_rank_score() -> f64 {
    20.0
}

fn default_fallback_candidate_cap() -> usize {
    500
}

fn default_directory_timeout_secs() -> u64 {
    30
}

fn default_account_id_prefix() -> String {
    "001".to_string()
}

fn default_assessment_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_assessment_model() -> String {
    "gpt-4o".to_string()
}

fn default_disallowed_domains() -> Vec<String> {
    [
        "gmail.com",
        "googlemail.com",
        "yahoo.com",
        "ymail.com",
        "hotmail.com",
        "outlook.com",
        "live.com",
        "msn.com",
        "aol.com",
        "icloud.com",
        "me.com",
        "mac.com",
        "protonmail.com",
        "proton.me",
        "gmx.com",
        "mail.com",
        "zoho.com",
        "yandex.com",
        "comcast.net",
        "att.net",
        "verizon.net",
        "example.com",
        "test.com",
        "none.com",
        "na.com",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_legal_suffixes() -> Vec<String> {
    [
        "inc",
        "incorporated",
        "corp",
        "corporation",
        "ltd",
        "limited",
        "llc",
        "llp",
        "lp",
        "plc",
        "gmbh",
        "ag",
        "sa",
        "bv",
        "nv",
        "pty",
        "co",
        "company",
        "group",
        "holdings",
        "enterprises",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_multi_label_suffixes() -> Vec<String> {
    [
        "co.uk", "org.uk", "ac.uk", "gov.uk", "ltd.uk", "plc.uk", "com.au", "net.au",
        "org.au", "co.nz", "org.nz", "co.jp", "ne.jp", "or.jp", "co.in", "net.in", "org.in",
        "com.br", "com.mx", "com.ar", "com.cn", "com.hk", "com.sg", "com.tw", "co.za",
        "co.kr", "com.tr",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
