use crate::enricher::retry::RetryPolicy;
use crate::error::PipelineError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Compliance frameworks requested when no explicit list is configured.
///
/// The framework set is deliberately configurable; this default mirrors the
/// set most report consumers ask for.
pub const DEFAULT_FRAMEWORKS: &[&str] = &[
    "NIST 800-53",
    "CIS Benchmarks",
    "PCI DSS",
    "ISO 27001",
    "SOC 2",
    "HIPAA",
];

/// Environment variable holding the text-generation service credential.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Everything one report run needs, built once in `main` and passed by
/// reference into every stage. Nothing re-reads the environment mid-run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Client name stamped onto the report dataset.
    pub client: String,

    /// Resource group or project the scans cover.
    pub resource_group: String,

    /// Credential for the text-generation service. Checked exactly once
    /// before any enrichment worker starts.
    #[serde(skip_serializing, default)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub enrichment: EnrichmentConfig,
}

/// Tunables for the enrichment stage, loadable from `scanforge.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default)]
    pub retry: RetryPolicy,

    /// Maximum enrichment calls in flight at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Minimum spacing between outgoing calls, in milliseconds. Zero
    /// disables the limiter.
    #[serde(default)]
    pub min_call_interval_ms: u64,

    /// Compliance frameworks to map findings against.
    #[serde(default = "default_frameworks")]
    pub frameworks: Vec<String>,
}

fn default_model() -> String {
    "gpt-4".to_string()
}

fn default_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_concurrency() -> usize {
    4
}

fn default_frameworks() -> Vec<String> {
    DEFAULT_FRAMEWORKS.iter().map(|s| s.to_string()).collect()
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            endpoint: default_endpoint(),
            retry: RetryPolicy::default(),
            concurrency: default_concurrency(),
            min_call_interval_ms: 0,
            frameworks: default_frameworks(),
        }
    }
}

impl EnrichmentConfig {
    /// Load enrichment settings from a `scanforge.toml` file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file '{}'", path.display()))
    }
}

impl RunConfig {
    pub fn new(client: impl Into<String>, resource_group: impl Into<String>) -> Self {
        Self {
            client: client.into(),
            resource_group: resource_group.into(),
            api_key: std::env::var(API_KEY_ENV).ok(),
            enrichment: EnrichmentConfig::default(),
        }
    }

    /// The one fatal precondition: a usable credential must be present
    /// before any billable call is issued.
    pub fn require_credential(&self) -> Result<&str, PipelineError> {
        match self.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(PipelineError::Config(format!(
                "{API_KEY_ENV} is not set; refusing to start enrichment"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_credential_is_config_error() {
        let config = RunConfig {
            client: "acme".into(),
            resource_group: "prod".into(),
            api_key: None,
            enrichment: EnrichmentConfig::default(),
        };
        assert!(matches!(
            config.require_credential(),
            Err(PipelineError::Config(_))
        ));
    }

    #[test]
    fn test_blank_credential_is_config_error() {
        let config = RunConfig {
            client: "acme".into(),
            resource_group: "prod".into(),
            api_key: Some("   ".into()),
            enrichment: EnrichmentConfig::default(),
        };
        assert!(config.require_credential().is_err());
    }

    #[test]
    fn test_enrichment_config_from_toml() {
        let parsed: EnrichmentConfig = toml::from_str(
            r#"
            model = "gpt-4o"
            concurrency = 8

            [retry]
            max_attempts = 5
            delay_ms = 250
            backoff = "exponential"
            "#,
        )
        .unwrap();
        assert_eq!(parsed.model, "gpt-4o");
        assert_eq!(parsed.concurrency, 8);
        assert_eq!(parsed.retry.max_attempts, 5);
        // Unspecified fields keep their defaults.
        assert_eq!(parsed.frameworks.len(), DEFAULT_FRAMEWORKS.len());
    }

    #[test]
    fn test_default_frameworks_cover_common_set() {
        let defaults = default_frameworks();
        assert!(defaults.iter().any(|f| f.contains("NIST")));
        assert!(defaults.iter().any(|f| f.contains("ISO 27001")));
    }
}
