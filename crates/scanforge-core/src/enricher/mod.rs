//! Per-finding remediation and compliance enrichment.
//!
//! Each finding gets at most two external calls: one for a remediation plan
//! and one for a compliance-framework mapping. Both go through the same
//! retry policy, and both resolve to a sentinel value instead of an error
//! when the budget runs out, so enrichment can never sink a run.

pub mod client;
pub mod retry;

use crate::config::EnrichmentConfig;
use crate::error::ServiceError;
use crate::finding::Finding;
use client::TextGenerator;
use retry::RetryPolicy;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, warn};

/// Placeholder stored when enrichment exhausts its retry budget. Report
/// consumers use it to tell "could not enrich" apart from "no issue".
pub const SENTINEL: &str = "unavailable";

/// Spaces outgoing calls at least `interval` apart, shared by all workers.
pub struct RateLimiter {
    interval: Duration,
    next_slot: Mutex<Instant>,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_slot: Mutex::new(Instant::now()),
        }
    }

    /// Reserve the next send slot and sleep until it arrives.
    pub async fn wait(&self) {
        let deadline = {
            let mut next = self.next_slot.lock().await;
            let now = Instant::now();
            let deadline = (*next).max(now);
            *next = deadline + self.interval;
            deadline
        };
        tokio::time::sleep_until(deadline).await;
    }
}

/// Issues enrichment calls for findings, bounded by a worker pool.
#[derive(Clone)]
pub struct Enricher {
    generator: Arc<dyn TextGenerator>,
    retry: RetryPolicy,
    limiter: Option<Arc<RateLimiter>>,
    frameworks: Vec<String>,
}

impl Enricher {
    pub fn new(generator: Arc<dyn TextGenerator>, config: &EnrichmentConfig) -> Self {
        let limiter = (config.min_call_interval_ms > 0).then(|| {
            Arc::new(RateLimiter::new(Duration::from_millis(
                config.min_call_interval_ms,
            )))
        });
        Self {
            generator,
            retry: config.retry.clone(),
            limiter,
            frameworks: config.frameworks.clone(),
        }
    }

    /// One prompt through the retry budget. Every attempt, timed out or
    /// failed outright, counts against `max_attempts`.
    pub async fn call_with_retry(&self, prompt: &str) -> Result<String, ServiceError> {
        let mut last_err = ServiceError::Request("no attempts made".to_string());
        for attempt in 1..=self.retry.max_attempts {
            if let Some(limiter) = &self.limiter {
                limiter.wait().await;
            }
            let outcome = timeout(self.retry.attempt_timeout(), self.generator.generate(prompt)).await;
            match outcome {
                Ok(Ok(text)) => return Ok(text),
                Ok(Err(e)) => {
                    warn!(attempt, error = %e, "text-generation attempt failed");
                    last_err = e;
                }
                Err(_) => {
                    warn!(attempt, "text-generation attempt timed out");
                    last_err = ServiceError::Timeout(self.retry.attempt_timeout_secs);
                }
            }
            if attempt < self.retry.max_attempts {
                sleep(self.retry.delay_after(attempt)).await;
            }
        }
        Err(last_err)
    }

    /// Enrich one finding. Idempotent: a finding that already carries
    /// remediation text is returned untouched, with zero external calls.
    pub async fn enrich(&self, mut finding: Finding) -> Finding {
        if finding.is_enriched() {
            debug!(id = finding.id, "already enriched, skipping");
            return finding;
        }

        let remediation = match self.call_with_retry(&remediation_prompt(&finding)).await {
            Ok(text) => text,
            Err(e) => {
                warn!(id = finding.id, error = %e, "remediation enrichment exhausted retries");
                SENTINEL.to_string()
            }
        };
        finding.remediation = Some(remediation);

        // Compliance is independent of remediation; one failing does not
        // void the other.
        let mapping = match self
            .call_with_retry(&compliance_prompt(&finding, &self.frameworks))
            .await
        {
            Ok(text) => parse_compliance_mapping(&text, &self.frameworks),
            Err(e) => {
                warn!(id = finding.id, error = %e, "compliance enrichment exhausted retries");
                self.frameworks
                    .iter()
                    .map(|f| (f.clone(), SENTINEL.to_string()))
                    .collect()
            }
        };
        finding.compliance_mapping = Some(mapping);

        finding
    }

    /// Enrich a batch with at most `concurrency` calls in flight. Output
    /// order matches input order regardless of completion order: results
    /// are written back into each finding's original slot.
    pub async fn enrich_all(&self, findings: Vec<Finding>, concurrency: usize) -> Vec<Finding> {
        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        let mut handles = Vec::with_capacity(findings.len());

        for (slot, finding) in findings.iter().enumerate() {
            let finding = finding.clone();
            let enricher = self.clone();
            let semaphore = Arc::clone(&semaphore);
            handles.push(tokio::spawn(async move {
                // Closed only if the semaphore is dropped, which cannot
                // happen while this task holds a clone.
                let _permit = semaphore.acquire().await.expect("semaphore closed");
                (slot, enricher.enrich(finding).await)
            }));
        }

        // A worker that dies keeps its finding un-enriched in place; the
        // report never loses a finding to an enrichment failure.
        let mut out = findings;
        for handle in handles {
            match handle.await {
                Ok((slot, finding)) => out[slot] = finding,
                Err(e) => warn!(error = %e, "enrichment worker failed, keeping finding un-enriched"),
            }
        }
        out
    }
}

fn remediation_prompt(finding: &Finding) -> String {
    format!(
        "You are a cybersecurity expert. Provide a step-by-step, actionable \
         remediation plan for the following vulnerability or misconfiguration. \
         Be clear and concise.\n\nFinding: {} - {}",
        finding.title, finding.description
    )
}

fn compliance_prompt(finding: &Finding, frameworks: &[String]) -> String {
    format!(
        "You are a cybersecurity compliance expert. Map the following finding \
         to these frameworks: {}.\n\
         Respond with exactly one line per framework, in the form \
         '<framework>: <control IDs violated and why>'.\n\n\
         Finding: {} - {}",
        frameworks.join(", "),
        finding.title,
        finding.description
    )
}

/// Pull per-framework lines out of the response. Frameworks the model did
/// not address are simply absent from the mapping.
fn parse_compliance_mapping(text: &str, frameworks: &[String]) -> BTreeMap<String, String> {
    let mut mapping = BTreeMap::new();
    for framework in frameworks {
        let explanation = text
            .lines()
            .map(str::trim)
            .find_map(|line| line.strip_prefix(framework.as_str()))
            .map(|rest| rest.trim_start_matches(':').trim().to_string())
            .filter(|s| !s.is_empty());
        if let Some(explanation) = explanation {
            mapping.insert(framework.clone(), explanation);
        }
    }
    // Nothing matched the expected layout: keep the whole response rather
    // than dropping paid-for output.
    if mapping.is_empty() && !text.trim().is_empty() {
        mapping.insert("general".to_string(), text.trim().to_string());
    }
    mapping
}
