//! Policy-as-code generation from aggregated findings.
//!
//! A separate stage run after report generation: one external call per
//! finding asking for an OPA Rego policy that would block the issue in
//! future deployments. Generates only; validating or executing the
//! resulting policies is out of scope.

use crate::aggregator::CategorizedFindings;
use crate::enricher::Enricher;
use crate::finding::Finding;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Placeholder stored when a policy call exhausts its retry budget.
pub const POLICY_SENTINEL: &str = "## Failed to generate policy.";

/// One generated policy snippet, tied back to its finding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedPolicy {
    pub finding_id: u64,
    pub title: String,
    pub rego: String,
}

/// Generate one policy per finding, bucket by bucket in severity order.
///
/// Findings without a usable description are skipped; a failed call yields
/// the sentinel snippet rather than dropping the entry, so the output count
/// matches the describable finding count.
pub async fn generate_policies(
    categorized: &CategorizedFindings,
    enricher: &Enricher,
) -> Vec<GeneratedPolicy> {
    let mut policies = Vec::new();
    for (_, bucket) in categorized.iter_buckets() {
        for finding in bucket {
            if finding.description.is_empty() {
                continue;
            }
            let rego = match enricher.call_with_retry(&policy_prompt(finding)).await {
                Ok(text) => text,
                Err(e) => {
                    warn!(id = finding.id, error = %e, "policy generation exhausted retries");
                    POLICY_SENTINEL.to_string()
                }
            };
            policies.push(GeneratedPolicy {
                finding_id: finding.id,
                title: finding.title.clone(),
                rego,
            });
        }
    }
    policies
}

fn policy_prompt(finding: &Finding) -> String {
    format!(
        "You are a cloud security engineer specializing in Kubernetes and \
         Terraform Policy as Code (OPA Rego/Conftest). Based on the following \
         security finding, write an OPA Rego policy that will prevent this \
         issue in future deployments.\n\n\
         Finding: {}\n\n\
         Only output the Rego code, do not explain anything else.",
        finding.description
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::aggregate;
    use crate::config::EnrichmentConfig;
    use crate::enricher::retry::RetryPolicy;
    use crate::error::ServiceError;
    use crate::enricher::client::TextGenerator;
    use crate::finding::{Severity, SourceKind};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct CannedRego;

    #[async_trait]
    impl TextGenerator for CannedRego {
        async fn generate(&self, _prompt: &str) -> Result<String, ServiceError> {
            Ok("package main\n\ndeny[msg] { input.run_as_root; msg := \"no root\" }".to_string())
        }
    }

    struct Unreachable;

    #[async_trait]
    impl TextGenerator for Unreachable {
        async fn generate(&self, _prompt: &str) -> Result<String, ServiceError> {
            Err(ServiceError::Request("connection refused".to_string()))
        }
    }

    fn fast_enricher(generator: Arc<dyn TextGenerator>) -> Enricher {
        let config = EnrichmentConfig {
            retry: RetryPolicy {
                max_attempts: 2,
                delay_ms: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        Enricher::new(generator, &config)
    }

    fn finding(id: u64, description: &str, severity: Severity) -> Finding {
        Finding {
            id,
            source_kind: SourceKind::IacScanner,
            title: format!("CKV_{id}"),
            description: description.to_string(),
            severity,
            severity_inferred: false,
            location: None,
            raw: serde_json::json!({}),
            remediation: None,
            compliance_mapping: None,
        }
    }

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
    }

    #[test]
    fn test_one_policy_per_describable_finding() {
        let categorized = aggregate(vec![
            finding(1, "S3 bucket is public", Severity::High),
            finding(2, "", Severity::Critical),
            finding(3, "security group open to the world", Severity::Low),
        ]);
        let enricher = fast_enricher(Arc::new(CannedRego));

        let rt = runtime();
        let policies = rt.block_on(generate_policies(&categorized, &enricher));

        assert_eq!(policies.len(), 2);
        assert!(policies.iter().all(|p| p.rego.starts_with("package main")));
        assert!(policies.iter().any(|p| p.finding_id == 1));
        assert!(policies.iter().any(|p| p.finding_id == 3));
    }

    #[test]
    fn test_policies_come_out_in_severity_bucket_order() {
        let categorized = aggregate(vec![
            finding(1, "low issue", Severity::Low),
            finding(2, "critical issue", Severity::Critical),
        ]);
        let enricher = fast_enricher(Arc::new(CannedRego));

        let rt = runtime();
        let policies = rt.block_on(generate_policies(&categorized, &enricher));

        assert_eq!(policies[0].finding_id, 2);
        assert_eq!(policies[1].finding_id, 1);
    }

    #[test]
    fn test_failed_call_yields_sentinel_policy() {
        let categorized = aggregate(vec![finding(1, "S3 bucket is public", Severity::High)]);
        let enricher = fast_enricher(Arc::new(Unreachable));

        let rt = runtime();
        let policies = rt.block_on(generate_policies(&categorized, &enricher));

        assert_eq!(policies.len(), 1);
        assert_eq!(policies[0].rego, POLICY_SENTINEL);
    }

    #[test]
    fn test_prompt_carries_the_finding_description() {
        let prompt = policy_prompt(&finding(1, "S3 bucket is public", Severity::High));
        assert!(prompt.contains("S3 bucket is public"));
        assert!(prompt.contains("Rego"));
    }
}
