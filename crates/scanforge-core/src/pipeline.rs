//! End-to-end orchestration: load, normalize, enrich, aggregate, summarize.
//!
//! Every stage absorbs its own failures; the only error that can escape is
//! a missing credential, raised before a single external call is made.

use crate::aggregator;
use crate::config::RunConfig;
use crate::enricher::client::{OpenAiClient, TextGenerator};
use crate::enricher::Enricher;
use crate::error::PipelineError;
use crate::finding::{Finding, IdGen, SourceKind};
use crate::loader::{self, LoadReport};
use crate::normalizer;
use crate::report::ReportDataset;
use crate::summary;
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

/// Input patterns for one run, grouped by the scanner that produced them.
/// Each entry may be a plain path or a glob pattern.
#[derive(Debug, Clone, Default)]
pub struct ScanInputs {
    pub vuln_scans: Vec<String>,
    pub iac_scans: Vec<String>,
    pub policy_scans: Vec<String>,
}

impl ScanInputs {
    fn by_kind(&self) -> [(SourceKind, &[String]); 3] {
        [
            (SourceKind::VulnScanner, self.vuln_scans.as_slice()),
            (SourceKind::IacScanner, self.iac_scans.as_slice()),
            (SourceKind::PolicyEngine, self.policy_scans.as_slice()),
        ]
    }
}

/// Run the full pipeline against the real text-generation service.
///
/// The credential check happens first and is the sole fatal condition.
pub async fn run(config: &RunConfig, inputs: &ScanInputs) -> Result<ReportDataset, PipelineError> {
    let api_key = config.require_credential()?;
    let client = OpenAiClient::new(api_key, &config.enrichment)
        .map_err(|e| PipelineError::Config(e.to_string()))?;
    Ok(run_with_generator(config, inputs, Some(Arc::new(client))).await)
}

/// Run the pipeline with an explicit generator, or none to skip enrichment
/// entirely. Infallible: every scan-side problem ends up in the dataset.
pub async fn run_with_generator(
    config: &RunConfig,
    inputs: &ScanInputs,
    generator: Option<Arc<dyn TextGenerator>>,
) -> ReportDataset {
    let mut ids = IdGen::new();
    let mut load_report = LoadReport::default();
    let mut findings: Vec<Finding> = Vec::new();

    for (kind, patterns) in inputs.by_kind() {
        for pattern in patterns {
            let report = loader::load(pattern);
            for doc in &report.documents {
                findings.extend(normalizer::normalize(doc, kind, &mut ids));
            }
            load_report.merge(report);
        }
    }
    info!(
        findings = findings.len(),
        load_failures = load_report.failures.len(),
        "normalization complete"
    );

    let mut recommendation = None;
    if let Some(generator) = generator {
        let enricher = Enricher::new(generator, &config.enrichment);
        findings = enricher
            .enrich_all(findings, config.enrichment.concurrency)
            .await;
        info!(findings = findings.len(), "enrichment complete");

        let categorized = aggregator::aggregate(findings);
        recommendation = summary::summarize(&categorized, &enricher).await;
        return assemble(config, categorized, load_report, recommendation);
    }

    info!("enrichment skipped, no generator configured");
    let categorized = aggregator::aggregate(findings);
    assemble(config, categorized, load_report, recommendation)
}

fn assemble(
    config: &RunConfig,
    findings: aggregator::CategorizedFindings,
    load_report: LoadReport,
    recommendation: Option<String>,
) -> ReportDataset {
    ReportDataset {
        client: config.client.clone(),
        resource_group: config.resource_group.clone(),
        generated_on: Utc::now(),
        findings,
        load_failures: load_report.failures,
        recommendation,
    }
}
