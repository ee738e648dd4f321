use crate::aggregator::CategorizedFindings;
use crate::loader::LoadFailure;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The complete, JSON-serializable output of one report run. This is the
/// hand-off to the external report renderer; nothing here survives the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportDataset {
    pub client: String,
    pub resource_group: String,
    pub generated_on: DateTime<Utc>,
    pub findings: CategorizedFindings,
    /// Inputs that could not be loaded, visible so consumers can tell a
    /// clean run from a partial one.
    pub load_failures: Vec<LoadFailure>,
    /// Pipeline-level devsecops recommendation; absent when summary
    /// generation failed or enrichment was skipped.
    pub recommendation: Option<String>,
}

impl ReportDataset {
    pub fn total_findings(&self) -> usize {
        self.findings.total()
    }
}
