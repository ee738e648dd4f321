pub mod aggregator;
pub mod config;
pub mod enricher;
pub mod error;
pub mod finding;
pub mod loader;
pub mod normalizer;
pub mod pipeline;
pub mod policy_gen;
pub mod report;
pub mod summary;

pub use aggregator::CategorizedFindings;
pub use config::{EnrichmentConfig, RunConfig};
pub use error::{PipelineError, ServiceError};
pub use finding::{Finding, Severity, SourceKind};
pub use pipeline::ScanInputs;
pub use report::ReportDataset;
