use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use tracing::warn;

/// One successfully parsed input document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDocument {
    pub path: String,
    pub value: Value,
}

/// A recorded, non-fatal load problem. Carried into the report dataset so
/// consumers can tell a clean run from one with unreadable inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadFailure {
    pub path: String,
    pub reason: String,
}

/// Everything one `load` call produced, in input match order.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct LoadReport {
    pub documents: Vec<RawDocument>,
    pub failures: Vec<LoadFailure>,
}

impl LoadReport {
    pub fn merge(&mut self, other: LoadReport) {
        self.documents.extend(other.documents);
        self.failures.extend(other.failures);
    }
}

/// Expand a glob pattern (or plain path) and parse every match as JSON.
///
/// Tolerant by contract: directories are skipped, unreadable or malformed
/// files are recorded as failures, a pattern with no matches is recorded as
/// a failure for the pattern itself. Never returns an error and never drops
/// the rest of the inputs over one bad file.
pub fn load(pattern: &str) -> LoadReport {
    let mut report = LoadReport::default();

    let paths = match glob::glob(pattern) {
        Ok(paths) => paths,
        Err(e) => {
            record_failure(&mut report, pattern, format!("invalid glob pattern: {e}"));
            return report;
        }
    };

    let mut matched = false;
    for entry in paths {
        let path = match entry {
            Ok(path) => path,
            Err(e) => {
                record_failure(&mut report, pattern, format!("unreadable match: {e}"));
                continue;
            }
        };
        matched = true;
        load_file(&path, &mut report);
    }

    if !matched {
        record_failure(&mut report, pattern, "no files matched pattern".to_string());
    }

    report
}

fn load_file(path: &Path, report: &mut LoadReport) {
    if path.is_dir() {
        record_failure(report, path.display().to_string(), "path is a directory, not a file".to_string());
        return;
    }

    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            record_failure(report, path.display().to_string(), format!("read failed: {e}"));
            return;
        }
    };

    match serde_json::from_str::<Value>(&content) {
        Ok(Value::Array(elements)) => {
            // Some scanners emit one document per target wrapped in a
            // top-level array; each object element is its own document.
            for (idx, element) in elements.into_iter().enumerate() {
                let element_path = format!("{}[{idx}]", path.display());
                if element.is_object() {
                    report.documents.push(RawDocument {
                        path: element_path,
                        value: element,
                    });
                } else {
                    record_failure(report, element_path, "unexpected JSON structure".to_string());
                }
            }
        }
        Ok(value @ Value::Object(_)) => report.documents.push(RawDocument {
            path: path.display().to_string(),
            value,
        }),
        Ok(_) => {
            record_failure(report, path.display().to_string(), "unexpected JSON structure".to_string());
        }
        Err(e) => {
            record_failure(report, path.display().to_string(), format!("malformed JSON: {e}"));
        }
    }
}

fn record_failure(report: &mut LoadReport, path: impl Into<String>, reason: String) {
    let path = path.into();
    warn!(path = %path, %reason, "skipping input");
    report.failures.push(LoadFailure { path, reason });
}
