use serde_json::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Severity level for normalized findings.
///
/// Scanner input is mapped onto this closed set; anything a scanner reports
/// outside of it becomes `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Unknown,
}

impl Severity {
    pub fn priority(&self) -> u8 {
        match self {
            Severity::Critical => 5,
            Severity::High => 4,
            Severity::Medium => 3,
            Severity::Low => 2,
            Severity::Unknown => 1,
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::High => "HIGH",
            Severity::Medium => "MEDIUM",
            Severity::Low => "LOW",
            Severity::Unknown => "UNKNOWN",
        }
    }

    pub fn color_code(&self) -> &str {
        match self {
            Severity::Critical => "red",
            Severity::High => "yellow",
            Severity::Medium => "yellow",
            Severity::Low => "blue",
            Severity::Unknown => "white",
        }
    }

    /// Parse a scanner-supplied severity string, case-insensitively.
    pub fn parse(raw: &str) -> Option<Severity> {
        match raw.to_uppercase().as_str() {
            "CRITICAL" => Some(Severity::Critical),
            "HIGH" => Some(Severity::High),
            "MEDIUM" => Some(Severity::Medium),
            "LOW" => Some(Severity::Low),
            "UNKNOWN" => Some(Severity::Unknown),
            _ => None,
        }
    }
}

/// Which scanner family produced a raw record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    VulnScanner,
    IacScanner,
    PolicyEngine,
    Unknown,
}

impl SourceKind {
    pub fn label(&self) -> &str {
        match self {
            SourceKind::VulnScanner => "vuln-scanner",
            SourceKind::IacScanner => "iac-scanner",
            SourceKind::PolicyEngine => "policy-engine",
            SourceKind::Unknown => "unknown",
        }
    }
}

/// A single normalized security finding.
///
/// Created once by the normalizer, optionally enriched with remediation and
/// compliance text, then read-only from aggregation onward. `raw` always
/// carries the untouched source record for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub id: u64,
    pub source_kind: SourceKind,
    pub title: String,
    pub description: String,
    pub severity: Severity,
    /// True when the scanner supplied no severity and Medium was assumed.
    pub severity_inferred: bool,
    pub location: Option<String>,
    pub raw: Value,
    pub remediation: Option<String>,
    pub compliance_mapping: Option<BTreeMap<String, String>>,
}

impl Finding {
    pub fn is_enriched(&self) -> bool {
        self.remediation.is_some()
    }
}

/// Hands out finding ids, unique within one report run.
#[derive(Debug, Default)]
pub struct IdGen {
    next: u64,
}

impl IdGen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> u64 {
        self.next += 1;
        self.next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_parse_is_case_insensitive() {
        assert_eq!(Severity::parse("critical"), Some(Severity::Critical));
        assert_eq!(Severity::parse("HiGh"), Some(Severity::High));
        assert_eq!(Severity::parse("LOW"), Some(Severity::Low));
        assert_eq!(Severity::parse("negligible"), None);
    }

    #[test]
    fn test_severity_priority_ordering() {
        assert!(Severity::Critical.priority() > Severity::High.priority());
        assert!(Severity::High.priority() > Severity::Medium.priority());
        assert!(Severity::Medium.priority() > Severity::Low.priority());
        assert!(Severity::Low.priority() > Severity::Unknown.priority());
    }

    #[test]
    fn test_id_gen_is_monotone() {
        let mut ids = IdGen::new();
        let a = ids.next_id();
        let b = ids.next_id();
        assert!(b > a);
    }
}
