use crate::finding::{Finding, Severity, SourceKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Findings deduplicated and partitioned by severity, in first-seen order.
///
/// `Unknown` severities fold into the medium bucket for reporting, counted
/// separately so consumers can see how many were folded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategorizedFindings {
    pub critical: Vec<Finding>,
    pub high: Vec<Finding>,
    pub medium: Vec<Finding>,
    pub low: Vec<Finding>,
    /// How many medium-bucket findings arrived with `Unknown` severity.
    pub unknown_folded: usize,
}

impl CategorizedFindings {
    pub fn total(&self) -> usize {
        self.critical.len() + self.high.len() + self.medium.len() + self.low.len()
    }

    pub fn iter_buckets(&self) -> impl Iterator<Item = (Severity, &[Finding])> {
        [
            (Severity::Critical, self.critical.as_slice()),
            (Severity::High, self.high.as_slice()),
            (Severity::Medium, self.medium.as_slice()),
            (Severity::Low, self.low.as_slice()),
        ]
        .into_iter()
    }
}

/// Deduplicate and partition findings.
///
/// Dedup identity is `(source_kind, title, location)`. The first-seen
/// finding stays the record of truth; later duplicates only fill in fields
/// the kept record is missing, never overwrite populated ones.
pub fn aggregate(findings: Vec<Finding>) -> CategorizedFindings {
    let mut kept: Vec<Finding> = Vec::new();
    let mut index: HashMap<(SourceKind, String, Option<String>), usize> = HashMap::new();

    for finding in findings {
        let key = (
            finding.source_kind,
            finding.title.clone(),
            finding.location.clone(),
        );
        match index.get(&key) {
            Some(&slot) => merge_into(&mut kept[slot], finding),
            None => {
                index.insert(key, kept.len());
                kept.push(finding);
            }
        }
    }

    let mut categorized = CategorizedFindings::default();
    for finding in kept {
        match finding.severity {
            Severity::Critical => categorized.critical.push(finding),
            Severity::High => categorized.high.push(finding),
            Severity::Medium => categorized.medium.push(finding),
            Severity::Low => categorized.low.push(finding),
            Severity::Unknown => {
                categorized.unknown_folded += 1;
                categorized.medium.push(finding);
            }
        }
    }
    categorized
}

/// Copy fields the kept finding is missing from a later duplicate. The kept
/// finding's identity, raw record and populated fields stay untouched.
///
/// An `Unknown` severity counts as missing here: it means no scanner
/// asserted a level, so a duplicate that carries one fills the gap. A
/// concrete severity is never replaced.
fn merge_into(kept: &mut Finding, duplicate: Finding) {
    if kept.description.is_empty() && !duplicate.description.is_empty() {
        kept.description = duplicate.description;
    }
    if kept.remediation.is_none() {
        kept.remediation = duplicate.remediation;
    }
    if kept.compliance_mapping.is_none() {
        kept.compliance_mapping = duplicate.compliance_mapping;
    }
    if kept.severity == Severity::Unknown && duplicate.severity != Severity::Unknown {
        kept.severity = duplicate.severity;
        kept.severity_inferred = duplicate.severity_inferred;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn finding(id: u64, title: &str, severity: Severity) -> Finding {
        Finding {
            id,
            source_kind: SourceKind::VulnScanner,
            title: title.to_string(),
            description: format!("description of {title}"),
            severity,
            severity_inferred: false,
            location: Some("app:latest".to_string()),
            raw: json!({"id": id}),
            remediation: None,
            compliance_mapping: None,
        }
    }

    #[test]
    fn test_partition_preserves_first_seen_order() {
        let input = vec![
            finding(1, "f1", Severity::High),
            finding(2, "f2", Severity::Critical),
            finding(3, "f3", Severity::High),
            finding(4, "f4", Severity::Low),
        ];

        let categorized = aggregate(input);
        assert_eq!(categorized.critical.iter().map(|f| f.id).collect::<Vec<_>>(), vec![2]);
        assert_eq!(categorized.high.iter().map(|f| f.id).collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(categorized.low.iter().map(|f| f.id).collect::<Vec<_>>(), vec![4]);
        assert!(categorized.medium.is_empty());
    }

    #[test]
    fn test_duplicate_merge_keeps_first_and_adopts_missing_fields() {
        let first = finding(1, "CVE-2024-1", Severity::High);
        let mut second = finding(2, "CVE-2024-1", Severity::High);
        let mut mapping = BTreeMap::new();
        mapping.insert("PCI DSS".to_string(), "Req 6.2".to_string());
        second.compliance_mapping = Some(mapping.clone());

        let categorized = aggregate(vec![first, second]);
        assert_eq!(categorized.total(), 1);
        let kept = &categorized.high[0];
        assert_eq!(kept.id, 1);
        assert_eq!(kept.raw, json!({"id": 1}));
        assert_eq!(kept.compliance_mapping, Some(mapping));
        assert_eq!(kept.description, "description of CVE-2024-1");
    }

    #[test]
    fn test_merge_never_overwrites_populated_fields() {
        let mut first = finding(1, "CVE-2024-2", Severity::High);
        first.remediation = Some("upgrade to 2.0".to_string());
        let mut second = finding(2, "CVE-2024-2", Severity::High);
        second.remediation = Some("different advice".to_string());

        let categorized = aggregate(vec![first, second]);
        assert_eq!(categorized.high[0].remediation.as_deref(), Some("upgrade to 2.0"));
    }

    #[test]
    fn test_different_locations_are_not_duplicates() {
        let first = finding(1, "CVE-2024-3", Severity::Low);
        let mut second = finding(2, "CVE-2024-3", Severity::Low);
        second.location = Some("other:image".to_string());

        let categorized = aggregate(vec![first, second]);
        assert_eq!(categorized.total(), 2);
    }

    #[test]
    fn test_unknown_folds_into_medium_and_is_counted() {
        let input = vec![
            finding(1, "u1", Severity::Unknown),
            finding(2, "m1", Severity::Medium),
        ];
        let categorized = aggregate(input);
        assert_eq!(categorized.medium.len(), 2);
        assert_eq!(categorized.unknown_folded, 1);
    }

    #[test]
    fn test_duplicate_upgrades_unknown_severity() {
        let first = finding(1, "CVE-2024-4", Severity::Unknown);
        let second = finding(2, "CVE-2024-4", Severity::Critical);

        let categorized = aggregate(vec![first, second]);
        assert_eq!(categorized.critical.len(), 1);
        assert_eq!(categorized.critical[0].id, 1);
        assert_eq!(categorized.unknown_folded, 0);
    }
}
