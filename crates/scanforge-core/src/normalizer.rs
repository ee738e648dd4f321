use crate::finding::{Finding, IdGen, Severity, SourceKind};
use crate::loader::RawDocument;
use serde_json::Value;
use tracing::warn;

/// Field-mapping table for one scanner family.
///
/// Normalization is table-driven: supporting a new tool version or a new
/// scanner means adding alias spellings or a new table, never another branch
/// in the walk itself.
struct FieldTable {
    /// Alternate-key steps from the document root down to the record list.
    list_path: &'static [&'static [&'static str]],
    /// When set, each element of the located list is a result group holding
    /// the real records under one of these keys, and `location` is read from
    /// the group instead of the record.
    group_records: Option<&'static [&'static str]>,
    title: &'static [&'static str],
    description: &'static [&'static str],
    /// Extra fields appended to the description when present.
    detail: &'static [&'static str],
    severity: &'static [&'static str],
    location: &'static [&'static str],
    fallback_title: &'static str,
}

/// Container/dependency vulnerability scanner output. Key casing drifted
/// across tool versions, hence the alias pairs.
static VULN_SCANNER: FieldTable = FieldTable {
    list_path: &[&["Results", "results"]],
    group_records: Some(&["Vulnerabilities", "vulnerabilities"]),
    title: &["VulnerabilityID"],
    description: &["Description"],
    detail: &[],
    severity: &["Severity"],
    location: &["Target"],
    fallback_title: "unknown-vulnerability",
};

/// Infrastructure-as-code policy scanner output.
static IAC_SCANNER: FieldTable = FieldTable {
    list_path: &[&["results"], &["failed_checks"]],
    group_records: None,
    title: &["check_id"],
    description: &["check_name"],
    detail: &["check_details", "guideline"],
    severity: &["severity"],
    location: &["file_path"],
    fallback_title: "unknown-check",
};

/// Policy-as-code engine output: a flat results list whose message field
/// name varies between engines.
static POLICY_ENGINE: FieldTable = FieldTable {
    list_path: &[&["results"]],
    group_records: None,
    title: &["policy", "rule"],
    description: &["message", "msg"],
    detail: &[],
    severity: &["severity"],
    location: &["file", "resource"],
    fallback_title: "policy-violation",
};

fn field_table(kind: SourceKind) -> Option<&'static FieldTable> {
    match kind {
        SourceKind::VulnScanner => Some(&VULN_SCANNER),
        SourceKind::IacScanner => Some(&IAC_SCANNER),
        SourceKind::PolicyEngine => Some(&POLICY_ENGINE),
        SourceKind::Unknown => None,
    }
}

/// Map one raw document into canonical findings.
///
/// Total by contract: an unrecognized shape degrades to a single
/// `Unknown`-severity finding carrying the untouched document, and a
/// malformed record degrades to placeholder field values without dropping
/// its siblings.
pub fn normalize(doc: &RawDocument, kind: SourceKind, ids: &mut IdGen) -> Vec<Finding> {
    let Some(table) = field_table(kind) else {
        return vec![unknown_finding(doc, kind, ids)];
    };

    let Some(list) = walk_list(&doc.value, table.list_path) else {
        warn!(path = %doc.path, kind = kind.label(), "document shape not recognized");
        return vec![unknown_finding(doc, kind, ids)];
    };

    let mut findings = Vec::new();
    for entry in list {
        match table.group_records {
            Some(record_keys) => {
                // Result group: location comes from the group, records from
                // its nested list. A group without the list contributes
                // nothing, matching scanner output for clean targets.
                let location = lookup_str(entry, table.location).map(str::to_string);
                let records = lookup(entry, record_keys)
                    .and_then(Value::as_array)
                    .map(Vec::as_slice)
                    .unwrap_or(&[]);
                for record in records {
                    findings.push(record_to_finding(record, kind, table, location.clone(), ids));
                }
            }
            None => {
                let location = lookup_str(entry, table.location).map(str::to_string);
                findings.push(record_to_finding(entry, kind, table, location, ids));
            }
        }
    }
    findings
}

fn record_to_finding(
    record: &Value,
    kind: SourceKind,
    table: &FieldTable,
    location: Option<String>,
    ids: &mut IdGen,
) -> Finding {
    let title = lookup_str(record, table.title)
        .unwrap_or(table.fallback_title)
        .to_string();

    let mut description = lookup_str(record, table.description)
        .map(str::to_string)
        .unwrap_or_else(|| match record {
            // A bare string entry is its own message (seen in policy-engine
            // output).
            Value::String(s) => s.clone(),
            _ => String::from("no description provided"),
        });
    for extra in table.detail.iter().filter_map(|k| record.get(*k)).filter_map(Value::as_str) {
        if !extra.is_empty() {
            description.push_str(" - ");
            description.push_str(extra);
        }
    }

    let (severity, inferred) = match lookup_str(record, table.severity) {
        Some(raw) => (Severity::parse(raw).unwrap_or(Severity::Unknown), false),
        None => (Severity::Medium, true),
    };

    Finding {
        id: ids.next_id(),
        source_kind: kind,
        title,
        description,
        severity,
        severity_inferred: inferred,
        location,
        raw: record.clone(),
        remediation: None,
        compliance_mapping: None,
    }
}

fn unknown_finding(doc: &RawDocument, kind: SourceKind, ids: &mut IdGen) -> Finding {
    Finding {
        id: ids.next_id(),
        source_kind: kind,
        title: "unknown".to_string(),
        description: format!("unrecognized document shape from '{}'", doc.path),
        severity: Severity::Unknown,
        severity_inferred: false,
        location: None,
        raw: doc.value.clone(),
        remediation: None,
        compliance_mapping: None,
    }
}

/// Follow the alias steps down to the record list.
fn walk_list<'a>(root: &'a Value, path: &[&[&str]]) -> Option<&'a Vec<Value>> {
    let mut current = root;
    for aliases in path {
        current = lookup(current, aliases)?;
    }
    current.as_array()
}

/// First present, non-null value among the alias spellings.
fn lookup<'a>(value: &'a Value, aliases: &[&str]) -> Option<&'a Value> {
    aliases
        .iter()
        .filter_map(|key| value.get(*key))
        .find(|v| !v.is_null())
}

fn lookup_str<'a>(value: &'a Value, aliases: &[&str]) -> Option<&'a str> {
    lookup(value, aliases).and_then(Value::as_str)
}
