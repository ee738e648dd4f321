use colored::*;
use scanforge_core::finding::{Finding, Severity};
use scanforge_core::report::ReportDataset;

/// Print a full report to the terminal.
pub fn print_report(dataset: &ReportDataset) {
    println!();
    println!(
        "{}",
        format!(
            " scanforge v{} — {} / {}",
            env!("CARGO_PKG_VERSION"),
            dataset.client,
            dataset.resource_group
        )
        .bold()
    );
    println!(
        " {} generated {}",
        "|-".dimmed(),
        dataset.generated_on.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!();

    print_report_summary(dataset);

    for (severity, bucket) in dataset.findings.iter_buckets() {
        if bucket.is_empty() {
            continue;
        }
        println!(" {}", severity.symbol().bold().underline());
        for finding in bucket {
            print_finding(finding);
        }
        println!();
    }

    if !dataset.load_failures.is_empty() {
        println!(" {}", "Inputs that could not be loaded".bold().underline());
        for failure in &dataset.load_failures {
            println!(
                " {} {} ({})",
                "WARN".yellow().bold(),
                failure.path,
                failure.reason.dimmed()
            );
        }
        println!();
    }

    if let Some(recommendation) = &dataset.recommendation {
        println!(" {}", "Pipeline recommendation".bold().underline());
        for line in recommendation.lines() {
            println!("   {line}");
        }
        println!();
    }
}

/// One-line bucket counts, used both standalone and at the top of the full
/// report.
pub fn print_report_summary(dataset: &ReportDataset) {
    println!(
        " {} findings: {} critical, {} high, {} medium, {} low",
        dataset.total_findings().to_string().bold(),
        dataset.findings.critical.len().to_string().red().bold(),
        dataset.findings.high.len().to_string().yellow().bold(),
        dataset.findings.medium.len().to_string().yellow(),
        dataset.findings.low.len().to_string().blue(),
    );
    if dataset.findings.unknown_folded > 0 {
        println!(
            " {} of the medium findings arrived with unknown severity",
            dataset.findings.unknown_folded.to_string().dimmed()
        );
    }
    println!();
}

fn print_finding(finding: &Finding) {
    let severity = finding
        .severity
        .symbol()
        .color(finding.severity.color_code());
    let severity = if finding.severity.priority() >= Severity::High.priority() {
        severity.bold()
    } else {
        severity
    };

    let inferred = if finding.severity_inferred {
        " (inferred)".dimmed()
    } else {
        "".dimmed()
    };

    println!(
        " {} [{}] {}{}",
        "|-".dimmed(),
        severity,
        finding.title.bold(),
        inferred
    );
    if let Some(location) = &finding.location {
        println!("    {} {}", "at".dimmed(), location.cyan());
    }
    println!("    {}", truncate(&finding.description, 120));
    if let Some(remediation) = &finding.remediation {
        println!("    {} {}", "fix:".green().bold(), truncate(remediation, 120));
    }
}

fn truncate(text: &str, max: usize) -> String {
    let flat = text.replace('\n', " ");
    if flat.chars().count() <= max {
        flat
    } else {
        let cut: String = flat.chars().take(max).collect();
        format!("{cut}…")
    }
}
