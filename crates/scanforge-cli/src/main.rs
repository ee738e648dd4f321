mod display;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use scanforge_core::config::{EnrichmentConfig, RunConfig};
use scanforge_core::enricher::client::OpenAiClient;
use scanforge_core::enricher::Enricher;
use scanforge_core::pipeline::{self, ScanInputs};
use scanforge_core::policy_gen;
use scanforge_core::report::ReportDataset;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "scanforge",
    version,
    about = "scanforge — security scan aggregator and report generator",
    long_about = "Ingest vulnerability, IaC and policy-engine scan outputs, normalize them \
into one finding schema, enrich each finding with AI-generated remediation and \
compliance text, and emit a severity-partitioned report dataset."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the report dataset from one or more scan result files
    Report {
        /// Glob pattern or path to vulnerability scanner JSON (repeatable)
        #[arg(long = "vuln")]
        vuln: Vec<String>,

        /// Path to IaC scanner JSON (repeatable)
        #[arg(long = "iac")]
        iac: Vec<String>,

        /// Path to policy-engine JSON (repeatable, optional)
        #[arg(long = "policy")]
        policy: Vec<String>,

        /// Client name stamped onto the report
        #[arg(long)]
        client: String,

        /// Resource group or project the scans cover
        #[arg(long)]
        resource_group: String,

        /// Write the JSON dataset here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Path to a scanforge.toml with enrichment settings
        #[arg(long)]
        config: Option<PathBuf>,

        /// Maximum enrichment calls in flight at once
        #[arg(long)]
        concurrency: Option<usize>,

        /// Skip all AI enrichment calls (no credential required)
        #[arg(long)]
        no_enrich: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Generate OPA Rego policy snippets from a report dataset
    Policy {
        /// Path to a report dataset JSON produced by `scanforge report`
        #[arg(long)]
        input: PathBuf,

        /// Directory to write the .rego files into (a per-client
        /// subdirectory is created inside it)
        #[arg(long, default_value = "generated-policies")]
        output_dir: PathBuf,

        /// Path to a scanforge.toml with enrichment settings
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("scanforge_core=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Report {
            vuln,
            iac,
            policy,
            client,
            resource_group,
            output,
            config,
            concurrency,
            no_enrich,
            format,
        } => {
            cmd_report(
                vuln,
                iac,
                policy,
                client,
                resource_group,
                output.as_deref(),
                config.as_deref(),
                concurrency,
                no_enrich,
                &format,
            )
            .await
        }
        Commands::Policy {
            input,
            output_dir,
            config,
        } => cmd_policy(&input, &output_dir, config.as_deref()).await,
    }
}

#[allow(clippy::too_many_arguments)]
async fn cmd_report(
    vuln: Vec<String>,
    iac: Vec<String>,
    policy: Vec<String>,
    client: String,
    resource_group: String,
    output: Option<&std::path::Path>,
    config_path: Option<&std::path::Path>,
    concurrency: Option<usize>,
    no_enrich: bool,
    format: &str,
) -> Result<()> {
    let mut enrichment = match config_path {
        Some(path) => EnrichmentConfig::load(path)?,
        None => EnrichmentConfig::default(),
    };
    if let Some(concurrency) = concurrency {
        enrichment.concurrency = concurrency;
    }

    let mut run_config = RunConfig::new(client, resource_group);
    run_config.enrichment = enrichment;

    let inputs = ScanInputs {
        vuln_scans: vuln,
        iac_scans: iac,
        policy_scans: policy,
    };

    // Missing credential is the one condition that exits non-zero before
    // any work happens; everything scan-side is absorbed into the dataset.
    let dataset = if no_enrich {
        pipeline::run_with_generator(&run_config, &inputs, None).await
    } else {
        pipeline::run(&run_config, &inputs).await?
    };

    match output {
        Some(path) => {
            let json = serde_json::to_string_pretty(&dataset)?;
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            display::print_report_summary(&dataset);
            println!("Report dataset written to {}", path.display());
        }
        None => match format {
            "json" => println!("{}", serde_json::to_string_pretty(&dataset)?),
            _ => display::print_report(&dataset),
        },
    }

    Ok(())
}

async fn cmd_policy(
    input: &Path,
    output_dir: &Path,
    config_path: Option<&Path>,
) -> Result<()> {
    let enrichment = match config_path {
        Some(path) => EnrichmentConfig::load(path)?,
        None => EnrichmentConfig::default(),
    };

    let content = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read report dataset {}", input.display()))?;
    let dataset: ReportDataset = serde_json::from_str(&content)
        .with_context(|| format!("{} is not a report dataset", input.display()))?;

    let mut run_config = RunConfig::new(dataset.client.clone(), dataset.resource_group.clone());
    run_config.enrichment = enrichment;

    let api_key = run_config.require_credential()?;
    let client = OpenAiClient::new(api_key, &run_config.enrichment)?;
    let enricher = Enricher::new(Arc::new(client), &run_config.enrichment);

    let policies = policy_gen::generate_policies(&dataset.findings, &enricher).await;

    let dir = output_dir.join(&dataset.client);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    for (idx, policy) in policies.iter().enumerate() {
        let path = dir.join(format!("policy-{}.rego", idx + 1));
        std::fs::write(&path, &policy.rego)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Generated policy for {} -> {}", policy.title, path.display());
    }
    println!("Total policies generated: {}", policies.len());

    Ok(())
}
