use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use bdcat_interop::clients::{Gen3Client, OrchestrationClient, RestClient};
use bdcat_interop::config::{HarnessConfig, Stage};
use bdcat_interop::report::OutcomeStatus;
use bdcat_interop::scenario::{self, RunSummary};
use bdcat_interop::storage::ResultsStore;

#[derive(Parser)]
#[command(
    name = "bdcat-interop",
    about = "Cross-platform integration tests for the BioData Catalyst ecosystem",
    version,
    long_about = None
)]
struct Cli {
    /// TOML configuration file (defaults to $BDCAT_CONFIG, then built-ins)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Deployment tier, overrides the config file and BDCAT_STAGE
    #[arg(long, global = true)]
    stage: Option<Stage>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run integration scenarios and record their outcomes
    Run {
        /// Scenario id to run (repeatable; default: all)
        #[arg(long = "scenario", value_name = "ID")]
        scenarios: Vec<String>,

        /// Include the long-running DRS md5sum workflow
        #[arg(long)]
        include_drs: bool,

        /// Do not write outcomes to the results store or webhook
        #[arg(long)]
        no_report: bool,
    },

    /// Compare Gen3 staging and production release versions
    VersionCheck {
        /// Do not write the outcome to the results store or webhook
        #[arg(long)]
        no_report: bool,
    },

    /// Show Terra orchestration and Gen3 index status
    Health,

    /// List available scenarios
    ListScenarios,

    /// Inspect recorded outcomes
    Results {
        #[command(subcommand)]
        action: ResultsAction,
    },
}

#[derive(Subcommand)]
enum ResultsAction {
    /// List recorded outcomes, oldest first
    List {
        /// Only show the most recent N rows
        #[arg(long)]
        limit: Option<usize>,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let mut config = HarnessConfig::load(cli.config.as_deref())?;
    if let Some(stage) = cli.stage {
        config.stage = stage;
    }

    match cli.command {
        Commands::Run {
            scenarios,
            include_drs,
            no_report,
        } => {
            if include_drs || scenarios.iter().any(|id| id == "drs-workflow") {
                config.scenarios.drs_workflow = true;
            }
            let selected = scenario::select(&scenarios)?;
            tracing::info!(
                stage = %config.stage,
                count = selected.len(),
                "Running integration scenarios"
            );
            let summary = bdcat_interop::run_suite(&config, &selected, !no_report).await?;
            print_summary(&summary);
            return Ok(exit_code(&summary));
        }
        Commands::VersionCheck { no_report } => {
            let selected = scenario::select(&["gen3-version".to_string()])?;
            let summary = bdcat_interop::run_suite(&config, &selected, !no_report).await?;
            print_summary(&summary);
            return Ok(exit_code(&summary));
        }
        Commands::Health => {
            let orchestration =
                OrchestrationClient::new(RestClient::new(config.orchestration_url(), None)?);
            println!("\n=== Terra Orchestration ({}) ===", config.orchestration_url());
            match orchestration.health().await {
                Ok(health) => {
                    println!("Overall: {}", if health.ok { "OK" } else { "DEGRADED" });
                    println!("{:<20} | {:<8} | Messages", "Subsystem", "Status");
                    println!("{:-<20}-|-{:-<8}-|-{:-<40}", "", "", "");
                    for (name, system) in &health.systems {
                        let status = if system.ok { "OK" } else { "FAIL" };
                        println!("{:<20} | {:<8} | {}", name, status, system.messages.join("; "));
                    }
                }
                Err(e) => println!("Unreachable: {e}"),
            }

            println!("\n=== Gen3 Index Versions ===");
            for (label, url) in [
                ("staging", config.gen3_staging_url()),
                ("prod", config.gen3_prod_url()),
            ] {
                match Gen3Client::new(url)?.index_version().await {
                    Ok(v) => println!("{:<8} : {} ({})", label, v.version, url),
                    Err(e) => println!("{:<8} : unreachable ({e})", label),
                }
            }
            println!();
        }
        Commands::ListScenarios => {
            println!("{:<18} | {:<14} | {:<36} | Default", "Id", "Platform", "Test name");
            println!("{:-<18}-|-{:-<14}-|-{:-<36}-|-{:-<7}", "", "", "", "");
            for s in scenario::catalog() {
                let default = if s.id() == "drs-workflow" { "off" } else { "on" };
                println!(
                    "{:<18} | {:<14} | {:<36} | {}",
                    s.id(),
                    s.platform().to_string(),
                    s.test_name(config.stage),
                    default
                );
            }
        }
        Commands::Results { action } => match action {
            ResultsAction::List { limit, json } => {
                let store = ResultsStore::open(
                    &config.results.db_path,
                    &config.results.table,
                    config.results.create,
                )?;
                let rows = if store.has_table()? {
                    store.list_results(limit)?
                } else {
                    Vec::new()
                };
                if json {
                    println!("{}", serde_json::to_string_pretty(&rows)?);
                } else if rows.is_empty() {
                    println!("No results recorded.");
                } else {
                    println!("{:<36} | {:<8} | {:<25} | Run", "Test", "Status", "Timestamp");
                    println!("{:-<36}-|-{:-<8}-|-{:-<25}-|-{:-<36}", "", "", "", "");
                    for row in rows {
                        println!(
                            "{:<36} | {:<8} | {:<25} | {}",
                            row.outcome.test_name,
                            row.outcome.status.to_string(),
                            row.outcome.timestamp.to_rfc3339(),
                            row.run_id
                        );
                    }
                }
            }
        },
    }

    Ok(ExitCode::SUCCESS)
}

fn print_summary(summary: &RunSummary) {
    println!("\n=== BDCat Interop Run {} [{}] ===", summary.run_id, summary.stage);
    println!("{:<36} | {:<8} | Elapsed", "Test", "Status");
    println!("{:-<36}-|-{:-<8}-|-{:-<10}", "", "", "");
    for result in &summary.results {
        let status = match result.outcome.status {
            OutcomeStatus::Success => "PASS",
            OutcomeStatus::Failure => "FAIL",
        };
        println!(
            "{:<36} | {:<8} | {:.1}s",
            result.outcome.test_name,
            status,
            result.elapsed.as_secs_f64()
        );
    }
    for (name, reason) in &summary.skipped {
        println!("{:<36} | {:<8} | {}", name, "SKIP", reason);
    }

    let failures: Vec<_> = summary.failures().collect();
    if !failures.is_empty() {
        println!("\nFailures:");
        for failure in failures {
            println!(
                " - {}: {}",
                failure.outcome.test_name,
                failure.error.as_deref().unwrap_or("failed")
            );
        }
    }
    println!();
}

fn exit_code(summary: &RunSummary) -> ExitCode {
    ExitCode::from(summary.exit_code() as u8)
}
