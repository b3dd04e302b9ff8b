//! Card Checker CLI
//!
//! Validates card files and directories, optionally grading compliance.
//!
//! Exit codes: 0 every card accepted, 1 at least one card rejected,
//! 2 usage or I/O error.

use behavior_cards::compliance::ComplianceChecker;
use behavior_cards::loader::load_path;
use behavior_cards::pipeline::{document_label, CardPipeline};
use behavior_cards::{CardConfig, ComplianceReport, Diagnostics};
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "abc-check")]
#[command(about = "Validate Agent Behavior Cards")]
struct Cli {
    /// Card files or directories of cards
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    /// Grade documentation and trust compliance of accepted cards
    #[arg(long)]
    compliance: bool,

    /// Explicit config file
    #[arg(short, long)]
    config: Option<String>,
}

#[derive(Serialize)]
struct CardOutcome {
    path: PathBuf,
    card: String,
    accepted: bool,
    diagnostics: Diagnostics,
    #[serde(skip_serializing_if = "Option::is_none")]
    compliance: Option<ComplianceReport>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    }
}

fn run(cli: Cli) -> Result<bool, Box<dyn std::error::Error>> {
    let config = CardConfig::load_from(cli.config.as_deref())?;
    let pipeline = CardPipeline::with_config(&config.validation);
    let checker = ComplianceChecker::new();

    let mut outcomes = Vec::new();
    let mut load_failures = 0;

    for path in &cli.paths {
        let set = load_path(path)?;
        for failure in &set.failures {
            load_failures += 1;
            if !cli.json {
                println!("❌ {} - {}", failure.path.display(), failure.error);
            }
        }

        for loaded in set.documents {
            let card = document_label(&loaded.document);
            let outcome = match pipeline.accept(&loaded.document) {
                Ok(accepted) => CardOutcome {
                    path: loaded.path,
                    card,
                    accepted: true,
                    diagnostics: accepted.warnings().clone(),
                    compliance: cli.compliance.then(|| checker.check(accepted.card())),
                },
                Err(rejection) => CardOutcome {
                    path: loaded.path,
                    card,
                    accepted: false,
                    diagnostics: rejection.diagnostics,
                    compliance: None,
                },
            };
            outcomes.push(outcome);
        }
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&outcomes)?);
    } else {
        print_outcomes(&outcomes);
    }

    let rejected = outcomes.iter().filter(|o| !o.accepted).count();
    Ok(rejected == 0 && load_failures == 0)
}

fn print_outcomes(outcomes: &[CardOutcome]) {
    if outcomes.is_empty() {
        println!("⚠️  No card documents found");
        return;
    }

    for outcome in outcomes {
        if outcome.accepted {
            println!("✅ {} ({})", outcome.card, outcome.path.display());
        } else {
            println!("❌ {} ({}) - REJECTED", outcome.card, outcome.path.display());
        }
        for diagnostic in &outcome.diagnostics {
            let marker = if diagnostic.is_error() { "└─" } else { "└─ ⚠️ " };
            println!("   {} {}", marker, diagnostic);
        }

        if let Some(report) = &outcome.compliance {
            println!(
                "   📋 {} - {:.1}/100 (card {:.1}, trust {:.1})",
                report.level, report.overall_score, report.card_score, report.trust_score
            );
            for suggestion in &report.suggestions {
                println!("      → {}", suggestion);
            }
        }
    }

    let accepted = outcomes.iter().filter(|o| o.accepted).count();
    println!();
    println!("📊 {}/{} card(s) accepted", accepted, outcomes.len());
}
