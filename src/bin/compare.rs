//! Card Compatibility CLI
//!
//! Scores how well one card's behavior transfers to another card's domain.

use behavior_cards::loader::{load_dir, load_file};
use behavior_cards::pipeline::{AcceptedCard, CardPipeline};
use behavior_cards::{CardConfig, CompatibilityReport, CompatibilityScorer};
use clap::Parser;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "abc-compare")]
#[command(about = "Score compatibility between Agent Behavior Cards")]
struct Cli {
    /// First card file
    #[arg(required_unless_present = "matrix")]
    a: Option<PathBuf>,

    /// Second card file
    #[arg(required_unless_present = "matrix")]
    b: Option<PathBuf>,

    /// Score every pair of cards in a directory
    #[arg(long, conflicts_with_all = ["a", "b"])]
    matrix: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    /// Explicit config file
    #[arg(short, long)]
    config: Option<String>,
}

#[derive(Serialize)]
struct Matrix {
    cards: Vec<String>,
    scores: Vec<Vec<f64>>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = CardConfig::load_from(cli.config.as_deref())?;
    let problems = config.scoring.problems();
    if !problems.is_empty() {
        return Err(problems.join("; ").into());
    }

    let pipeline = CardPipeline::with_config(&config.validation);
    let scorer = CompatibilityScorer::new(config.scoring.clone());

    if let Some(dir) = &cli.matrix {
        return run_matrix(dir, &pipeline, &scorer, cli.json);
    }

    let (Some(a), Some(b)) = (&cli.a, &cli.b) else {
        return Err("two card files are required".into());
    };
    let a = accept_file(a, &pipeline)?;
    let b = accept_file(b, &pipeline)?;
    let report = scorer.score(&a, &b);

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn accept_file(path: &Path, pipeline: &CardPipeline) -> Result<AcceptedCard, Box<dyn std::error::Error>> {
    let document = load_file(path)?;
    pipeline.accept(&document).map_err(|rejection| {
        format!("{} ({}):\n{}", rejection.label, path.display(), rejection.diagnostics).into()
    })
}

fn run_matrix(
    dir: &Path,
    pipeline: &CardPipeline,
    scorer: &CompatibilityScorer,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let set = load_dir(dir)?;
    let mut cards = Vec::new();
    for loaded in &set.documents {
        match pipeline.accept(&loaded.document) {
            Ok(accepted) => cards.push(accepted),
            Err(rejection) => {
                eprintln!("⚠️  Skipping {} ({}): rejected", rejection.label, loaded.path.display());
            }
        }
    }

    let matrix = Matrix {
        cards: cards.iter().map(|c| c.identity().to_string()).collect(),
        scores: cards
            .iter()
            .map(|a| cards.iter().map(|b| scorer.score(a, b).score).collect())
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&matrix)?);
        return Ok(());
    }

    println!("🔍 Compatibility matrix for {} card(s)", matrix.cards.len());
    println!();
    for (i, name) in matrix.cards.iter().enumerate() {
        let row: Vec<String> = matrix.scores[i].iter().map(|s| format!("{:.2}", s)).collect();
        println!("  [{}] {}  {}", i, name, row.join("  "));
    }
    Ok(())
}

fn print_report(report: &CompatibilityReport) {
    println!("🔍 {} ↔ {}", report.source, report.target);
    println!();
    println!("  Score:        {:.3}", report.score);
    println!("  ├─ pattern:     {:.3}", report.components.pattern);
    println!("  ├─ assumptions: {:.3}", report.components.assumptions);
    println!("  └─ coverage:    {:.3}", report.components.coverage);

    if report.recommendations.is_empty() {
        println!();
        println!("✅ Every hard assumption of {} holds in {}", report.source, report.target);
        return;
    }

    println!();
    println!("📋 Adaptations needed before {} runs under {}:", report.source, report.target);
    for rec in &report.recommendations {
        println!("  - {} ({:.2}): {}", rec.assumption_id, rec.credit, rec.assumption);
        if let Some(note) = &rec.adaptation_note {
            println!("    └─ {}", note);
        }
    }
}
