//! Card Registry CLI
//!
//! Indexes a directory of cards and answers queries against it.

use anyhow::{anyhow, Context};
use behavior_cards::card::ProblemCategory;
use behavior_cards::loader::{load_dir, load_file};
use behavior_cards::pipeline::CardPipeline;
use behavior_cards::{CardConfig, CardFilter, CardIdentity, CompatibilityScorer, RegistryIndex, SortKey};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "abc-registry")]
#[command(about = "Index and query Agent Behavior Cards")]
struct Cli {
    /// Directory of cards (defaults to registry.cards_dir)
    #[arg(long)]
    cards: Option<PathBuf>,

    /// Explicit config file
    #[arg(short, long)]
    config: Option<String>,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every indexed card
    List,

    /// Filter indexed cards
    Query {
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        tag: Option<String>,
        #[arg(long)]
        origin: Option<String>,
        #[arg(long)]
        interface: Option<String>,
        /// Fuzzy match on name and display name
        #[arg(long)]
        name: Option<String>,
        /// Rank by similarity to this analogous domain
        #[arg(long)]
        analog: Option<String>,
        #[arg(long, value_enum, default_value_t = Sort::Insertion)]
        sort: Sort,
    },

    /// Cards most compatible with a card file
    Similar {
        card: PathBuf,
        #[arg(long)]
        min_score: Option<f64>,
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Cards a given card composes with
    Composes {
        /// `name@version`
        card: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Sort {
    Insertion,
    Analog,
    Name,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = CardConfig::load_from(cli.config.as_deref())?;
    let cards_dir = cli.cards.clone().unwrap_or_else(|| config.cards_dir());
    let pipeline = CardPipeline::with_config(&config.validation);

    let index = RegistryIndex::new();
    let set = load_dir(&cards_dir)
        .with_context(|| format!("loading cards from {}", cards_dir.display()))?;
    for loaded in &set.documents {
        match pipeline.accept(&loaded.document) {
            Ok(accepted) => {
                if let Err(e) = index.insert(accepted) {
                    eprintln!("⚠️  {} - {}", loaded.path.display(), e);
                }
            }
            Err(rejection) => {
                eprintln!("⚠️  Skipping {} ({}): rejected", rejection.label, loaded.path.display());
            }
        }
    }
    tracing::info!(cards = index.len()?, dir = %cards_dir.display(), "index built");

    match cli.command {
        Commands::List => {
            let hits = index.query(&CardFilter::new())?;
            if cli.json {
                let ids: Vec<CardIdentity> = hits.iter().map(|h| h.identity()).collect();
                println!("{}", serde_json::to_string_pretty(&ids)?);
                return Ok(());
            }
            println!("📚 {} card(s) in {}", hits.len(), cards_dir.display());
            for hit in hits {
                println!(
                    "  {} [{}] {} ({})",
                    hit.identity(),
                    hit.card.category(),
                    hit.card.identity.display_name,
                    hit.checksum.short()
                );
            }
        }

        Commands::Query { category, tag, origin, interface, name, analog, sort } => {
            let mut filter = CardFilter::new().sort_by(match sort {
                Sort::Insertion => SortKey::Insertion,
                Sort::Analog => SortKey::AnalogSimilarity,
                Sort::Name => SortKey::NameMatch,
            });
            if let Some(category) = category {
                let category = ProblemCategory::parse(&category)
                    .ok_or_else(|| anyhow!("unknown category: {}", category))?;
                filter = filter.category(category);
            }
            if let Some(tag) = tag {
                filter = filter.tag(tag);
            }
            if let Some(origin) = origin {
                filter = filter.origin_domain(origin);
            }
            if let Some(interface) = interface {
                filter = filter.interface(interface);
            }
            if let Some(name) = name {
                filter = filter.name_like(name);
            }
            if let Some(analog) = analog {
                filter = filter.analog_of(analog);
            }

            let hits = index.query(&filter)?;
            if cli.json {
                let ids: Vec<CardIdentity> = hits.iter().map(|h| h.identity()).collect();
                println!("{}", serde_json::to_string_pretty(&ids)?);
                return Ok(());
            }
            println!("🔍 {} match(es)", hits.len());
            for hit in hits {
                println!("  {} [{}]", hit.identity(), hit.card.category());
            }
        }

        Commands::Similar { card, min_score, limit } => {
            let document = load_file(&card)
                .with_context(|| format!("reading {}", card.display()))?;
            let accepted = pipeline
                .accept(&document)
                .map_err(|rejection| anyhow!("{}:\n{}", rejection.label, rejection.diagnostics))?;
            let scorer = CompatibilityScorer::new(config.scoring.clone());
            let hits = index.find_similar(
                &accepted,
                &scorer,
                min_score.unwrap_or(config.registry.min_similar_score),
                limit.unwrap_or(config.registry.max_similar_results),
            )?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&hits)?);
                return Ok(());
            }
            println!("🔍 Cards similar to {}", accepted.identity());
            for hit in hits {
                println!("  {:.3}  {}", hit.score, hit.identity);
            }
        }

        Commands::Composes { card } => {
            let identity = CardIdentity::parse(&card)
                .ok_or_else(|| anyhow!("expected name@version, got {}", card))?;
            // Fails with NotFound for an unknown identity
            index.get(&identity)?;
            let graph = index.composition_graph()?;

            if cli.json {
                let ids: Vec<&CardIdentity> = graph.composable_with(&identity);
                println!("{}", serde_json::to_string_pretty(&ids)?);
                return Ok(());
            }
            println!("🔗 {}", identity);
            for (other, edge) in graph.downstream(&identity) {
                println!("  → {} ({:?})", other, edge);
            }
            for (other, edge) in graph.upstream(&identity) {
                println!("  ← {} ({:?})", other, edge);
            }
            let cycles = graph.cycles();
            for cycle in cycles.iter().filter(|c| c.contains(&identity)) {
                let names: Vec<String> = cycle.iter().map(|id| id.to_string()).collect();
                println!("  ⚠️  composition cycle: {}", names.join(" → "));
            }
        }
    }

    Ok(())
}
