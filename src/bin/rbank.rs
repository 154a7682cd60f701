/// rbank - ReasoningBank command line tool
///
/// Usage:
///   rbank init                               - Create the pattern file
///   rbank insert-pattern <domain> <query...> - Log a successful experience
///   rbank retrieve <query...>                - Retrieve with reasoning
///   rbank optimize [--domain D]              - Consolidate and prune
///   rbank judge <trajectory.json>            - Judge a finished trajectory
///   rbank distill <trajectory.json>          - Store and distill a trajectory
///   rbank stats                              - Show pattern counts
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use reasoning_bank::{
    BankConfig, ExperienceBody, Outcome, PatternBody, PatternRecord, ReasoningBank,
    RetrievalOptions, Trajectory, Verdict,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// ReasoningBank - adaptive pattern memory
///
/// Stores task experiences by embedding and retrieves the most relevant,
/// diverse ones for a new task.
#[derive(Parser)]
#[command(name = "rbank")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Pattern file path (default: ~/.reasoningbank/bank.json)
    #[arg(short, long, global = true)]
    db: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the pattern file if it does not exist
    Init,

    /// Log a successful experience
    ///
    /// Example:
    ///   rbank insert-pattern optimization "How to optimize queries"
    InsertPattern {
        /// Domain to store the pattern under
        domain: String,

        /// Query text of the experience
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },

    /// Retrieve patterns relevant to a query
    Retrieve {
        /// Query text
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,

        /// Number of results
        #[arg(short, default_value_t = 5)]
        k: usize,

        /// Only search this domain
        #[arg(long)]
        domain: Option<String>,
    },

    /// Consolidate near-duplicates and prune low-value patterns
    Optimize {
        /// Only optimize this domain
        #[arg(long)]
        domain: Option<String>,
    },

    /// Judge a trajectory stored as JSON
    Judge {
        /// Path to the trajectory file
        file: PathBuf,
    },

    /// Store a trajectory and distill its domain
    Distill {
        /// Path to the trajectory file
        file: PathBuf,

        /// Verdict to record (judged first when omitted)
        #[arg(long)]
        verdict: Option<Verdict>,

        /// Store under this domain instead of the trajectory's task
        #[arg(long)]
        domain: Option<String>,
    },

    /// Show pattern counts by domain and type
    Stats,
}

/// Get the default pattern file path.
fn default_db_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".reasoningbank")
        .join("bank.json")
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn open_bank(path: &Path) -> Result<ReasoningBank> {
    let config = BankConfig::new(path.to_string_lossy().to_string());
    ReasoningBank::open(config)
        .await
        .with_context(|| format!("Failed to open pattern file {}", path.display()))
}

async fn read_trajectory(path: &Path) -> Result<Trajectory> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid trajectory in {}", path.display()))
}

fn colorize_verdict(verdict: Verdict) -> ColoredString {
    match verdict {
        Verdict::Success => verdict.to_string().green().bold(),
        Verdict::LikelySuccess => verdict.to_string().green(),
        Verdict::Failure => verdict.to_string().red().bold(),
        Verdict::NeedsReview => verdict.to_string().yellow(),
    }
}

async fn run(bank: &ReasoningBank, command: Commands, db_path: &Path) -> Result<()> {
    match command {
        Commands::Init => {
            println!("{}", "OK".green().bold());
            println!("  ReasoningBank initialized at {}", db_path.display().to_string().cyan());
        }

        Commands::InsertPattern { domain, query } => {
            let query = query.join(" ");
            let embedding = bank.embed(&query).await.context("Failed to embed query")?;
            let body = PatternBody::Experience(ExperienceBody::new(query, Outcome::Success));
            let record = PatternRecord::new(domain.clone(), body, embedding)
                .with_confidence(0.9)
                .with_usage(1, 1);
            let id = bank
                .insert_pattern(record)
                .await
                .context("Failed to store pattern")?;

            println!("{}", "OK".green().bold());
            println!("  Stored: {} in {}", id.bright_black(), domain.cyan());
        }

        Commands::Retrieve { query, k, domain } => {
            let query = query.join(" ");
            let embedding = bank.embed(&query).await.context("Failed to embed query")?;
            let mut options = RetrievalOptions::new()
                .k(k)
                .use_mmr(true)
                .synthesize_context(true);
            options.domain = domain;

            let result = bank
                .retrieve_with_reasoning(&embedding, &options)
                .await
                .context("Retrieval failed")?;

            println!("{} {} memories", "Found".bold(), result.memories.len());
            if let Some(context) = &result.context {
                println!();
                println!("{}", "Context:".bold());
                println!("  {}", context);
            }
            if !result.memories.is_empty() {
                println!();
                println!("{}", "Top memories:".bold());
                for (i, memory) in result.memories.iter().enumerate() {
                    println!(
                        "  {}. [{}] similarity {:.3}, confidence {:.3}",
                        i + 1,
                        memory.domain.cyan(),
                        memory.similarity,
                        memory.confidence
                    );
                    println!("     {}", memory.pattern.to_text().bright_black());
                }
            }
        }

        Commands::Optimize { domain } => {
            let summary = bank
                .optimize(domain.as_deref())
                .await
                .context("Optimization failed")?;
            println!("{}", "OK".green().bold());
            println!("  Consolidated: {}", summary.consolidated);
            println!("  Pruned: {}", summary.pruned);
            println!("  Improved quality: {:.3}", summary.improved_quality);
        }

        Commands::Judge { file } => {
            let trajectory = read_trajectory(&file).await?;
            let verdict = bank
                .judge_trajectory(&trajectory)
                .await
                .context("Judgment failed")?;
            println!("{} {}", "Verdict:".bold(), colorize_verdict(verdict));
        }

        Commands::Distill {
            file,
            verdict,
            domain,
        } => {
            let trajectory = read_trajectory(&file).await?;
            let verdict = match verdict {
                Some(v) => v,
                None => bank
                    .judge_trajectory(&trajectory)
                    .await
                    .context("Judgment failed")?,
            };
            let memories = bank
                .distill_memories(&trajectory, verdict, domain.as_deref())
                .await
                .context("Distillation failed")?;

            println!("{}", "OK".green().bold());
            println!("  Verdict: {}", colorize_verdict(verdict));
            println!("  Based on {} memories", memories.len());
        }

        Commands::Stats => {
            let stats = bank.stats().await.context("Failed to read statistics")?;
            println!("{}", "ReasoningBank Statistics".bold().cyan());
            println!();
            println!("  {} {}", "Pattern file:".bright_white(), db_path.display());
            println!("  {} {}", "Patterns:".bright_white(), stats.total_patterns);

            if !stats.by_domain.is_empty() {
                println!();
                println!("{}", "Domains:".bright_white());
                for (domain, count) in &stats.by_domain {
                    println!("  {} {} ({})", "*".cyan(), domain, count);
                }
            }
            if !stats.by_type.is_empty() {
                println!();
                println!("{}", "Types:".bright_white());
                for (kind, count) in &stats.by_type {
                    println!("  {} {} ({})", "*".cyan(), kind, count);
                }
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let db_path = cli.db.unwrap_or_else(default_db_path);
    let bank = open_bank(&db_path).await?;

    // Close even when the command fails so the snapshot is flushed
    let result = run(&bank, cli.command, &db_path).await;
    bank.close().await.context("Failed to close pattern file")?;
    result
}
