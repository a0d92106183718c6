//! branchdiff command-line tool.
//!
//! Scratch-merges each configured branch pair, classifies every changed
//! file, prints a summary table per pair and optionally writes all reports
//! as JSON. Also provides `init` and `validate` for configuration files.

mod report;
mod style;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use branchdiff_core::{
    AppConfig, BranchPair, ComparisonEngine, ComparisonReport, ComparisonStatus,
};
use branchdiff_git::GitClient;

const DEFAULT_CONFIG_PATH: &str = "./branchdiff.toml";

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// Compare git branches and classify every change a merge would make.
#[derive(Parser, Debug)]
#[command(
    name = "branchdiff",
    version,
    about = "Scratch-merge git branches and classify each change as semantic, cosmetic or conflicting"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Git repository to inspect (overrides `comparison.repo`).
    #[arg(short, long)]
    repo: Option<PathBuf>,

    /// Branch pairs as `from:to` (replaces `comparison.pairs`).
    #[arg(short, long, value_name = "FROM:TO", num_args = 1..)]
    pairs: Vec<String>,

    /// Also compare each pair in the reverse direction.
    #[arg(short, long)]
    bidirectional: bool,

    /// Write the reports as JSON to this path.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a default configuration file.
    Init {
        /// Output path for the generated config file.
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        output: PathBuf,
    },

    /// Validate a configuration file.
    Validate,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", style::error(&format!("{:#}", e)));
            ExitCode::FAILURE
        }
    }
}

fn init_logging(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(level))
        .with_target(false)
        .without_time()
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Some(Commands::Init { output }) => {
            init_logging(cli.log_level.as_deref().unwrap_or("warn"));
            return cmd_init(output);
        }
        Some(Commands::Validate) => {
            init_logging(cli.log_level.as_deref().unwrap_or("warn"));
            let path = cli
                .config
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
            return cmd_validate(&path);
        }
        None => {}
    }

    let config = load_config(&cli)?;
    init_logging(&config.logging.level);
    cmd_compare(&config, cli.output.as_deref()).await
}

// ---------------------------------------------------------------------------
// Config helpers
// ---------------------------------------------------------------------------

/// Load the config file (if any) and apply command-line overrides.
fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from_file(path).context("failed to load configuration file")?,
        None => AppConfig::default(),
    };
    apply_overrides(&mut config, cli);
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn apply_overrides(config: &mut AppConfig, cli: &Cli) {
    if let Some(repo) = &cli.repo {
        config.comparison.repo = repo.clone();
    }
    if !cli.pairs.is_empty() {
        config.comparison.pairs = cli.pairs.clone();
    }
    if cli.bidirectional {
        config.comparison.bidirectional = true;
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

async fn cmd_compare(config: &AppConfig, output: Option<&Path>) -> Result<()> {
    let pairs = config.branch_pairs().context("invalid branch pair")?;
    if pairs.is_empty() {
        anyhow::bail!("no branch pairs to compare; pass --pairs from:to or set comparison.pairs");
    }

    let engine = ComparisonEngine::from_config(config).context("failed to build comparison engine")?;
    let client = GitClient::new(&config.comparison.repo).context("failed to open git repository")?;
    info!(repo = %client.repo_path().display(), pairs = pairs.len(), "starting comparison");

    let mut reports = Vec::with_capacity(pairs.len());
    for pair in &pairs {
        let report = compare_pair(&client, &engine, pair).await;
        report::print_report(&report);
        reports.push(report);
    }

    if let Some(path) = output {
        report::write_json(&reports, path)?;
        println!();
        println!("{}", style::success(&format!("Report written to {}", path.display())));
    }

    let failed = reports
        .iter()
        .filter(|r| r.status == ComparisonStatus::Error)
        .count();
    if failed > 0 {
        eprintln!(
            "{}",
            style::warn(&format!("{failed} of {} comparison(s) could not run", reports.len()))
        );
    }
    Ok(())
}

/// Compare one pair. Missing branches and git errors yield a failed report.
async fn compare_pair(
    client: &GitClient,
    engine: &ComparisonEngine,
    pair: &BranchPair,
) -> ComparisonReport {
    for branch in [&pair.from, &pair.to] {
        if !client.branch_exists(branch) {
            warn!(%branch, "branch not found");
            return ComparisonReport::failed(
                &pair.from,
                &pair.to,
                format!("branch not found: {branch}"),
            );
        }
    }

    match client.scratch_merge(&pair.from, &pair.to) {
        Ok(merge) => engine.compare(&merge.from, &merge.to, merge.changes).await,
        Err(e) => {
            error!(%pair, error = %e, "scratch merge failed");
            ComparisonReport::failed(&pair.from, &pair.to, format!("scratch merge failed: {e}"))
        }
    }
}

fn cmd_init(output: &Path) -> Result<()> {
    let default_config = r#"# branchdiff configuration

[comparison]
repo = "."
# Branch pairs as "from:to": changes on `from` merged into `to`.
pairs = ["development:master"]
bidirectional = false

[analysis]
min_moved_block_lines = 3
workers = 4
ignore_patterns = ["target/**", "*.lock"]

[analysis.extensions]
# ".pom" = "xml"

[logging]
level = "warn"
"#;

    if output.exists() {
        anyhow::bail!(
            "file already exists: {}. Use a different path or remove the existing file.",
            output.display()
        );
    }

    std::fs::write(output, default_config).context("failed to write config file")?;

    println!("{}", style::success(&format!("Default configuration written to {}", output.display())));
    println!();
    println!("Next steps:");
    println!("  1. Edit the branch pairs and ignore patterns");
    println!("  2. Validate with: branchdiff validate --config {}", output.display());
    println!("  3. Compare with: branchdiff --config {}", output.display());

    Ok(())
}

fn cmd_validate(config_path: &Path) -> Result<()> {
    println!("Validating configuration: {}", config_path.display());
    println!();

    let config = AppConfig::load_from_file(config_path).context("failed to parse configuration")?;
    println!("  [OK] TOML structure is valid");

    match config.validate() {
        Ok(()) => println!("  [OK] All fields are valid"),
        Err(e) => {
            println!("  [FAIL] Validation error: {}", e);
            anyhow::bail!("configuration validation failed");
        }
    }

    let pairs = config.branch_pairs()?;
    println!();
    println!("Configuration summary:");
    println!("  Repository     : {}", config.comparison.repo.display());
    println!("  Branch pairs   : {}", pairs.len());
    for pair in &pairs {
        println!("                   {}", pair);
    }
    println!("  Moved block min: {} lines", config.analysis.min_moved_block_lines);
    println!("  Workers        : {}", config.analysis.workers);
    println!("  Ignore patterns: {}", config.analysis.ignore_patterns.len());
    for (ext, analyzer) in &config.analysis.extensions {
        println!("  Extension      : {} -> {}", ext, analyzer);
    }
    println!();
    println!("{}", style::success("Configuration is valid."));

    Ok(())
}
