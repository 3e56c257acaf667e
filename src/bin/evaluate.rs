//! `evaluate` — a small CLI front end for the partial-likelihood engine.
//!
//! Reads a TOML scenario (dimensions, substitution model, tip
//! observations, edges, and an operation batch — see [`phylo_engine::scenario`]),
//! runs the full §2 data flow against an [`phylo_engine::Instance`], and
//! prints the resulting per-site log-likelihoods. Exists so the crate's
//! public surface can be exercised end to end without a tree-search
//! caller, mirroring how a BEAGLE client would drive the library.

use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use phylo_engine::scenario::Scenario;

#[derive(Debug, Parser)]
#[command(name = "evaluate", about = "Evaluate phylogenetic likelihood scenarios")]
struct Cli {
    /// path to a TOML scenario file
    scenario: std::path::PathBuf,

    /// print every per-site log-likelihood instead of only the total
    #[arg(long)]
    per_site: bool,
}

fn main() {
    phylo_engine::init_logging();
    let cli = Cli::parse();

    if let Err(err) = run(&cli) {
        eprintln!("{} {err:#}", "error:".red().bold());
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(&cli.scenario)
        .with_context(|| format!("reading {}", cli.scenario.display()))?;
    let scenario = Scenario::from_toml(&text).context("parsing scenario")?;

    log::info!("evaluating scenario {}", cli.scenario.display());
    let log_lik = scenario.evaluate().context("evaluating scenario")?;

    if cli.per_site {
        for (k, ll) in log_lik.iter().enumerate() {
            println!("{:>6}  {}", k, format!("{ll:.10}").green());
        }
    }
    let total: f64 = log_lik.iter().sum();
    println!("{}  {}", "total log-likelihood".bold(), format!("{total:.10}").green());
    Ok(())
}
