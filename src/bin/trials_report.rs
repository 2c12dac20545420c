use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use match_features::export::export_trials_workbook;
use match_features::trials::{best_trial, load_trials};

/// Flatten hyperparameter trials into a workbook and report the best one.
#[derive(Parser, Debug)]
#[command(name = "trials_report", version, about)]
struct Args {
    /// Trials JSON (hyperopt layout)
    #[arg(long, env = "TRIALS_JSON")]
    trials: PathBuf,

    /// Output workbook
    #[arg(long, short, default_value = "trials.xlsx")]
    out: PathBuf,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let trials = load_trials(&args.trials)
        .with_context(|| format!("read trials from {}", args.trials.display()))?;
    let report = export_trials_workbook(&trials, &args.out)?;

    println!("Trials workbook written");
    println!("Out: {}", args.out.display());
    println!("Trials: {} ({} parameters)", report.trials, report.params);
    match best_trial(&trials) {
        Some(best) => {
            println!("Best trial: tid={} loss={:?}", best.tid, best.loss);
            for (name, value) in &best.params {
                println!(" - {name} = {value}");
            }
        }
        None => println!("No trial finished with a loss"),
    }
    Ok(())
}
