use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use match_features::export::{read_feature_csv, write_split_csvs};
use match_features::split::SeasonSplitter;

/// Split a feature matrix into train, validation and test rounds by season and stage.
#[derive(Parser, Debug)]
#[command(name = "split_seasons", version, about)]
struct Args {
    /// Feature CSV produced by build_features
    #[arg(long, env = "FEATURES_OUT", default_value = "features.csv")]
    features: PathBuf,

    /// Number of older seasons kept for training
    #[arg(long, default_value = "7")]
    older_seasons: usize,

    /// Final stage of the newest season (largest stage present when omitted)
    #[arg(long)]
    max_stage: Option<u32>,

    /// Add one-hot season columns
    #[arg(long, default_value = "false")]
    season_dummies: bool,

    /// Directory for train.csv, validation.csv and test.csv
    #[arg(long)]
    out_dir: Option<PathBuf>,
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
    let matrix = read_feature_csv(&args.features)?;
    let splitter = SeasonSplitter {
        n_older_seasons: args.older_seasons,
        max_stage: args.max_stage,
        season_dummies: args.season_dummies,
    };
    let split = splitter.split(&matrix).context("split feature matrix")?;
    let (train, validation, test) = split.labeled();

    println!("Newest season: {}", split.newest_season);
    println!("Training seasons: {}", split.train_seasons.join(", "));
    println!(
        "Stages: validation={} test={}",
        split.validation_stage, split.test_stage
    );
    println!("Features: {}", train.columns.len());
    for (name, set) in [("train", &train), ("validation", &validation), ("test", &test)] {
        let home_wins = set.home_win_labels().iter().filter(|y| **y == 1).count();
        println!("{name}: {} rows, {home_wins} home wins", set.len());
    }

    if let Some(dir) = &args.out_dir {
        write_split_csvs(&split, dir)?;
        println!("Split CSVs written to {}", dir.display());
    }
    Ok(())
}
