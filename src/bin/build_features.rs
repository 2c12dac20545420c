use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::info;

use match_features::config::{MissingPolicy, PipelineConfig, PrefixStyle};
use match_features::dataset::{self, MatchRecord, PlayerAttributeRow};
use match_features::export::write_feature_csv;
use match_features::fixtures::synthetic_league;
use match_features::pipeline::ShiftPipeline;

/// Build the leakage-safe match feature matrix.
#[derive(Parser, Debug)]
#[command(name = "build_features", version, about)]
struct Args {
    /// Flattened match table (CSV)
    #[arg(long, env = "MATCHES_CSV")]
    matches: Option<PathBuf>,

    /// Player attribute table (CSV)
    #[arg(long, env = "PLAYER_ATTRIBUTES_CSV")]
    player_attributes: Option<PathBuf>,

    /// SQLite database holding the match table and `Player_Attributes`
    #[arg(long, env = "SOCCER_DB")]
    db: Option<PathBuf>,

    /// Match table name inside the SQLite database
    #[arg(long, env = "MATCH_TABLE", default_value = "match_features_raw")]
    match_table: String,

    /// Pipeline config (JSON); defaults are used when omitted
    #[arg(long, env = "PIPELINE_CONFIG")]
    config: Option<PathBuf>,

    /// Override the missing-value policy (drop | impute_row_mean)
    #[arg(long)]
    on_missing: Option<MissingPolicy>,

    /// Override the merged column prefix (prev | last)
    #[arg(long)]
    prefix_style: Option<PrefixStyle>,

    /// Skip per-slot player features
    #[arg(long, default_value = "false")]
    no_players: bool,

    /// Use a generated league instead of input files
    #[arg(long, default_value = "false")]
    demo: bool,

    /// Output CSV path
    #[arg(long, short, env = "FEATURES_OUT", default_value = "features.csv")]
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
    let mut config = PipelineConfig::load_or_default(args.config.as_deref())
        .context("load pipeline config")?;
    if let Some(policy) = args.on_missing {
        config.on_missing = policy;
    }
    if let Some(style) = args.prefix_style {
        config.prefix_style = style;
    }

    let (matches, attributes) = load_inputs(&args)?;
    info!(matches = matches.len(), "inputs loaded");

    let mut pipeline = ShiftPipeline::new(matches, config).context("invalid pipeline input")?;
    if let Some(attributes) = attributes.filter(|_| !args.no_players) {
        pipeline = pipeline.with_player_attributes(attributes);
    }
    let matrix = pipeline.run().context("feature pipeline failed")?;
    write_feature_csv(&matrix, &args.out)?;

    println!("Feature matrix written");
    println!("Out: {}", args.out.display());
    println!("Rows: {}", matrix.len());
    println!("Columns: {}", matrix.columns().len());
    Ok(())
}

fn load_inputs(args: &Args) -> Result<(Vec<MatchRecord>, Option<Vec<PlayerAttributeRow>>)> {
    if args.demo {
        let (matches, attributes) = synthetic_league(10, 3, 42);
        return Ok((matches, Some(attributes)));
    }

    if let Some(db) = &args.db {
        let conn = dataset::open_db(db).with_context(|| format!("open {}", db.display()))?;
        let matches = dataset::load_matches_sqlite(&conn, &args.match_table)
            .with_context(|| format!("read table {}", args.match_table))?;
        let attributes = if args.no_players {
            None
        } else {
            Some(dataset::load_player_attributes_sqlite(&conn).context("read Player_Attributes")?)
        };
        return Ok((matches, attributes));
    }

    let Some(path) = &args.matches else {
        bail!("pass --matches, --db or --demo");
    };
    let matches = dataset::load_matches_csv(path)
        .with_context(|| format!("read matches from {}", path.display()))?;
    let attributes = match &args.player_attributes {
        Some(path) => Some(
            dataset::load_player_attributes_csv(path)
                .with_context(|| format!("read player attributes from {}", path.display()))?,
        ),
        None => None,
    };
    Ok((matches, attributes))
}
