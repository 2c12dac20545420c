use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// What to do with match rows whose merged team features are still undefined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingPolicy {
    #[default]
    Drop,
    ImputeRowMean,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrefixStyle {
    #[default]
    Prev,
    Last,
}

impl PrefixStyle {
    pub fn tag(self) -> &'static str {
        match self {
            PrefixStyle::Prev => "prev",
            PrefixStyle::Last => "last",
        }
    }
}

impl FromStr for MissingPolicy {
    type Err = PipelineError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "drop" | "drop_incomplete_rows" => Ok(MissingPolicy::Drop),
            "impute_row_mean" | "impute" => Ok(MissingPolicy::ImputeRowMean),
            other => Err(PipelineError::config(format!(
                "unknown missing policy {other:?} (expected drop | impute_row_mean)"
            ))),
        }
    }
}

impl FromStr for PrefixStyle {
    type Err = PipelineError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "prev" => Ok(PrefixStyle::Prev),
            "last" => Ok(PrefixStyle::Last),
            other => Err(PipelineError::config(format!(
                "unknown prefix style {other:?} (expected prev | last)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub features_to_shift: Vec<String>,
    pub rolling_features: Vec<String>,
    pub rolling_window: usize,
    pub backfill_window: usize,
    /// Treat an exact zero in a shifted event count as missing.
    pub zero_as_missing: bool,
    pub on_missing: MissingPolicy,
    pub prefix_style: PrefixStyle,
    pub player_id_lookback: usize,
    pub rating_lookback: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            features_to_shift: vec![
                "team_goal".to_string(),
                "team_shoton".to_string(),
                "team_possession".to_string(),
            ],
            rolling_features: vec![
                "team_goal".to_string(),
                "team_shoton".to_string(),
                "team_possession".to_string(),
                "goal_conversion_rate".to_string(),
            ],
            rolling_window: 5,
            backfill_window: 5,
            zero_as_missing: true,
            on_missing: MissingPolicy::Drop,
            prefix_style: PrefixStyle::Prev,
            player_id_lookback: 10,
            rating_lookback: 10,
        }
    }
}

impl PipelineConfig {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let cfg = serde_json::from_str::<PipelineConfig>(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_json_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn save_json_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(self)?)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.features_to_shift.is_empty() {
            return Err(PipelineError::config("features_to_shift must not be empty"));
        }
        if self.rolling_window == 0 {
            return Err(PipelineError::config("rolling_window must be at least 1"));
        }
        if self.backfill_window == 0 {
            return Err(PipelineError::config("backfill_window must be at least 1"));
        }
        if self.player_id_lookback == 0 || self.rating_lookback == 0 {
            return Err(PipelineError::config(
                "player_id_lookback and rating_lookback must be at least 1",
            ));
        }
        Ok(())
    }
}
