use std::fmt;

use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::dataset::{MatchRecord, PlayerAttributeRow, player_slots, validate_matches};
use crate::error::{PipelineError, Result};
use crate::matrix::FeatureMatrix;
use crate::merge::MatchFeatureMerger;
use crate::player_stats::PlayerRatingResolver;
use crate::rolling::{RollingStatsComputer, rolling_avg_column, rolling_std_column};
use crate::shift::{FeatureShifter, GapPolicy};
use crate::timeline::{TeamTimeline, build_team_timeline};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Raw,
    Timelined,
    Shifted,
    Merged,
    Finalized,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Raw => "raw",
            Stage::Timelined => "timelined",
            Stage::Shifted => "shifted",
            Stage::Merged => "merged",
            Stage::Finalized => "finalized",
        };
        f.write_str(name)
    }
}

pub struct ShiftPipeline {
    config: PipelineConfig,
    matches: Vec<MatchRecord>,
    attributes: Option<Vec<PlayerAttributeRow>>,
    stage: Stage,
    timeline: Option<TeamTimeline>,
    shifted: Option<TeamTimeline>,
    matrix: Option<FeatureMatrix>,
    merged_columns: Vec<String>,
}

impl ShiftPipeline {
    pub fn new(matches: Vec<MatchRecord>, config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        validate_matches(&matches)?;
        Ok(Self {
            config,
            matches,
            attributes: None,
            stage: Stage::Raw,
            timeline: None,
            shifted: None,
            matrix: None,
            merged_columns: Vec::new(),
        })
    }

    pub fn with_player_attributes(mut self, attributes: Vec<PlayerAttributeRow>) -> Self {
        self.attributes = Some(attributes);
        self
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn timeline(&self) -> Option<&TeamTimeline> {
        self.timeline.as_ref()
    }

    pub fn shifted(&self) -> Option<&TeamTimeline> {
        self.shifted.as_ref()
    }

    pub fn merged_columns(&self) -> &[String] {
        &self.merged_columns
    }

    fn expect_stage(&self, operation: &'static str, required: Stage) -> Result<()> {
        if self.stage != required {
            return Err(PipelineError::OutOfOrder {
                operation,
                required,
                current: self.stage,
            });
        }
        Ok(())
    }

    fn rolling_columns(&self) -> Vec<String> {
        self.config
            .rolling_features
            .iter()
            .flat_map(|f| [rolling_avg_column(f), rolling_std_column(f)])
            .collect()
    }

    pub fn build_timeline(&mut self) -> Result<&TeamTimeline> {
        self.expect_stage("build_timeline", Stage::Raw)?;
        let timeline = build_team_timeline(&self.matches)?;
        let rolling = RollingStatsComputer::new(self.config.rolling_window);
        let timeline = rolling.apply(&timeline, &self.config.rolling_features)?;
        info!(
            matches = self.matches.len(),
            rows = timeline.len(),
            "team timeline built"
        );

        self.stage = Stage::Timelined;
        Ok(self.timeline.insert(timeline))
    }

    /// Both column sets are shifted and backfilled on the full timeline before any row is dropped.
    pub fn shift(&mut self) -> Result<&TeamTimeline> {
        self.expect_stage("shift", Stage::Timelined)?;
        let Some(timeline) = self.timeline.as_ref() else {
            return Err(PipelineError::OutOfOrder {
                operation: "shift",
                required: Stage::Timelined,
                current: Stage::Raw,
            });
        };

        let features = self.config.features_to_shift.clone();
        let rolling = self.rolling_columns();
        let values = FeatureShifter::new(
            self.config.backfill_window,
            GapPolicy::from_zero_as_missing(self.config.zero_as_missing),
        );
        let stats = FeatureShifter::new(self.config.backfill_window, GapPolicy::Undefined);

        let shifted = values.shift_by_one(timeline, &features)?;
        let shifted = stats.shift_by_one(&shifted, &rolling)?;
        let filled = values.backfill(&shifted, &features)?;
        let filled = stats.backfill(&filled, &rolling)?;
        let kept = values.drop_unresolved(&filled, &features)?;
        let kept = stats.drop_unresolved(&kept, &rolling)?;
        info!(rows = kept.len(), dropped = timeline.len() - kept.len(), "team features shifted");

        self.stage = Stage::Shifted;
        Ok(self.shifted.insert(kept))
    }

    pub fn merge(&mut self) -> Result<&FeatureMatrix> {
        self.expect_stage("merge", Stage::Shifted)?;
        let Some(shifted) = self.shifted.as_ref() else {
            return Err(PipelineError::OutOfOrder {
                operation: "merge",
                required: Stage::Shifted,
                current: Stage::Timelined,
            });
        };

        let merger = self.merger();
        let base = FeatureMatrix::from_matches(&self.matches)?;
        let mut matrix = merger.merge_back(&base, shifted)?;
        let mut superseded = self.config.features_to_shift.clone();
        for f in &self.config.rolling_features {
            if !superseded.contains(f) {
                superseded.push(f.clone());
            }
        }
        merger.drop_superseded(&mut matrix, &superseded);
        self.merged_columns = merger.merged_columns(shifted);
        debug!(columns = matrix.columns().len(), "match features merged");

        self.stage = Stage::Merged;
        Ok(self.matrix.insert(matrix))
    }

    pub fn finalize(&mut self) -> Result<FeatureMatrix> {
        self.expect_stage("finalize", Stage::Merged)?;
        let Some(mut matrix) = self.matrix.take() else {
            return Err(PipelineError::OutOfOrder {
                operation: "finalize",
                required: Stage::Merged,
                current: Stage::Shifted,
            });
        };

        self.merger().resolve_missing(&mut matrix, &self.merged_columns)?;
        if let Some(attributes) = &self.attributes {
            let resolver = PlayerRatingResolver::new(
                &self.matches,
                attributes,
                self.config.player_id_lookback,
                self.config.rating_lookback,
            );
            resolver.append_to(&mut matrix, player_slots())?;
        }
        matrix.sort_chronologically();
        info!(
            rows = matrix.len(),
            columns = matrix.columns().len(),
            "feature matrix finalized"
        );

        self.stage = Stage::Finalized;
        Ok(matrix)
    }

    pub fn run(mut self) -> Result<FeatureMatrix> {
        self.build_timeline()?;
        self.shift()?;
        self.merge()?;
        self.finalize()
    }

    fn merger(&self) -> MatchFeatureMerger {
        MatchFeatureMerger::new(self.config.prefix_style, self.config.on_missing)
    }
}
