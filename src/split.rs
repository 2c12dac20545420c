use std::collections::BTreeSet;

use tracing::info;

use crate::dataset::MatchResult;
use crate::error::{PipelineError, Result};
use crate::matrix::{FeatureMatrix, MatchMeta};

#[derive(Debug, Clone, Default)]
pub struct LabeledSet {
    pub columns: Vec<String>,
    pub x: Vec<Vec<f64>>,
    pub y: Vec<MatchResult>,
    pub meta: Vec<MatchMeta>,
}

impl LabeledSet {
    fn from_matrix(matrix: &FeatureMatrix) -> Self {
        let mut set = Self {
            columns: matrix.columns().to_vec(),
            ..Self::default()
        };
        for row in matrix.rows() {
            set.x.push(row.values.clone());
            set.y.push(row.meta.result_match);
            set.meta.push(row.meta.clone());
        }
        set
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn home_win_labels(&self) -> Vec<u8> {
        self.y
            .iter()
            .map(|r| u8::from(*r == MatchResult::Home))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct SeasonSplit {
    pub newest_season: String,
    pub train_seasons: Vec<String>,
    pub validation_stage: u32,
    pub test_stage: u32,
    pub train: FeatureMatrix,
    pub validation: FeatureMatrix,
    pub test: FeatureMatrix,
}

impl SeasonSplit {
    pub fn labeled(&self) -> (LabeledSet, LabeledSet, LabeledSet) {
        (
            LabeledSet::from_matrix(&self.train),
            LabeledSet::from_matrix(&self.validation),
            LabeledSet::from_matrix(&self.test),
        )
    }
}

#[derive(Debug, Clone)]
pub struct SeasonSplitter {
    pub n_older_seasons: usize,
    /// Final stage of the newest season; the largest stage present there when unset.
    pub max_stage: Option<u32>,
    pub season_dummies: bool,
}

impl Default for SeasonSplitter {
    fn default() -> Self {
        Self {
            n_older_seasons: 7,
            max_stage: None,
            season_dummies: false,
        }
    }
}

impl SeasonSplitter {
    pub fn split(&self, matrix: &FeatureMatrix) -> Result<SeasonSplit> {
        if matrix.is_empty() {
            return Err(PipelineError::EmptyTable("feature matrix"));
        }
        let mut matrix = matrix.clone();
        matrix.sort_chronologically();
        if self.season_dummies {
            matrix.add_season_dummies()?;
        }

        let seasons: BTreeSet<&str> = matrix.rows().iter().map(|r| r.meta.season.as_str()).collect();
        let ordered: Vec<String> = seasons.into_iter().map(str::to_string).collect();
        let Some((newest, older)) = ordered.split_last() else {
            return Err(PipelineError::EmptyTable("feature matrix"));
        };
        let train_seasons: Vec<String> = older
            .iter()
            .skip(older.len().saturating_sub(self.n_older_seasons))
            .cloned()
            .collect();

        let max_stage = match self.max_stage {
            Some(stage) => stage,
            None => matrix
                .rows()
                .iter()
                .filter(|r| &r.meta.season == newest)
                .map(|r| r.meta.stage)
                .max()
                .unwrap_or_default(),
        };
        if max_stage < 2 {
            return Err(PipelineError::config(format!(
                "final stage must be at least 2 to hold out a validation round, got {max_stage}"
            )));
        }
        let validation_stage = max_stage - 1;

        let subset = |keep: &dyn Fn(&MatchMeta) -> bool| {
            let mut part = matrix.clone();
            part.retain_rows(|r| keep(&r.meta));
            part
        };
        let train = subset(&|m: &MatchMeta| {
            train_seasons.contains(&m.season) || (&m.season == newest && m.stage < validation_stage)
        });
        let validation = subset(&|m: &MatchMeta| &m.season == newest && m.stage == validation_stage);
        let test = subset(&|m: &MatchMeta| &m.season == newest && m.stage == max_stage);

        info!(
            newest = %newest,
            train = train.len(),
            validation = validation.len(),
            test = test.len(),
            "season split"
        );
        Ok(SeasonSplit {
            newest_season: newest.clone(),
            train_seasons,
            validation_stage,
            test_stage: max_stage,
            train,
            validation,
            test,
        })
    }
}
