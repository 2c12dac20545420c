use std::collections::HashMap;

use tracing::{debug, info};

use crate::config::{MissingPolicy, PrefixStyle};
use crate::dataset::{MatchId, TeamId};
use crate::error::Result;
use crate::matrix::FeatureMatrix;
use crate::shift::SHIFTED_SUFFIX;
use crate::timeline::{TeamRole, TeamTimeline};

#[derive(Debug, Clone, Copy, Default)]
pub struct MatchFeatureMerger {
    pub prefix_style: PrefixStyle,
    pub on_missing: MissingPolicy,
}

impl MatchFeatureMerger {
    pub fn new(prefix_style: PrefixStyle, on_missing: MissingPolicy) -> Self {
        Self {
            prefix_style,
            on_missing,
        }
    }

    pub fn merged_column(&self, role: TeamRole, column: &str) -> String {
        match self.prefix_style {
            PrefixStyle::Prev => format!("{}prev_{column}", role.prefix()),
            PrefixStyle::Last => format!(
                "{}last_{}",
                role.prefix(),
                column.strip_suffix(SHIFTED_SUFFIX).unwrap_or(column)
            ),
        }
    }

    pub fn merged_columns(&self, shifted: &TeamTimeline) -> Vec<String> {
        let source = shifted_columns(shifted);
        TeamRole::ALL
            .iter()
            .flat_map(|role| source.iter().map(move |c| self.merged_column(*role, c)))
            .collect()
    }

    /// A match side without a shifted row gets NaN in every merged column.
    pub fn merge_back(&self, matrix: &FeatureMatrix, shifted: &TeamTimeline) -> Result<FeatureMatrix> {
        let source = shifted_columns(shifted);
        let mut lookup: HashMap<(MatchId, TeamId), usize> = HashMap::with_capacity(shifted.len());
        for (idx, row) in shifted.rows().iter().enumerate() {
            lookup.insert((row.match_api_id, row.team), idx);
        }

        let mut out = matrix.clone();
        for role in TeamRole::ALL {
            let joined: Vec<Option<usize>> = matrix
                .rows()
                .iter()
                .map(|r| {
                    let team = match role {
                        TeamRole::Home => r.meta.home_team,
                        TeamRole::Away => r.meta.away_team,
                    };
                    lookup.get(&(r.meta.match_api_id, team)).copied()
                })
                .collect();

            for column in &source {
                let col_idx = shifted.column_index(column)?;
                let values = joined
                    .iter()
                    .map(|hit| {
                        hit.and_then(|i| shifted.rows()[i].values[col_idx])
                            .unwrap_or(f64::NAN)
                    })
                    .collect();
                out.set_column(&self.merged_column(role, column), values)?;
            }
        }
        debug!(
            columns = source.len() * 2,
            rows = out.len(),
            prefix = self.prefix_style.tag(),
            "shifted team features merged"
        );
        Ok(out)
    }

    pub fn drop_superseded(&self, matrix: &mut FeatureMatrix, features: &[String]) -> Vec<String> {
        let mut targets: Vec<&'static str> = Vec::new();
        for role in TeamRole::ALL {
            for feature in features {
                if let Some(col) = role.source_column(feature)
                    && !targets.contains(&col)
                {
                    targets.push(col);
                }
            }
        }
        matrix.drop_columns(&targets)
    }

    pub fn resolve_missing(&self, matrix: &mut FeatureMatrix, merged: &[String]) -> Result<()> {
        match self.on_missing {
            MissingPolicy::Drop => drop_incomplete(matrix, merged),
            MissingPolicy::ImputeRowMean => impute_row_mean(matrix, merged),
        }
    }
}

fn shifted_columns(timeline: &TeamTimeline) -> Vec<String> {
    timeline
        .columns()
        .iter()
        .filter(|c| c.ends_with(SHIFTED_SUFFIX))
        .cloned()
        .collect()
}

fn indices(matrix: &FeatureMatrix, columns: &[String]) -> Result<Vec<usize>> {
    columns.iter().map(|c| matrix.column_index(c)).collect()
}

pub fn drop_incomplete(matrix: &mut FeatureMatrix, columns: &[String]) -> Result<()> {
    let idx = indices(matrix, columns)?;
    let before = matrix.len();
    matrix.retain_rows(|r| idx.iter().all(|i| !r.values[*i].is_nan()));
    let dropped = before - matrix.len();
    if dropped > 0 {
        info!(dropped, remaining = matrix.len(), "dropped matches with incomplete team history");
    }
    Ok(())
}

/// Fills undefined entries of `columns` with the mean of the row's defined entries among them.
///
/// Rows where none of `columns` is defined are left as they are.
pub fn impute_row_mean(matrix: &mut FeatureMatrix, columns: &[String]) -> Result<()> {
    let idx = indices(matrix, columns)?;
    let mut filled = 0usize;
    let rows: Vec<Vec<f64>> = matrix
        .rows()
        .iter()
        .map(|r| {
            let defined: Vec<f64> = idx.iter().map(|i| r.values[*i]).filter(|v| !v.is_nan()).collect();
            let mut values = r.values.clone();
            if defined.is_empty() || defined.len() == idx.len() {
                return values;
            }
            let mean = defined.iter().sum::<f64>() / defined.len() as f64;
            for i in &idx {
                if values[*i].is_nan() {
                    values[*i] = mean;
                    filled += 1;
                }
            }
            values
        })
        .collect();

    for (col_pos, name) in matrix.columns().to_vec().iter().enumerate() {
        if !idx.contains(&col_pos) {
            continue;
        }
        let column = rows.iter().map(|v| v[col_pos]).collect();
        matrix.set_column(name, column)?;
    }
    if filled > 0 {
        info!(filled, "imputed undefined team features with row means");
    }
    Ok(())
}
