use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dataset::{MatchId, MatchRecord, MatchResult, TeamId};
use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TeamRole {
    Home,
    Away,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleColumns {
    pub team: &'static str,
    pub team_goal: &'static str,
    pub opponent_goal: &'static str,
    pub shoton: &'static str,
    pub possession: &'static str,
}

const HOME_COLUMNS: RoleColumns = RoleColumns {
    team: "home_team",
    team_goal: "home_team_goal",
    opponent_goal: "away_team_goal",
    shoton: "home_shoton",
    possession: "home_possession",
};

const AWAY_COLUMNS: RoleColumns = RoleColumns {
    team: "away_team",
    team_goal: "away_team_goal",
    opponent_goal: "home_team_goal",
    shoton: "away_shoton",
    possession: "away_possession",
};

impl TeamRole {
    pub const ALL: [TeamRole; 2] = [TeamRole::Home, TeamRole::Away];

    pub fn prefix(self) -> &'static str {
        match self {
            TeamRole::Home => "home_",
            TeamRole::Away => "away_",
        }
    }

    pub fn opponent(self) -> TeamRole {
        match self {
            TeamRole::Home => TeamRole::Away,
            TeamRole::Away => TeamRole::Home,
        }
    }

    pub fn is_home_flag(self) -> u8 {
        match self {
            TeamRole::Home => 1,
            TeamRole::Away => 0,
        }
    }

    pub fn columns(self) -> &'static RoleColumns {
        match self {
            TeamRole::Home => &HOME_COLUMNS,
            TeamRole::Away => &AWAY_COLUMNS,
        }
    }

    pub fn source_column(self, feature: &str) -> Option<&'static str> {
        let cols = self.columns();
        match feature {
            TEAM_GOAL => Some(cols.team_goal),
            OPPONENT_GOAL => Some(cols.opponent_goal),
            TEAM_SHOTON => Some(cols.shoton),
            TEAM_POSSESSION => Some(cols.possession),
            _ => None,
        }
    }
}

impl FromStr for TeamRole {
    type Err = PipelineError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().trim_end_matches('_').to_ascii_lowercase().as_str() {
            "home" => Ok(TeamRole::Home),
            "away" => Ok(TeamRole::Away),
            _ => Err(PipelineError::config(format!(
                "team role must be either 'home' or 'away', got {raw:?}"
            ))),
        }
    }
}

impl fmt::Display for TeamRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix().trim_end_matches('_'))
    }
}

pub const TEAM_GOAL: &str = "team_goal";
pub const OPPONENT_GOAL: &str = "opponent_goal";
pub const TEAM_SHOTON: &str = "team_shoton";
pub const TEAM_POSSESSION: &str = "team_possession";

pub const BASE_FEATURES: [&str; 4] = [TEAM_GOAL, OPPONENT_GOAL, TEAM_SHOTON, TEAM_POSSESSION];

#[derive(Debug, Clone)]
pub struct TeamTimelineRow {
    pub match_api_id: MatchId,
    pub team: TeamId,
    pub opponent: TeamId,
    pub season: String,
    pub stage: u32,
    pub date: NaiveDate,
    pub role: TeamRole,
    pub result_match: MatchResult,
    pub values: Vec<Option<f64>>,
}

impl TeamTimelineRow {
    pub fn is_home(&self) -> u8 {
        self.role.is_home_flag()
    }

    fn sort_key(&self) -> (TeamId, &str, u32, NaiveDate) {
        (self.team, self.season.as_str(), self.stage, self.date)
    }
}

#[derive(Debug, Clone)]
pub struct TeamTimeline {
    columns: Vec<String>,
    rows: Vec<TeamTimelineRow>,
}

impl TeamTimeline {
    /// Rows are reordered by (team, season, stage, date) so each team forms one contiguous group.
    pub fn new(columns: Vec<String>, mut rows: Vec<TeamTimelineRow>) -> Result<Self> {
        if let Some(bad) = rows.iter().position(|r| r.values.len() != columns.len()) {
            return Err(PipelineError::InvalidValue {
                row: bad,
                column: "values".to_string(),
                value: format!(
                    "{} values for {} columns",
                    rows[bad].values.len(),
                    columns.len()
                ),
            });
        }
        rows.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[TeamTimelineRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| PipelineError::missing_column("team timeline", name))
    }

    pub fn column(&self, name: &str) -> Result<Vec<Option<f64>>> {
        let idx = self.column_index(name)?;
        Ok(self.rows.iter().map(|r| r.values[idx]).collect())
    }

    pub fn value(&self, row: usize, name: &str) -> Result<Option<f64>> {
        let idx = self.column_index(name)?;
        Ok(self.rows.get(row).and_then(|r| r.values[idx]))
    }

    pub fn set_column(&mut self, name: &str, values: Vec<Option<f64>>) -> Result<()> {
        if values.len() != self.rows.len() {
            return Err(PipelineError::InvalidValue {
                row: values.len(),
                column: name.to_string(),
                value: format!("expected {} values", self.rows.len()),
            });
        }
        match self.columns.iter().position(|c| c == name) {
            Some(idx) => {
                for (row, v) in self.rows.iter_mut().zip(values) {
                    row.values[idx] = v;
                }
            }
            None => {
                self.columns.push(name.to_string());
                for (row, v) in self.rows.iter_mut().zip(values) {
                    row.values.push(v);
                }
            }
        }
        Ok(())
    }

    pub fn retain_rows(&mut self, keep: &[bool]) {
        let mut flags = keep.iter();
        self.rows
            .retain(|_| flags.next().copied().unwrap_or(false));
    }

    pub fn groups(&self) -> Vec<Range<usize>> {
        let mut out = Vec::new();
        let mut start = 0usize;
        for idx in 1..=self.rows.len() {
            if idx == self.rows.len() || self.rows[idx].team != self.rows[start].team {
                if start < idx {
                    out.push(start..idx);
                }
                start = idx;
            }
        }
        out
    }

    pub fn is_chronological(&self) -> bool {
        self.rows
            .windows(2)
            .all(|w| w[0].sort_key() <= w[1].sort_key())
    }

    pub fn map_groups<F>(&self, name: &str, mut op: F) -> Result<Vec<Option<f64>>>
    where
        F: FnMut(&[Option<f64>]) -> Vec<Option<f64>>,
    {
        let values = self.column(name)?;
        let mut out = Vec::with_capacity(values.len());
        for range in self.groups() {
            out.extend(op(&values[range]));
        }
        Ok(out)
    }
}

pub fn select_and_rename_for_role(matches: &[MatchRecord], role: TeamRole) -> Result<Vec<TeamTimelineRow>> {
    let cols = role.columns();
    debug!(%role, "selecting timeline columns");

    let mut out = Vec::with_capacity(matches.len());
    for m in matches {
        out.push(TeamTimelineRow {
            match_api_id: m.match_api_id,
            team: m.team(role),
            opponent: m.team(role.opponent()),
            season: m.season.clone(),
            stage: m.stage,
            date: m.date,
            role,
            result_match: m.result_match,
            values: vec![
                m.numeric(cols.team_goal)?,
                m.numeric(cols.opponent_goal)?,
                m.numeric(cols.shoton)?,
                m.numeric(cols.possession)?,
            ],
        });
    }
    Ok(out)
}

pub fn concatenate_roles(
    home: Vec<TeamTimelineRow>,
    away: Vec<TeamTimelineRow>,
) -> Result<TeamTimeline> {
    let mut rows = home;
    rows.extend(away);
    if let Some(bad) = rows.iter().position(|r| r.values.len() != BASE_FEATURES.len()) {
        return Err(PipelineError::InvalidValue {
            row: bad,
            column: "values".to_string(),
            value: format!(
                "match {} has {} base values",
                rows[bad].match_api_id,
                rows[bad].values.len()
            ),
        });
    }
    debug!(rows = rows.len(), "team timeline concatenated");

    TeamTimeline::new(BASE_FEATURES.iter().map(|s| s.to_string()).collect(), rows)
}

pub fn build_team_timeline(matches: &[MatchRecord]) -> Result<TeamTimeline> {
    let home = select_and_rename_for_role(matches, TeamRole::Home)?;
    let away = select_and_rename_for_role(matches, TeamRole::Away)?;
    concatenate_roles(home, away)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::six_match_fixture;

    #[test]
    fn role_projection_renames_columns() {
        let matches = six_match_fixture();
        let away = select_and_rename_for_role(&matches, TeamRole::Away).unwrap();
        assert_eq!(away.len(), matches.len());
        assert!(away.iter().all(|r| r.is_home() == 0));
        // match 1: away side scored 1 with 9 shots on target and 45% possession
        assert_eq!(away[0].team, matches[0].away_team);
        assert_eq!(away[0].values, vec![Some(1.0), Some(2.0), Some(9.0), Some(45.0)]);
    }

    #[test]
    fn invalid_role_string_is_configuration_error() {
        assert_eq!("home_".parse::<TeamRole>().unwrap(), TeamRole::Home);
        assert_eq!("Away".parse::<TeamRole>().unwrap(), TeamRole::Away);
        assert!(matches!(
            "neutral".parse::<TeamRole>(),
            Err(PipelineError::Configuration(_))
        ));
    }

    #[test]
    fn groups_partition_by_team() {
        let timeline = build_team_timeline(&six_match_fixture()).unwrap();
        let groups = timeline.groups();
        assert_eq!(groups, vec![0..6, 6..12]);
        assert!(timeline.is_chronological());
    }

    #[test]
    fn new_orders_rows_by_team_before_grouping() {
        let matches = six_match_fixture();
        let mut rows = select_and_rename_for_role(&matches, TeamRole::Home).unwrap();
        rows.extend(select_and_rename_for_role(&matches, TeamRole::Away).unwrap());
        let columns = BASE_FEATURES.iter().map(|s| s.to_string()).collect();

        let timeline = TeamTimeline::new(columns, rows).unwrap();
        assert!(timeline.is_chronological());
        assert_eq!(timeline.groups(), vec![0..6, 6..12]);
    }

    #[test]
    fn short_row_is_reported_at_its_position() {
        let matches = six_match_fixture();
        let home = select_and_rename_for_role(&matches, TeamRole::Home).unwrap();
        let mut away = select_and_rename_for_role(&matches, TeamRole::Away).unwrap();
        away[2].values.pop();
        match concatenate_roles(home, away) {
            Err(PipelineError::InvalidValue { row, .. }) => assert_eq!(row, 8),
            other => panic!("unexpected result {:?}", other.map(|t| t.len())),
        }
    }

    #[test]
    fn set_column_rejects_length_mismatch() {
        let mut timeline = build_team_timeline(&six_match_fixture()).unwrap();
        assert!(timeline.set_column("x", vec![None; 3]).is_err());
        timeline.set_column("x", vec![Some(1.0); 12]).unwrap();
        assert_eq!(timeline.value(0, "x").unwrap(), Some(1.0));
    }
}
