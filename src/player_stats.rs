use std::collections::HashMap;

use chrono::NaiveDate;
use tracing::debug;

use crate::dataset::{MatchId, MatchRecord, PlayerAttributeRow, PlayerId, PlayerSlot, TeamId};
use crate::error::Result;
use crate::matrix::FeatureMatrix;
use crate::timeline::TeamRole;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerAttribute {
    Rating,
    Acceleration,
    Strength,
    Aggression,
}

impl PlayerAttribute {
    pub const ALL: [PlayerAttribute; 4] = [
        PlayerAttribute::Rating,
        PlayerAttribute::Acceleration,
        PlayerAttribute::Strength,
        PlayerAttribute::Aggression,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PlayerAttribute::Rating => "rating",
            PlayerAttribute::Acceleration => "acceleration",
            PlayerAttribute::Strength => "strength",
            PlayerAttribute::Aggression => "aggression",
        }
    }

    fn of_row(self, row: &PlayerAttributeRow) -> Option<f64> {
        match self {
            PlayerAttribute::Rating => row.overall_rating,
            PlayerAttribute::Acceleration => row.acceleration,
            PlayerAttribute::Strength => row.strength,
            PlayerAttribute::Aggression => row.aggression,
        }
    }

    pub fn slot_column(self, slot: PlayerSlot) -> String {
        format!("player_{}_{}", self.name(), slot.column())
    }

    pub fn team_column(self, role: TeamRole) -> String {
        format!("team_{}_{role}", self.name())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlayerRatingSnapshot {
    pub overall_rating: Option<f64>,
    pub acceleration: Option<f64>,
    pub strength: Option<f64>,
    pub aggression: Option<f64>,
}

impl PlayerRatingSnapshot {
    pub fn get(&self, attribute: PlayerAttribute) -> Option<f64> {
        match attribute {
            PlayerAttribute::Rating => self.overall_rating,
            PlayerAttribute::Acceleration => self.acceleration,
            PlayerAttribute::Strength => self.strength,
            PlayerAttribute::Aggression => self.aggression,
        }
    }

    pub fn is_empty(&self) -> bool {
        PlayerAttribute::ALL.iter().all(|a| self.get(*a).is_none())
    }
}

#[derive(Debug, Clone)]
pub struct MatchPlayerFeatures {
    pub match_api_id: MatchId,
    pub columns: Vec<(String, Option<f64>)>,
}

impl MatchPlayerFeatures {
    pub fn get(&self, column: &str) -> Option<f64> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .and_then(|(_, v)| *v)
    }
}

pub struct PlayerRatingResolver<'a> {
    matches: &'a [MatchRecord],
    // match indices per (role, team), ascending by date
    by_team: HashMap<(TeamRole, TeamId), Vec<usize>>,
    by_player: HashMap<PlayerId, Vec<&'a PlayerAttributeRow>>,
    id_lookback: usize,
    rating_lookback: usize,
}

impl<'a> PlayerRatingResolver<'a> {
    pub fn new(
        matches: &'a [MatchRecord],
        attributes: &'a [PlayerAttributeRow],
        id_lookback: usize,
        rating_lookback: usize,
    ) -> Self {
        let mut by_team: HashMap<(TeamRole, TeamId), Vec<usize>> = HashMap::new();
        for (idx, m) in matches.iter().enumerate() {
            for role in TeamRole::ALL {
                by_team.entry((role, m.team(role))).or_default().push(idx);
            }
        }
        for list in by_team.values_mut() {
            list.sort_by_key(|idx| matches[*idx].date);
        }

        let mut by_player: HashMap<PlayerId, Vec<&PlayerAttributeRow>> = HashMap::new();
        for row in attributes {
            by_player.entry(row.player_api_id).or_default().push(row);
        }
        for rows in by_player.values_mut() {
            rows.sort_by_key(|r| r.date);
        }
        debug!(
            teams = by_team.len(),
            players = by_player.len(),
            "player rating resolver indexed"
        );

        Self {
            matches,
            by_team,
            by_player,
            id_lookback: id_lookback.max(1),
            rating_lookback: rating_lookback.max(1),
        }
    }

    /// The lineup id of `slot`, or the most frequent id of that slot over the team's previous
    /// matches in the same role. Ties go to the most recently seen id.
    pub fn resolve_player_id(&self, m: &MatchRecord, slot: PlayerSlot) -> Option<PlayerId> {
        if let Some(id) = m.player(slot) {
            return Some(id);
        }
        let history = self.by_team.get(&(slot.role, m.team(slot.role)))?;
        let before = history.partition_point(|idx| self.matches[*idx].date < m.date);

        // (id, count) in order of first appearance, most recent match first
        let mut counts: Vec<(PlayerId, usize)> = Vec::new();
        for idx in history[..before].iter().rev().take(self.id_lookback) {
            let Some(id) = self.matches[*idx].player(slot) else {
                continue;
            };
            match counts.iter_mut().find(|(seen, _)| *seen == id) {
                Some((_, n)) => *n += 1,
                None => counts.push((id, 1)),
            }
        }

        let mut best: Option<(PlayerId, usize)> = None;
        for (id, n) in counts {
            if best.is_none_or(|(_, top)| n > top) {
                best = Some((id, n));
            }
        }
        best.map(|(id, _)| id)
    }

    /// Per-attribute mean over the player's most recent attribute rows dated on or before `as_of`.
    pub fn resolve_rating_snapshot(&self, player: PlayerId, as_of: NaiveDate) -> PlayerRatingSnapshot {
        let Some(rows) = self.by_player.get(&player) else {
            return PlayerRatingSnapshot::default();
        };
        let upto = rows.partition_point(|r| r.date <= as_of);
        let recent = &rows[upto.saturating_sub(self.rating_lookback)..upto];

        let mean = |attribute: PlayerAttribute| {
            let (sum, n) = recent
                .iter()
                .filter_map(|r| attribute.of_row(r))
                .fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
            (n > 0).then(|| sum / n as f64)
        };
        PlayerRatingSnapshot {
            overall_rating: mean(PlayerAttribute::Rating),
            acceleration: mean(PlayerAttribute::Acceleration),
            strength: mean(PlayerAttribute::Strength),
            aggression: mean(PlayerAttribute::Aggression),
        }
    }

    pub fn compute_match_player_features(&self, m: &MatchRecord, slots: &[PlayerSlot]) -> MatchPlayerFeatures {
        let mut columns = Vec::with_capacity(slots.len() * PlayerAttribute::ALL.len() + 8);
        let mut team_values: HashMap<(TeamRole, usize), Vec<f64>> = HashMap::new();

        for slot in slots {
            let snapshot = self
                .resolve_player_id(m, *slot)
                .map(|id| self.resolve_rating_snapshot(id, m.date))
                .unwrap_or_default();
            for (a_idx, attribute) in PlayerAttribute::ALL.iter().enumerate() {
                let value = snapshot.get(*attribute);
                if let Some(v) = value {
                    team_values.entry((slot.role, a_idx)).or_default().push(v);
                }
                columns.push((attribute.slot_column(*slot), value));
            }
        }

        for role in TeamRole::ALL {
            if !slots.iter().any(|s| s.role == role) {
                continue;
            }
            for (a_idx, attribute) in PlayerAttribute::ALL.iter().enumerate() {
                let value = team_values
                    .get(&(role, a_idx))
                    .map(|vals| vals.iter().sum::<f64>() / vals.len() as f64);
                columns.push((attribute.team_column(role), value));
            }
        }

        MatchPlayerFeatures {
            match_api_id: m.match_api_id,
            columns,
        }
    }

    /// Rows whose match is unknown to the resolver get NaN.
    pub fn append_to(&self, matrix: &mut FeatureMatrix, slots: &[PlayerSlot]) -> Result<()> {
        let by_id: HashMap<MatchId, &MatchRecord> =
            self.matches.iter().map(|m| (m.match_api_id, m)).collect();

        let features: Vec<Option<MatchPlayerFeatures>> = matrix
            .rows()
            .iter()
            .map(|r| {
                by_id
                    .get(&r.meta.match_api_id)
                    .map(|m| self.compute_match_player_features(m, slots))
            })
            .collect();

        let Some(names) = features
            .iter()
            .flatten()
            .next()
            .map(|f| f.columns.iter().map(|(n, _)| n.clone()).collect::<Vec<_>>())
        else {
            return Ok(());
        };

        for (col_idx, name) in names.iter().enumerate() {
            let values = features
                .iter()
                .map(|f| {
                    f.as_ref()
                        .and_then(|f| f.columns[col_idx].1)
                        .unwrap_or(f64::NAN)
                })
                .collect();
            matrix.set_column(name, values)?;
        }
        debug!(columns = names.len(), "player features appended");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{lineup_fixture, player_attribute_fixture};

    fn slot(role: TeamRole) -> PlayerSlot {
        PlayerSlot::new(role, 1).unwrap()
    }

    fn date(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn snapshot_averages_rows_up_to_date() {
        let matches = lineup_fixture();
        let attrs = player_attribute_fixture();
        let resolver = PlayerRatingResolver::new(&matches, &attrs, 10, 10);

        let snap = resolver.resolve_rating_snapshot(PlayerId(1001), date("2010-06-15"));
        assert_eq!(snap.overall_rating, Some(62.5));
        assert_eq!(snap.aggression, Some(62.5));

        let unknown = resolver.resolve_rating_snapshot(PlayerId(9999), date("2010-06-15"));
        assert!(unknown.is_empty());
    }

    #[test]
    fn snapshot_lookback_keeps_most_recent_rows() {
        let matches = lineup_fixture();
        let attrs = player_attribute_fixture();
        let resolver = PlayerRatingResolver::new(&matches, &attrs, 10, 1);
        let snap = resolver.resolve_rating_snapshot(PlayerId(1001), date("2010-12-31"));
        assert_eq!(snap.overall_rating, Some(68.0));
    }

    #[test]
    fn lineup_id_is_returned_unchanged() {
        let matches = lineup_fixture();
        let resolver = PlayerRatingResolver::new(&matches, &[], 10, 10);
        assert_eq!(
            resolver.resolve_player_id(&matches[0], slot(TeamRole::Home)),
            Some(PlayerId(1001))
        );
    }

    #[test]
    fn missing_id_falls_back_to_mode() {
        let matches = lineup_fixture();
        let resolver = PlayerRatingResolver::new(&matches, &[], 10, 10);
        assert_eq!(
            resolver.resolve_player_id(&matches[1], slot(TeamRole::Home)),
            Some(PlayerId(1001))
        );
        // team 4002 played away the day before with 1002 in the first slot
        assert_eq!(resolver.resolve_player_id(&matches[2], slot(TeamRole::Away)), Some(PlayerId(1002)));
    }

    // home matches of team 3001 on consecutive days, then one with an empty first slot
    fn home_history(first_slot: &[u32]) -> Vec<MatchRecord> {
        let template = lineup_fixture().remove(0);
        let start = date("2011-01-01");
        let mut matches: Vec<MatchRecord> = first_slot
            .iter()
            .enumerate()
            .map(|(i, id)| {
                let mut m = template.clone();
                m.match_api_id = 5000 + i as MatchId;
                m.date = start + chrono::Days::new(i as u64);
                m.home_players[0] = Some(PlayerId(u64::from(*id)));
                m
            })
            .collect();
        let mut target = template;
        target.match_api_id = 6000;
        target.date = start + chrono::Days::new(first_slot.len() as u64);
        target.home_players[0] = None;
        matches.push(target);
        matches
    }

    #[test]
    fn mode_tie_goes_to_most_recent_id() {
        let matches = home_history(&[1002, 1001, 1002, 1001]);
        let resolver = PlayerRatingResolver::new(&matches, &[], 10, 10);
        let target = matches.last().unwrap();
        assert_eq!(resolver.resolve_player_id(target, slot(TeamRole::Home)), Some(PlayerId(1001)));

        let matches = home_history(&[1001, 1002]);
        let resolver = PlayerRatingResolver::new(&matches, &[], 10, 10);
        let target = matches.last().unwrap();
        assert_eq!(resolver.resolve_player_id(target, slot(TeamRole::Home)), Some(PlayerId(1002)));
    }

    #[test]
    fn id_lookback_limits_the_fallback_window() {
        let matches = home_history(&[1002, 1002, 1002, 1001]);
        let target = matches.last().unwrap();
        let home = slot(TeamRole::Home);

        let resolve = |lookback| PlayerRatingResolver::new(&matches, &[], lookback, 10).resolve_player_id(target, home);
        assert_eq!(resolve(10), Some(PlayerId(1002)));
        assert_eq!(resolve(1), Some(PlayerId(1001)));
        // one each inside the window, the more recent wins
        assert_eq!(resolve(2), Some(PlayerId(1001)));
        assert_eq!(resolve(3), Some(PlayerId(1002)));
    }

    #[test]
    fn unknown_team_has_no_fallback() {
        let matches = lineup_fixture();
        let resolver = PlayerRatingResolver::new(&matches, &[], 10, 10);
        let mut stranger = matches[0].clone();
        stranger.home_team = TeamId(9998);
        stranger.home_players[0] = None;
        assert_eq!(resolver.resolve_player_id(&stranger, slot(TeamRole::Home)), None);
    }

    #[test]
    fn match_features_include_team_aggregates() {
        let matches = lineup_fixture();
        let attrs = player_attribute_fixture();
        let resolver = PlayerRatingResolver::new(&matches, &attrs, 10, 10);
        let slots = [slot(TeamRole::Home), slot(TeamRole::Away)];

        let features = resolver.compute_match_player_features(&matches[0], &slots);
        assert_eq!(features.match_api_id, 2001);
        assert_eq!(features.get("player_rating_home_player_1"), Some(62.5));
        assert_eq!(features.get("player_rating_away_player_1"), Some(70.0));
        assert_eq!(features.get("team_strength_away"), Some(70.0));
        assert_eq!(features.columns.len(), 2 * 4 + 2 * 4);
    }
}
