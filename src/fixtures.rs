use chrono::{Duration, NaiveDate};

use crate::dataset::{MatchRecord, MatchResult, PlayerAttributeRow, PlayerId, TeamId};

pub const TEAM_A: TeamId = TeamId(1);
pub const TEAM_B: TeamId = TeamId(2);

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
}

fn blank_match(
    match_api_id: u64,
    season: &str,
    stage: u32,
    date: NaiveDate,
    home_team: TeamId,
    away_team: TeamId,
    goals: (u32, u32),
) -> MatchRecord {
    MatchRecord {
        match_api_id,
        season: season.to_string(),
        stage,
        date,
        home_team,
        away_team,
        home_team_goal: goals.0,
        away_team_goal: goals.1,
        result_match: MatchResult::from_goals(goals.0, goals.1),
        home_shoton: None,
        away_shoton: None,
        home_possession: None,
        away_possession: None,
        home_players: [None; 11],
        away_players: [None; 11],
    }
}

/// Six matches of two teams alternating home and away over three stages.
pub fn six_match_fixture() -> Vec<MatchRecord> {
    let home_goals = [2, 3, 1, 0, 2, 2];
    let away_goals = [1, 2, 2, 3, 0, 2];
    let home_shoton = [10.0, 12.0, 8.0, 5.0, 15.0, 14.0];
    let away_shoton = [9.0, 11.0, 10.0, 7.0, 5.0, 12.0];
    let home_possession = [55.0, 60.0, 45.0, 40.0, 65.0, 62.0];
    let away_possession = [45.0, 40.0, 55.0, 60.0, 35.0, 38.0];

    let start = date(2015, 8, 1);
    (0..6)
        .map(|i| {
            let (home, away) = if i % 2 == 0 {
                (TEAM_A, TEAM_B)
            } else {
                (TEAM_B, TEAM_A)
            };
            let mut m = blank_match(
                i as u64 + 1,
                "2015/2016",
                i as u32 / 2 + 1,
                start + Duration::days(i as i64),
                home,
                away,
                (home_goals[i], away_goals[i]),
            );
            m.home_shoton = Some(home_shoton[i]);
            m.away_shoton = Some(away_shoton[i]);
            m.home_possession = Some(home_possession[i]);
            m.away_possession = Some(away_possession[i]);
            m
        })
        .collect()
}

pub fn lineup_fixture() -> Vec<MatchRecord> {
    let mut m1 = blank_match(2001, "2009/2010", 30, date(2010, 6, 5), TeamId(3001), TeamId(4001), (1, 0));
    m1.home_players[0] = Some(PlayerId(1001));
    m1.away_players[0] = Some(PlayerId(1002));

    let mut m2 = blank_match(2002, "2010/2011", 1, date(2010, 7, 10), TeamId(3001), TeamId(4002), (0, 0));
    m2.away_players[0] = Some(PlayerId(1002));

    let mut m3 = blank_match(2003, "2010/2011", 1, date(2010, 7, 11), TeamId(3002), TeamId(4002), (2, 2));
    m3.home_players[0] = Some(PlayerId(1003));

    vec![m1, m2, m3]
}

pub fn player_attribute_fixture() -> Vec<PlayerAttributeRow> {
    let rows = [
        (1001, date(2010, 1, 1), 60.0),
        (1001, date(2010, 6, 1), 65.0),
        (1002, date(2010, 3, 1), 70.0),
        (1003, date(2010, 1, 15), 75.0),
        (1001, date(2010, 7, 1), 68.0),
    ];
    rows.into_iter()
        .map(|(id, date, value)| PlayerAttributeRow {
            player_api_id: PlayerId(id),
            date,
            overall_rating: Some(value),
            acceleration: Some(value),
            strength: Some(value),
            aggression: Some(value),
        })
        .collect()
}

struct Lcg(u64);

impl Lcg {
    fn next_u32(&mut self) -> u32 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.0 >> 33) as u32
    }

    fn below(&mut self, n: u32) -> u32 {
        self.next_u32() % n.max(1)
    }
}

pub fn synthetic_league(teams: u32, seasons: u32, seed: u64) -> (Vec<MatchRecord>, Vec<PlayerAttributeRow>) {
    let teams = teams.max(2);
    let teams = teams + teams % 2;
    let mut rng = Lcg(seed);
    let mut matches = Vec::new();
    let mut next_id = 1u64;

    for season_idx in 0..seasons {
        let year = 2008 + season_idx as i32;
        let season = format!("{}/{}", year, year + 1);
        let season_start = date(year, 8, 1);
        let rounds = (teams - 1) * 2;

        for round in 0..rounds {
            let stage = round + 1;
            let day = season_start + Duration::days(i64::from(round) * 7);
            for (slot, (a, b)) in round_robin_pairs(teams, round % (teams - 1)).into_iter().enumerate() {
                let (home, away) = if round < teams - 1 { (a, b) } else { (b, a) };
                let mut m = blank_match(
                    next_id,
                    &season,
                    stage,
                    day + Duration::days(slot as i64 % 2),
                    TeamId(u64::from(home) + 1),
                    TeamId(u64::from(away) + 1),
                    (rng.below(4), rng.below(3)),
                );
                next_id += 1;

                m.home_shoton = event_count(&mut rng, 3, 9);
                m.away_shoton = event_count(&mut rng, 2, 8);
                let possession = 35 + rng.below(31);
                m.home_possession = Some(f64::from(possession));
                m.away_possession = Some(f64::from(100 - possession));
                for n in 0..11u64 {
                    if rng.below(10) > 0 {
                        m.home_players[n as usize] = Some(PlayerId((u64::from(home) + 1) * 100 + n));
                    }
                    if rng.below(10) > 0 {
                        m.away_players[n as usize] = Some(PlayerId((u64::from(away) + 1) * 100 + n));
                    }
                }
                matches.push(m);
            }
        }
    }

    let mut attributes = Vec::new();
    for team in 1..=u64::from(teams) {
        for n in 0..11u64 {
            for season_idx in 0..seasons {
                let base = f64::from(55 + rng.below(30));
                attributes.push(PlayerAttributeRow {
                    player_api_id: PlayerId(team * 100 + n),
                    date: date(2008 + season_idx as i32, 7, 1),
                    overall_rating: Some(base),
                    acceleration: Some(base + f64::from(rng.below(10))),
                    strength: Some(base - f64::from(rng.below(10))),
                    aggression: (rng.below(8) > 0).then(|| base + 1.0),
                });
            }
        }
    }

    (matches, attributes)
}

fn event_count(rng: &mut Lcg, base: u32, spread: u32) -> Option<f64> {
    match rng.below(20) {
        0 => None,
        1 => Some(0.0),
        _ => Some(f64::from(base + rng.below(spread))),
    }
}

/// Circle-method pairing for one round; `teams` must be even.
fn round_robin_pairs(teams: u32, round: u32) -> Vec<(u32, u32)> {
    let n = teams;
    let mut order: Vec<u32> = (1..n).collect();
    let len = order.len().max(1);
    order.rotate_right(round as usize % len);
    let mut ring = vec![0];
    ring.extend(order);
    (0..n / 2)
        .map(|i| (ring[i as usize], ring[(n - 1 - i) as usize]))
        .collect()
}
