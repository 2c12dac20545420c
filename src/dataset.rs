use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use rusqlite::Connection;
use rusqlite::types::ValueRef;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, warn};

use crate::error::{PipelineError, Result};
use crate::timeline::TeamRole;

pub type MatchId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TeamId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub u64);

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchResult {
    Home,
    Draw,
    Away,
}

impl MatchResult {
    pub fn from_goals(home_goals: u32, away_goals: u32) -> Self {
        match home_goals.cmp(&away_goals) {
            std::cmp::Ordering::Greater => MatchResult::Home,
            std::cmp::Ordering::Less => MatchResult::Away,
            std::cmp::Ordering::Equal => MatchResult::Draw,
        }
    }

    pub fn code(self) -> char {
        match self {
            MatchResult::Home => 'H',
            MatchResult::Draw => 'D',
            MatchResult::Away => 'A',
        }
    }
}

impl FromStr for MatchResult {
    type Err = String;

    fn from_str(raw: &str) -> std::result::Result<Self, String> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "H" | "HOME" => Ok(MatchResult::Home),
            "D" | "DRAW" => Ok(MatchResult::Draw),
            "A" | "AWAY" => Ok(MatchResult::Away),
            _ => Err(raw.to_string()),
        }
    }
}

impl fmt::Display for MatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// One of the 22 lineup positions of a match row (`home_player_1` .. `away_player_11`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlayerSlot {
    pub role: TeamRole,
    pub number: u8,
}

impl PlayerSlot {
    pub const PER_TEAM: u8 = 11;

    pub fn new(role: TeamRole, number: u8) -> Option<Self> {
        (1..=Self::PER_TEAM)
            .contains(&number)
            .then_some(Self { role, number })
    }

    pub fn column(&self) -> String {
        format!("{}player_{}", self.role.prefix(), self.number)
    }

    fn index(&self) -> usize {
        usize::from(self.number - 1)
    }
}

static PLAYER_SLOTS: Lazy<Vec<PlayerSlot>> = Lazy::new(|| {
    TeamRole::ALL
        .iter()
        .flat_map(|role| {
            (1..=PlayerSlot::PER_TEAM).map(move |number| PlayerSlot {
                role: *role,
                number,
            })
        })
        .collect()
});

pub fn player_slots() -> &'static [PlayerSlot] {
    &PLAYER_SLOTS
}

pub const RAW_NUMERIC_COLUMNS: [&str; 6] = [
    "home_team_goal",
    "away_team_goal",
    "home_shoton",
    "away_shoton",
    "home_possession",
    "away_possession",
];

#[derive(Debug, Clone)]
pub struct MatchRecord {
    pub match_api_id: MatchId,
    pub season: String,
    pub stage: u32,
    pub date: NaiveDate,
    pub home_team: TeamId,
    pub away_team: TeamId,
    pub home_team_goal: u32,
    pub away_team_goal: u32,
    pub result_match: MatchResult,
    pub home_shoton: Option<f64>,
    pub away_shoton: Option<f64>,
    pub home_possession: Option<f64>,
    pub away_possession: Option<f64>,
    pub home_players: [Option<PlayerId>; 11],
    pub away_players: [Option<PlayerId>; 11],
}

impl MatchRecord {
    pub fn team(&self, role: TeamRole) -> TeamId {
        match role {
            TeamRole::Home => self.home_team,
            TeamRole::Away => self.away_team,
        }
    }

    pub fn player(&self, slot: PlayerSlot) -> Option<PlayerId> {
        match slot.role {
            TeamRole::Home => self.home_players[slot.index()],
            TeamRole::Away => self.away_players[slot.index()],
        }
    }

    pub fn numeric(&self, column: &str) -> Result<Option<f64>> {
        let value = match column {
            "home_team_goal" => Some(f64::from(self.home_team_goal)),
            "away_team_goal" => Some(f64::from(self.away_team_goal)),
            "home_shoton" => self.home_shoton,
            "away_shoton" => self.away_shoton,
            "home_possession" => self.home_possession,
            "away_possession" => self.away_possession,
            other => return Err(PipelineError::missing_column("matches", other)),
        };
        Ok(value)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlayerAttributeRow {
    #[serde(deserialize_with = "de_player_id")]
    pub player_api_id: PlayerId,
    #[serde(deserialize_with = "de_date")]
    pub date: NaiveDate,
    pub overall_rating: Option<f64>,
    pub acceleration: Option<f64>,
    pub strength: Option<f64>,
    pub aggression: Option<f64>,
}

const PLAYER_ATTRIBUTE_COLUMNS: [&str; 6] = [
    "player_api_id",
    "date",
    "overall_rating",
    "acceleration",
    "strength",
    "aggression",
];

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let day = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

/// Float-typed id columns carry a `.0` suffix.
pub fn parse_id(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    if let Ok(n) = raw.parse::<u64>() {
        return Some(n);
    }
    let f = raw.parse::<f64>().ok()?;
    (f.is_finite() && f >= 0.0 && f.fract() == 0.0).then_some(f as u64)
}

fn parse_number(raw: &str) -> Option<f64> {
    let n = raw.trim().parse::<f64>().ok()?;
    n.is_finite().then_some(n)
}

fn de_date<'de, D>(deserializer: D) -> std::result::Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_date(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid date {raw:?}")))
}

fn de_player_id<'de, D>(deserializer: D) -> std::result::Result<PlayerId, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_id(&raw)
        .map(PlayerId)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid player id {raw:?}")))
}

struct ColumnIndex {
    table: &'static str,
    by_name: HashMap<String, usize>,
}

impl ColumnIndex {
    fn new<'a>(table: &'static str, headers: impl IntoIterator<Item = &'a str>) -> Self {
        let by_name = headers
            .into_iter()
            .enumerate()
            .map(|(idx, name)| (name.trim().to_string(), idx))
            .collect();
        Self { table, by_name }
    }

    fn require(&self, name: &str) -> Result<usize> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| PipelineError::missing_column(self.table, name))
    }

    fn optional(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }
}

struct MatchColumns {
    match_api_id: usize,
    season: usize,
    stage: usize,
    date: usize,
    home_team: usize,
    away_team: usize,
    home_team_goal: usize,
    away_team_goal: usize,
    home_shoton: usize,
    away_shoton: usize,
    home_possession: usize,
    away_possession: usize,
    result_match: Option<usize>,
    home_players: [Option<usize>; 11],
    away_players: [Option<usize>; 11],
}

impl MatchColumns {
    fn resolve(index: &ColumnIndex) -> Result<Self> {
        let mut home_players = [None; 11];
        let mut away_players = [None; 11];
        let mut absent_slots = 0usize;
        for slot in player_slots() {
            let col = index.optional(&slot.column());
            if col.is_none() {
                absent_slots += 1;
            }
            match slot.role {
                TeamRole::Home => home_players[slot.index()] = col,
                TeamRole::Away => away_players[slot.index()] = col,
            }
        }
        if absent_slots > 0 {
            debug!(absent_slots, "player slot columns absent from match table");
        }

        Ok(Self {
            match_api_id: index.require("match_api_id")?,
            season: index.require("season")?,
            stage: index.require("stage")?,
            date: index.require("date")?,
            home_team: index.require("home_team")?,
            away_team: index.require("away_team")?,
            home_team_goal: index.require("home_team_goal")?,
            away_team_goal: index.require("away_team_goal")?,
            home_shoton: index.require("home_shoton")?,
            away_shoton: index.require("away_shoton")?,
            home_possession: index.require("home_possession")?,
            away_possession: index.require("away_possession")?,
            result_match: index.optional("result_match"),
            home_players,
            away_players,
        })
    }

    fn build<'a>(&self, row: usize, get: impl Fn(usize) -> Option<&'a str>) -> Result<MatchRecord> {
        let text = |idx: usize| get(idx).map(str::trim).unwrap_or_default();
        let invalid = |column: &str, value: &str| PipelineError::InvalidValue {
            row,
            column: column.to_string(),
            value: value.to_string(),
        };
        let id = |idx: usize, column: &str| -> Result<u64> {
            parse_id(text(idx)).ok_or_else(|| invalid(column, text(idx)))
        };

        let match_api_id = id(self.match_api_id, "match_api_id")?;
        let stage = u32::try_from(id(self.stage, "stage")?)
            .map_err(|_| invalid("stage", text(self.stage)))?;
        let date = parse_date(text(self.date)).ok_or_else(|| invalid("date", text(self.date)))?;
        let home_team_goal = u32::try_from(id(self.home_team_goal, "home_team_goal")?)
            .map_err(|_| invalid("home_team_goal", text(self.home_team_goal)))?;
        let away_team_goal = u32::try_from(id(self.away_team_goal, "away_team_goal")?)
            .map_err(|_| invalid("away_team_goal", text(self.away_team_goal)))?;

        let result_match = match self.result_match.map(|idx| text(idx)).filter(|s| !s.is_empty()) {
            Some(raw) => raw
                .parse::<MatchResult>()
                .map_err(|raw| invalid("result_match", &raw))?,
            None => MatchResult::from_goals(home_team_goal, away_team_goal),
        };

        let slot_ids = |cols: &[Option<usize>; 11]| {
            let mut out = [None; 11];
            for (dst, col) in out.iter_mut().zip(cols) {
                *dst = col.and_then(|idx| parse_id(text(idx))).map(PlayerId);
            }
            out
        };

        Ok(MatchRecord {
            match_api_id,
            season: text(self.season).to_string(),
            stage,
            date,
            home_team: TeamId(id(self.home_team, "home_team")?),
            away_team: TeamId(id(self.away_team, "away_team")?),
            home_team_goal,
            away_team_goal,
            result_match,
            home_shoton: parse_number(text(self.home_shoton)),
            away_shoton: parse_number(text(self.away_shoton)),
            home_possession: parse_number(text(self.home_possession)),
            away_possession: parse_number(text(self.away_possession)),
            home_players: slot_ids(&self.home_players),
            away_players: slot_ids(&self.away_players),
        })
    }
}

pub fn read_matches_csv<R: Read>(reader: R) -> Result<Vec<MatchRecord>> {
    let mut rdr = csv::Reader::from_reader(reader);
    let headers = rdr.headers()?.clone();
    let columns = MatchColumns::resolve(&ColumnIndex::new("matches", headers.iter()))?;

    let mut out = Vec::new();
    for (row, record) in rdr.records().enumerate() {
        let record = record?;
        out.push(columns.build(row, |idx| record.get(idx))?);
    }
    validate_matches(&out)?;
    debug!(rows = out.len(), "loaded match table from csv");
    Ok(out)
}

pub fn load_matches_csv(path: &Path) -> Result<Vec<MatchRecord>> {
    read_matches_csv(std::fs::File::open(path)?)
}

pub fn read_player_attributes_csv<R: Read>(reader: R) -> Result<Vec<PlayerAttributeRow>> {
    let mut rdr = csv::Reader::from_reader(reader);
    let index = ColumnIndex::new("player_attributes", rdr.headers()?.iter());
    for column in PLAYER_ATTRIBUTE_COLUMNS {
        index.require(column)?;
    }

    let mut out = Vec::new();
    for row in rdr.deserialize::<PlayerAttributeRow>() {
        out.push(row?);
    }
    debug!(rows = out.len(), "loaded player attribute table from csv");
    Ok(out)
}

pub fn load_player_attributes_csv(path: &Path) -> Result<Vec<PlayerAttributeRow>> {
    read_player_attributes_csv(std::fs::File::open(path)?)
}

pub fn open_db(path: &Path) -> Result<Connection> {
    Ok(Connection::open(path)?)
}

pub fn load_matches_sqlite(conn: &Connection, table: &str) -> Result<Vec<MatchRecord>> {
    if table.is_empty() || !table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(PipelineError::config(format!(
            "invalid match table name {table:?}"
        )));
    }
    let mut stmt = conn.prepare(&format!("SELECT * FROM {table}"))?;
    let names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
    let columns = MatchColumns::resolve(&ColumnIndex::new(
        "matches",
        names.iter().map(String::as_str),
    ))?;

    let mut rows = stmt.query([])?;
    let mut out = Vec::new();
    let mut row_idx = 0usize;
    while let Some(row) = rows.next()? {
        let mut fields: Vec<Option<String>> = Vec::with_capacity(names.len());
        for idx in 0..names.len() {
            fields.push(sql_text(row.get_ref(idx)?));
        }
        out.push(columns.build(row_idx, |idx| {
            fields.get(idx).and_then(|f| f.as_deref())
        })?);
        row_idx += 1;
    }
    validate_matches(&out)?;
    debug!(rows = out.len(), table, "loaded match table from sqlite");
    Ok(out)
}

pub fn load_player_attributes_sqlite(conn: &Connection) -> Result<Vec<PlayerAttributeRow>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT player_api_id, date, overall_rating, acceleration, strength, aggression
        FROM Player_Attributes
        "#,
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, Option<f64>>(2)?,
            row.get::<_, Option<f64>>(3)?,
            row.get::<_, Option<f64>>(4)?,
            row.get::<_, Option<f64>>(5)?,
        ))
    })?;

    let mut out = Vec::new();
    let mut skipped = 0usize;
    for row in rows {
        let (player_id, date, overall_rating, acceleration, strength, aggression) = row?;
        let (Ok(player_id), Some(date)) = (u64::try_from(player_id), parse_date(&date)) else {
            skipped += 1;
            continue;
        };
        out.push(PlayerAttributeRow {
            player_api_id: PlayerId(player_id),
            date,
            overall_rating,
            acceleration,
            strength,
            aggression,
        });
    }
    if skipped > 0 {
        warn!(skipped, "player attribute rows with invalid id or date skipped");
    }
    Ok(out)
}

fn sql_text(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(n) => Some(n.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(t) => Some(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(_) => None,
    }
}

pub fn validate_matches(matches: &[MatchRecord]) -> Result<()> {
    if matches.is_empty() {
        return Err(PipelineError::EmptyTable("match table"));
    }
    let mut seen = HashSet::with_capacity(matches.len());
    for (row, m) in matches.iter().enumerate() {
        if !seen.insert(m.match_api_id) {
            return Err(PipelineError::InvalidValue {
                row,
                column: "match_api_id".to_string(),
                value: format!("{} (duplicate)", m.match_api_id),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "match_api_id,season,stage,date,home_team,away_team,home_team_goal,away_team_goal,result_match,home_shoton,away_shoton,home_possession,away_possession,home_player_1,away_player_1";

    #[test]
    fn parses_match_rows() {
        let raw = format!(
            "{HEADER}\n7,2015/2016,3,2015-08-01 00:00:00,10,20,2,1,,6,,55,45,1001.0,\n"
        );
        let rows = read_matches_csv(raw.as_bytes()).unwrap();
        assert_eq!(rows.len(), 1);
        let m = &rows[0];
        assert_eq!(m.match_api_id, 7);
        assert_eq!(m.date, NaiveDate::from_ymd_opt(2015, 8, 1).unwrap());
        assert_eq!(m.result_match, MatchResult::Home);
        assert_eq!(m.away_shoton, None);
        assert_eq!(m.home_players[0], Some(PlayerId(1001)));
        assert_eq!(m.away_players[0], None);
        assert_eq!(m.home_players[5], None);
    }

    #[test]
    fn missing_required_column_fails_fast() {
        let raw = "match_api_id,season,stage,date,home_team,away_team\n1,s,1,2015-08-01,1,2\n";
        let err = read_matches_csv(raw.as_bytes()).unwrap_err();
        match err {
            PipelineError::MissingColumn { column, .. } => assert_eq!(column, "home_team_goal"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn duplicate_match_ids_are_rejected() {
        let raw = format!(
            "{HEADER}\n1,s,1,2015-08-01,1,2,0,0,D,1,1,50,50,,\n1,s,2,2015-08-08,2,1,0,0,D,1,1,50,50,,\n"
        );
        assert!(matches!(
            read_matches_csv(raw.as_bytes()),
            Err(PipelineError::InvalidValue { .. })
        ));
    }

    #[test]
    fn parses_attribute_rows() {
        let raw = "id,player_api_id,date,overall_rating,acceleration,strength,aggression\n\
                   1,1001,2010-01-01 00:00:00,60,61,,63\n";
        let rows = read_player_attributes_csv(raw.as_bytes()).unwrap();
        assert_eq!(rows[0].player_api_id, PlayerId(1001));
        assert_eq!(rows[0].strength, None);
        assert_eq!(rows[0].aggression, Some(63.0));
    }

    #[test]
    fn slot_table_covers_both_sides() {
        let slots = player_slots();
        assert_eq!(slots.len(), 22);
        assert_eq!(slots[0].column(), "home_player_1");
        assert_eq!(slots[21].column(), "away_player_11");
        assert!(PlayerSlot::new(TeamRole::Home, 12).is_none());
    }
}
