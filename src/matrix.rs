use std::collections::BTreeSet;
use std::io::{Read, Write};

use chrono::NaiveDate;
use tracing::warn;

use crate::dataset::{MatchId, MatchRecord, MatchResult, RAW_NUMERIC_COLUMNS, TeamId, parse_date, parse_id};
use crate::error::{PipelineError, Result};

pub const META_COLUMNS: [&str; 7] = [
    "match_api_id",
    "season",
    "stage",
    "date",
    "home_team",
    "away_team",
    "result_match",
];

#[derive(Debug, Clone, PartialEq)]
pub struct MatchMeta {
    pub match_api_id: MatchId,
    pub season: String,
    pub stage: u32,
    pub date: NaiveDate,
    pub home_team: TeamId,
    pub away_team: TeamId,
    pub result_match: MatchResult,
}

impl From<&MatchRecord> for MatchMeta {
    fn from(m: &MatchRecord) -> Self {
        Self {
            match_api_id: m.match_api_id,
            season: m.season.clone(),
            stage: m.stage,
            date: m.date,
            home_team: m.home_team,
            away_team: m.away_team,
            result_match: m.result_match,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FeatureRow {
    pub meta: MatchMeta,
    /// NaN marks an undefined feature.
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct FeatureMatrix {
    columns: Vec<String>,
    rows: Vec<FeatureRow>,
}

impl FeatureMatrix {
    pub fn from_matches(matches: &[MatchRecord]) -> Result<Self> {
        let mut rows = Vec::with_capacity(matches.len());
        for m in matches {
            let mut values = Vec::with_capacity(RAW_NUMERIC_COLUMNS.len());
            for col in RAW_NUMERIC_COLUMNS {
                values.push(m.numeric(col)?.unwrap_or(f64::NAN));
            }
            rows.push(FeatureRow {
                meta: MatchMeta::from(m),
                values,
            });
        }
        Ok(Self {
            columns: RAW_NUMERIC_COLUMNS.iter().map(|s| s.to_string()).collect(),
            rows,
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<FeatureRow> {
        self.rows
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
            .ok_or_else(|| PipelineError::missing_column("feature matrix", name))
    }

    pub fn column(&self, name: &str) -> Result<Vec<f64>> {
        let idx = self.column_index(name)?;
        Ok(self.rows.iter().map(|r| r.values[idx]).collect())
    }

    pub fn value(&self, row: usize, name: &str) -> Result<f64> {
        let idx = self.column_index(name)?;
        Ok(self.rows.get(row).map_or(f64::NAN, |r| r.values[idx]))
    }

    pub fn row_by_match(&self, match_api_id: MatchId) -> Option<&FeatureRow> {
        self.rows.iter().find(|r| r.meta.match_api_id == match_api_id)
    }

    pub fn set_column(&mut self, name: &str, values: Vec<f64>) -> Result<()> {
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

    pub fn rename_column(&mut self, from: &str, to: &str) -> Result<()> {
        let idx = self.column_index(from)?;
        if from != to && self.has_column(to) {
            return Err(PipelineError::config(format!(
                "cannot rename `{from}` to existing column `{to}`"
            )));
        }
        self.columns[idx] = to.to_string();
        Ok(())
    }

    /// Drops the named columns. Absent names are reported, not treated as errors.
    pub fn drop_columns<S: AsRef<str>>(&mut self, names: &[S]) -> Vec<String> {
        let mut missing = Vec::new();
        let mut drop_idx = BTreeSet::new();
        for name in names {
            match self.columns.iter().position(|c| c == name.as_ref()) {
                Some(idx) => {
                    drop_idx.insert(idx);
                }
                None => missing.push(name.as_ref().to_string()),
            }
        }
        if !missing.is_empty() {
            warn!(?missing, "columns scheduled for removal are absent from the feature matrix");
        }

        for idx in drop_idx.into_iter().rev() {
            self.columns.remove(idx);
            for row in &mut self.rows {
                row.values.remove(idx);
            }
        }
        missing
    }

    pub fn retain_rows<F>(&mut self, mut keep: F)
    where
        F: FnMut(&FeatureRow) -> bool,
    {
        self.rows.retain(|r| keep(r));
    }

    pub fn sort_chronologically(&mut self) {
        self.rows.sort_by(|a, b| {
            (&a.meta.season, a.meta.stage, a.meta.date, a.meta.match_api_id).cmp(&(
                &b.meta.season,
                b.meta.stage,
                b.meta.date,
                b.meta.match_api_id,
            ))
        });
    }

    pub fn add_season_dummies(&mut self) -> Result<Vec<String>> {
        let seasons: BTreeSet<String> = self.rows.iter().map(|r| r.meta.season.clone()).collect();
        let mut added = Vec::new();
        for season in seasons.iter().skip(1) {
            let name = format!("season_{season}");
            let values = self
                .rows
                .iter()
                .map(|r| if &r.meta.season == season { 1.0 } else { 0.0 })
                .collect();
            self.set_column(&name, values)?;
            added.push(name);
        }
        Ok(added)
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        let header: Vec<&str> = META_COLUMNS
            .iter()
            .copied()
            .chain(self.columns.iter().map(String::as_str))
            .collect();
        wtr.write_record(&header)?;

        for row in &self.rows {
            let mut record = vec![
                row.meta.match_api_id.to_string(),
                row.meta.season.clone(),
                row.meta.stage.to_string(),
                row.meta.date.format("%Y-%m-%d").to_string(),
                row.meta.home_team.to_string(),
                row.meta.away_team.to_string(),
                row.meta.result_match.to_string(),
            ];
            record.extend(row.values.iter().map(|v| {
                if v.is_nan() {
                    String::new()
                } else {
                    v.to_string()
                }
            }));
            wtr.write_record(&record)?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn read_csv<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::Reader::from_reader(reader);
        let headers = rdr.headers()?.clone();
        let mut meta_idx = [0usize; META_COLUMNS.len()];
        for (slot, name) in meta_idx.iter_mut().zip(META_COLUMNS) {
            *slot = headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| PipelineError::missing_column("feature matrix", name))?;
        }
        let feature_idx: Vec<usize> = (0..headers.len())
            .filter(|idx| !meta_idx.contains(idx))
            .collect();
        let columns = feature_idx.iter().map(|idx| headers[*idx].to_string()).collect();

        let mut rows = Vec::new();
        for (row, record) in rdr.records().enumerate() {
            let record = record?;
            let field = |idx: usize| record.get(idx).unwrap_or_default().trim();
            let invalid = |column: &str, idx: usize| PipelineError::InvalidValue {
                row,
                column: column.to_string(),
                value: field(idx).to_string(),
            };

            let meta = MatchMeta {
                match_api_id: parse_id(field(meta_idx[0])).ok_or_else(|| invalid("match_api_id", meta_idx[0]))?,
                season: field(meta_idx[1]).to_string(),
                stage: parse_id(field(meta_idx[2]))
                    .and_then(|n| u32::try_from(n).ok())
                    .ok_or_else(|| invalid("stage", meta_idx[2]))?,
                date: parse_date(field(meta_idx[3])).ok_or_else(|| invalid("date", meta_idx[3]))?,
                home_team: TeamId(parse_id(field(meta_idx[4])).ok_or_else(|| invalid("home_team", meta_idx[4]))?),
                away_team: TeamId(parse_id(field(meta_idx[5])).ok_or_else(|| invalid("away_team", meta_idx[5]))?),
                result_match: field(meta_idx[6])
                    .parse::<MatchResult>()
                    .map_err(|_| invalid("result_match", meta_idx[6]))?,
            };
            let values = feature_idx
                .iter()
                .map(|idx| field(*idx).parse::<f64>().unwrap_or(f64::NAN))
                .collect();
            rows.push(FeatureRow { meta, values });
        }
        Ok(Self { columns, rows })
    }
}
