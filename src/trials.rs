use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{PipelineError, Result};

#[derive(Debug, Deserialize)]
struct RawTrial {
    tid: u64,
    #[serde(default)]
    result: RawResult,
    #[serde(default)]
    misc: RawMisc,
}

#[derive(Debug, Default, Deserialize)]
struct RawResult {
    loss: Option<f64>,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawMisc {
    #[serde(default)]
    vals: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrialRecord {
    pub tid: u64,
    pub loss: Option<f64>,
    pub status: Option<String>,
    pub params: BTreeMap<String, f64>,
}

fn param_value(row: usize, name: &str, value: &Value) -> Result<Option<f64>> {
    let scalar = match value {
        Value::Array(items) => match items.first() {
            Some(first) => first,
            None => return Ok(None),
        },
        other => other,
    };
    match scalar {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(f64::from(u8::from(*b)))),
        Value::Number(n) => Ok(n.as_f64()),
        other => Err(PipelineError::InvalidValue {
            row,
            column: name.to_string(),
            value: other.to_string(),
        }),
    }
}

pub fn parse_trials(raw: &str) -> Result<Vec<TrialRecord>> {
    let trials: Vec<RawTrial> = serde_json::from_str(raw)?;
    let mut out = Vec::with_capacity(trials.len());
    for (row, t) in trials.into_iter().enumerate() {
        let mut params = BTreeMap::new();
        for (name, value) in &t.misc.vals {
            if let Some(v) = param_value(row, name, value)? {
                params.insert(name.clone(), v);
            }
        }
        out.push(TrialRecord {
            tid: t.tid,
            loss: t.result.loss,
            status: t.result.status,
            params,
        });
    }
    debug!(trials = out.len(), "parsed trial records");
    Ok(out)
}

pub fn load_trials(path: &Path) -> Result<Vec<TrialRecord>> {
    parse_trials(&std::fs::read_to_string(path)?)
}

/// Lowest finite loss; the earlier trial wins a tie.
pub fn best_trial(trials: &[TrialRecord]) -> Option<&TrialRecord> {
    trials
        .iter()
        .filter(|t| t.loss.is_some_and(f64::is_finite))
        .fold(None, |best: Option<&TrialRecord>, t| match best {
            Some(b) if b.loss <= t.loss => Some(b),
            _ => Some(t),
        })
}

#[derive(Debug, Clone)]
pub struct TrialTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<f64>>>,
}

impl TrialTable {
    pub fn from_records(trials: &[TrialRecord]) -> Self {
        let params: BTreeSet<&String> = trials.iter().flat_map(|t| t.params.keys()).collect();
        let mut columns: Vec<String> = params.iter().map(|p| p.to_string()).collect();
        columns.push("loss".to_string());
        columns.push("tid".to_string());

        let rows = trials
            .iter()
            .map(|t| {
                let mut row: Vec<Option<f64>> = params.iter().map(|p| t.params.get(*p).copied()).collect();
                row.push(t.loss);
                row.push(Some(t.tid as f64));
                row
            })
            .collect();
        Self { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRIALS: &str = r#"[
        {"tid": 0, "result": {"loss": 0.61, "status": "ok"},
         "misc": {"vals": {"max_depth": [4], "learning_rate": [0.1], "gamma": []}}},
        {"tid": 1, "result": {"loss": 0.55, "status": "ok"},
         "misc": {"vals": {"max_depth": [6], "learning_rate": 0.05, "gamma": [1.5]}}},
        {"tid": 2, "result": {"status": "fail"},
         "misc": {"vals": {"max_depth": [3], "learning_rate": [0.3]}}}
    ]"#;

    #[test]
    fn list_values_are_unwrapped() {
        let trials = parse_trials(TRIALS).unwrap();
        assert_eq!(trials.len(), 3);
        assert_eq!(trials[0].params.get("max_depth"), Some(&4.0));
        assert!(!trials[0].params.contains_key("gamma"));
        assert_eq!(trials[1].params.get("learning_rate"), Some(&0.05));
        assert_eq!(trials[2].loss, None);
    }

    #[test]
    fn best_trial_ignores_failures() {
        let trials = parse_trials(TRIALS).unwrap();
        assert_eq!(best_trial(&trials).map(|t| t.tid), Some(1));
        assert!(best_trial(&[]).is_none());
    }

    #[test]
    fn table_has_params_then_loss_and_tid() {
        let table = TrialTable::from_records(&parse_trials(TRIALS).unwrap());
        assert_eq!(table.columns, vec!["gamma", "learning_rate", "max_depth", "loss", "tid"]);
        assert_eq!(table.rows[0], vec![None, Some(0.1), Some(4.0), Some(0.61), Some(0.0)]);
        assert_eq!(table.rows[2][3], None);
    }

    #[test]
    fn text_parameters_are_rejected() {
        let raw = r#"[{"tid": 0, "result": {"loss": 1.0}, "misc": {"vals": {"booster": ["gbtree"]}}}]"#;
        assert!(matches!(
            parse_trials(raw),
            Err(PipelineError::InvalidValue { .. })
        ));
    }
}
