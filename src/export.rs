use std::fs::{self, File};
use std::path::Path;

use anyhow::{Context, Result};
use rust_xlsxwriter::{Workbook, Worksheet};

use crate::matrix::FeatureMatrix;
use crate::split::SeasonSplit;
use crate::trials::{TrialRecord, TrialTable, best_trial};

pub fn write_feature_csv(matrix: &FeatureMatrix, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("create output dir {}", parent.display()))?;
    }
    let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    matrix
        .write_csv(file)
        .with_context(|| format!("write feature matrix to {}", path.display()))?;
    Ok(())
}

pub fn read_feature_csv(path: &Path) -> Result<FeatureMatrix> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    FeatureMatrix::read_csv(file).with_context(|| format!("parse feature matrix {}", path.display()))
}

pub fn write_split_csvs(split: &SeasonSplit, dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("create split dir {}", dir.display()))?;
    for (name, part) in [
        ("train", &split.train),
        ("validation", &split.validation),
        ("test", &split.test),
    ] {
        write_feature_csv(part, &dir.join(format!("{name}.csv")))?;
    }
    Ok(())
}

#[derive(Debug, Clone, Copy)]
pub struct TrialsReport {
    pub trials: usize,
    pub params: usize,
    pub best_tid: Option<u64>,
}

pub fn export_trials_workbook(trials: &[TrialRecord], path: &Path) -> Result<TrialsReport> {
    let table = TrialTable::from_records(trials);
    let mut trial_rows = vec![table.columns.clone()];
    trial_rows.extend(
        table
            .rows
            .iter()
            .map(|row| row.iter().map(|v| opt_to_string(*v)).collect()),
    );

    let best = best_trial(trials);
    let mut best_rows = vec![vec!["field".to_string(), "value".to_string()]];
    if let Some(best) = best {
        best_rows.push(vec!["tid".to_string(), best.tid.to_string()]);
        best_rows.push(vec!["loss".to_string(), opt_to_string(best.loss)]);
        for (name, value) in &best.params {
            best_rows.push(vec![name.clone(), value.to_string()]);
        }
    }

    let mut workbook = Workbook::new();
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Trials")?;
        write_rows(sheet, &trial_rows)?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Best")?;
        write_rows(sheet, &best_rows)?;
    }
    workbook
        .save(path)
        .with_context(|| format!("failed writing workbook to {}", path.display()))?;

    Ok(TrialsReport {
        trials: table.len(),
        params: table.columns.len().saturating_sub(2),
        best_tid: best.map(|t| t.tid),
    })
}

fn opt_to_string<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn write_rows(worksheet: &mut Worksheet, rows: &[Vec<String>]) -> Result<()> {
    for (row_idx, row) in rows.iter().enumerate() {
        for (col_idx, value) in row.iter().enumerate() {
            worksheet
                .write_string(row_idx as u32, col_idx as u16, value)
                .with_context(|| format!("write cell ({row_idx},{col_idx})"))?;
        }
    }
    Ok(())
}
