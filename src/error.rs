use thiserror::Error;

use crate::pipeline::Stage;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("`{operation}` requires stage {required}, pipeline is at stage {current}")]
    OutOfOrder {
        operation: &'static str,
        required: Stage,
        current: Stage,
    },

    #[error("missing required column `{column}` in {table}")]
    MissingColumn { table: &'static str, column: String },

    #[error("{0} is empty")]
    EmptyTable(&'static str),

    #[error("invalid value {value:?} for `{column}` at row {row}")]
    InvalidValue {
        row: usize,
        column: String,
        value: String,
    },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

impl PipelineError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn missing_column(table: &'static str, column: impl Into<String>) -> Self {
        Self::MissingColumn {
            table,
            column: column.into(),
        }
    }
}
