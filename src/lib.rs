pub mod config;
pub mod dataset;
pub mod error;
pub mod export;
pub mod fixtures;
pub mod matrix;
pub mod merge;
pub mod pipeline;
pub mod player_stats;
pub mod rolling;
pub mod shift;
pub mod split;
pub mod threshold;
pub mod timeline;
pub mod trials;

pub use config::{MissingPolicy, PipelineConfig, PrefixStyle};
pub use error::{PipelineError, Result};
pub use matrix::FeatureMatrix;
pub use pipeline::{ShiftPipeline, Stage};
