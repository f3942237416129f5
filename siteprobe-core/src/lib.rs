pub mod assets;
pub mod color;
pub mod config;
pub mod design;
pub mod error;
pub mod integrations;
pub mod model;
pub mod patterns;
pub mod pipeline;
pub mod report;
pub mod risk;
pub mod signals;
pub mod signatures;
pub mod stack;
pub mod structure;

pub use config::AnalysisConfig;
pub use error::{AnalysisError, StageError};
pub use pipeline::{Pipeline, PipelineEvent, PipelineProgressCallback, analyze};
pub use report::{Report, SCHEMA_VERSION};
