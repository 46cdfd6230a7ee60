pub mod config;
pub mod diagnosis;
pub mod explanation;
pub mod guardrail;

pub use config::{Config, PipelineConfig};
pub use diagnosis::*;
pub use explanation::*;
pub use guardrail::*;
