pub mod config;
pub mod core;
pub mod services;

pub use config::{AnalysisConfig, DetectionConfig, GeneratorConfig};
pub use services::AnalysisPipeline;
