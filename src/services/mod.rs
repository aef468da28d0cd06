pub mod pipeline;

pub use pipeline::AnalysisPipeline;
