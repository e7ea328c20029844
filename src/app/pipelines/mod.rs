pub mod merge_pipeline;

pub use merge_pipeline::MergePipeline;
