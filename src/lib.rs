pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use app::pipelines::MergePipeline;
pub use config::{GroupingStrategy, LocalStorage, MatchConfig, TomlConfig};
pub use core::{dedup::DedupEngine, etl::EtlEngine};
pub use domain::model::{LocationRecord, MergedRecord};
pub use utils::error::{EtlError, Result};
