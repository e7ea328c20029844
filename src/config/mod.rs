pub mod matching;
pub mod storage;
pub mod toml_config;

pub use matching::{GroupingStrategy, MatchConfig};
pub use storage::LocalStorage;
pub use toml_config::TomlConfig;

#[cfg(feature = "cli")]
use clap::Parser;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "poi-merge")]
#[command(about = "Deduplicate and merge points of interest from several sources")]
pub struct CliConfig {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "poi-merge.toml")]
    pub config: String,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,

    /// Override matching.min_score from config
    #[arg(long)]
    pub min_score: Option<f64>,

    /// Override matching.grouping from config
    #[arg(long, value_enum)]
    pub grouping: Option<GroupingStrategy>,

    /// Disable fuzzy name matching (distance-only tiers)
    #[arg(long)]
    pub no_fuzzy: bool,

    /// Override load.output_path from config
    #[arg(long)]
    pub output_path: Option<String>,

    /// Load and validate everything, but do not write any output
    #[arg(long)]
    pub dry_run: bool,
}

#[cfg(feature = "cli")]
impl CliConfig {
    /// 命令列參數覆蓋 TOML 設定
    pub fn apply_overrides(&self, config: &mut TomlConfig) {
        if let Some(min_score) = self.min_score {
            config.matching.min_score = min_score;
            tracing::info!("🔧 min_score overridden to: {}", min_score);
        }
        if let Some(grouping) = self.grouping {
            config.matching.grouping = grouping;
            tracing::info!("🔧 grouping overridden to: {:?}", grouping);
        }
        if self.no_fuzzy {
            config.matching.fuzzy_matching = false;
            tracing::info!("🔧 fuzzy matching disabled from command line");
        }
        if let Some(output_path) = &self.output_path {
            config.load.output_path = output_path.clone();
            tracing::info!("🔧 output path overridden to: {}", output_path);
        }
    }
}
