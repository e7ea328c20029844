use clap::Parser;
use poi_merge::utils::error::ErrorSeverity;
use poi_merge::utils::{logger, validation::Validate};
use poi_merge::{CliConfig, EtlEngine, EtlError, LocalStorage, MergePipeline, TomlConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliConfig::parse();

    // 載入 TOML 配置（日誌等級可能來自設定檔，所以先載入）
    let mut config = match TomlConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", args.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    // 初始化日誌
    if args.log_json {
        logger::init_json_logger(config.log_level());
    } else {
        let verbose = args.verbose || config.log_level() == Some("debug");
        logger::init_cli_logger(verbose);
    }

    tracing::info!("🚀 Starting poi-merge");
    tracing::info!("📁 Configuration loaded from: {}", args.config);

    // 應用命令列覆蓋設定
    args.apply_overrides(&mut config);

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    tracing::info!("✅ Configuration loaded and validated successfully");
    display_config_summary(&config, &args);

    let storage = LocalStorage::default();
    let engine = EtlEngine::new(MergePipeline::new(storage, config));

    if args.dry_run {
        match engine.dry_run().await {
            Ok(result) => {
                println!("🔍 Dry run complete, nothing written");
                println!("  Input:      {}", result.outcome.stats.total_input);
                println!("  Groups:     {}", result.outcome.stats.duplicate_groups);
                println!("  Duplicates: {}", result.outcome.stats.duplicates_found);
                println!("  Output:     {}", result.outcome.stats.unique_output);
            }
            Err(e) => exit_with(e),
        }
        return Ok(());
    }

    match engine.run().await {
        Ok(output_path) => {
            tracing::info!("✅ Merge completed successfully!");
            println!("✅ Merge completed successfully!");
            println!("📁 Output saved to: {}", output_path);
        }
        Err(e) => exit_with(e),
    }

    Ok(())
}

fn exit_with(e: EtlError) {
    tracing::error!(
        "❌ Merge failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 建議: {}", e.recovery_suggestion());

    // 根據錯誤嚴重程度決定退出碼
    let exit_code = match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    };

    if exit_code > 0 {
        std::process::exit(exit_code);
    }
}

fn display_config_summary(config: &TomlConfig, args: &CliConfig) {
    println!("📋 Configuration Summary:");
    println!(
        "  Pipeline: {} {}",
        config.pipeline.name,
        config.pipeline.version.as_deref().unwrap_or("")
    );
    for source in &config.sources {
        println!("  Source:   {} <- {}", source.tag(), source.path);
    }
    println!("  Output:   {}", config.output_path());
    println!("  Formats:  {}", config.load.output_formats.join(", "));
    println!(
        "  Matching: min score {:.2}, grouping {:?}, fuzzy {}",
        config.matching.min_score, config.matching.grouping, config.matching.fuzzy_matching
    );

    if let Some(bbox) = config.bbox() {
        println!(
            "  BBox:     {:.4},{:.4} .. {:.4},{:.4}",
            bbox.south, bbox.west, bbox.north, bbox.east
        );
    }

    if args.dry_run {
        println!("  🔍 DRY RUN MODE ENABLED");
    }

    println!();
}
