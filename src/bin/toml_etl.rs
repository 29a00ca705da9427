use clap::Parser;
use hcs_etl::config::{parse_layout, parse_mode};
use hcs_etl::core::ConfigProvider;
use hcs_etl::io::parse_files;
use hcs_etl::utils::error::ErrorSeverity;
use hcs_etl::utils::{logger, validation::Validate};
use hcs_etl::{AcquisitionMode, EtlEngine, HcsPipeline, LocalStorage, PlateLayout, TomlConfig};

#[derive(Parser)]
#[command(name = "toml-etl")]
#[command(about = "Convert an ImageXpress acquisition described by a TOML file")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "hcs-config.toml")]
    config: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Override monitoring setting from config
    #[arg(long)]
    monitor: Option<bool>,

    /// Override the acquisition mode: projection or stack
    #[arg(long, value_parser = parse_mode)]
    mode: Option<AcquisitionMode>,

    /// Override the plate layout: 96 or 384
    #[arg(long, value_parser = parse_layout)]
    layout: Option<PlateLayout>,

    /// List wells and channels without writing anything
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match TomlConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", args.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    if config.json_logs() {
        logger::init_json_logger(args.verbose);
    } else {
        logger::init_cli_logger(args.verbose);
    }
    tracing::info!("📁 Loaded configuration from: {}", args.config);

    if let Some(mode) = args.mode {
        config.source.mode = mode;
        tracing::info!("🔧 Acquisition mode overridden to: {:?}", mode);
    }
    if let Some(layout) = args.layout {
        config.plate.layout = layout;
        tracing::info!("🔧 Plate layout overridden to: {}", layout);
    }

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    display_config_summary(&config, &args);

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - nothing will be written");
        perform_dry_run(&config)?;
        return Ok(());
    }

    let monitor_enabled = args.monitor.unwrap_or_else(|| config.monitoring_enabled());
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    let storage = LocalStorage::new(config.output_path().to_string());
    let pipeline = HcsPipeline::new(storage, config);
    let engine = EtlEngine::new_with_monitoring(pipeline, monitor_enabled);

    match engine.run().await {
        Ok(location) => {
            tracing::info!("✅ Conversion completed successfully!");
            println!("✅ Plate written to: {}", location);
        }
        Err(e) => {
            tracing::error!(
                "❌ Conversion failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

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
    }

    Ok(())
}

fn display_config_summary(config: &TomlConfig, args: &Args) {
    println!("📋 Configuration Summary:");
    println!("  Acquisition: {}", config.acquisition_dir());
    println!("  Output: {}", config.output_path());
    println!(
        "  Plate: {} ({}-well)",
        config.plate_name().unwrap_or("<from file names>"),
        config.layout()
    );
    println!("  Mode: {:?}", config.acquisition_mode());
    println!("  Montage: {:?}", config.montage());
    if !config.channels().is_empty() {
        println!("  Channels: {}", config.channels().join(", "));
    }
    println!("  Concurrent Wells: {}", config.concurrent_wells());
    println!("  Write Empty Chunks: {}", config.write_empty_chunks());

    if args.dry_run {
        println!("  🔍 DRY RUN MODE ENABLED");
    }
    println!();
}

fn perform_dry_run(config: &TomlConfig) -> Result<(), Box<dyn std::error::Error>> {
    let table = parse_files(
        config.acquisition_dir(),
        config.acquisition_mode().parse_mode(),
    )?;

    println!("🔍 Dry Run Analysis:");
    println!("  Files: {}", table.len());
    println!("  Plates: {}", table.names().join(", "));
    println!("  Wells ({}): {}", table.wells().len(), table.wells().join(", "));
    println!("  Fields: {}", table.fields().join(", "));
    println!("  Channels: {}", table.channels().join(", "));

    let z_steps = table.z_steps();
    if !z_steps.is_empty() {
        println!("  Z steps: {}", z_steps.len());
    }

    for well in table.wells() {
        if let Err(e) = config.layout().well_position(&well) {
            println!("  ⚠️ {}", e);
        }
    }

    println!();
    println!("✅ Dry run analysis complete.");
    Ok(())
}
