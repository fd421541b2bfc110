//! Compressor transfer-curve validation CLI
//!
//! Render a stepped sine through a compressor plugin via an external harness
//! and compare the measured static curve against the soft-knee model.
//!
//! # Usage
//!
//! ```bash
//! # Validate with the reference calibration
//! compressor-validate --harness build/vst3_harness --plugin build/Compressor.vst3 --outdir out
//!
//! # Same, with a custom config and a tighter tolerance
//! compressor-validate run --harness build/vst3_harness --plugin build/Compressor.vst3 \
//!     --outdir out --config validate.yaml --max-error-db 0.5 --detailed
//!
//! # Write the default config
//! compressor-validate init --config validate.yaml
//!
//! # List plugin parameters
//! compressor-validate params --harness build/vst3_harness --plugin build/Compressor.vst3
//! ```
//!
//! Logging goes to stderr and is controlled by `RUST_LOG`
//! (default `compressor_validate=info`).

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use compressor_validate::{
    config::ValidationConfig,
    harness::HarnessRunner,
    params::ParameterTable,
    report::REPORT_FILE_NAME,
    runner::{RunnerConfig, TransferCurveRunner},
};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "compressor-validate")]
#[command(about = "Validate a compressor plugin's static transfer curve")]
#[command(version)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    run: RunArgs,
}

#[derive(Args, Clone)]
struct RunArgs {
    /// Path to the plugin-hosting harness executable
    #[arg(long)]
    harness: Option<PathBuf>,

    /// Path to the plugin bundle
    #[arg(long)]
    plugin: Option<PathBuf>,

    /// Output directory (cleared before the run)
    #[arg(long)]
    outdir: Option<PathBuf>,

    /// Sample rate in Hz
    #[arg(long, default_value = "48000")]
    sr: u32,

    /// Block size in samples
    #[arg(long, default_value = "512")]
    bs: u32,

    /// Channel count
    #[arg(long, default_value = "2")]
    ch: u16,

    /// Largest allowed absolute error in dB
    #[arg(long, default_value = "0.75")]
    max_error_db: f64,

    /// Path to validation config YAML (defaults are used if absent)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Show detailed step table
    #[arg(long, short = 'd')]
    detailed: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the transfer-curve validation
    Run(RunArgs),

    /// Generate default validation config
    Init {
        /// Where to write the config
        #[arg(short, long, default_value = "validate.yaml")]
        config: PathBuf,
    },

    /// Print the parameters the harness reports for a plugin
    Params {
        #[arg(long)]
        harness: PathBuf,

        #[arg(long)]
        plugin: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::Run(args)) => run_validation(args),
        Some(Commands::Init { config }) => init_config(config),
        Some(Commands::Params { harness, plugin }) => list_params(harness, plugin),
        None => run_validation(&cli.run),
    }
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "compressor_validate=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn required<'a>(value: &'a Option<PathBuf>, flag: &str) -> anyhow::Result<&'a PathBuf> {
    value
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("missing required argument --{}", flag))
}

fn run_validation(args: &RunArgs) -> anyhow::Result<()> {
    let runner_config = RunnerConfig {
        harness: required(&args.harness, "harness")?.clone(),
        plugin: required(&args.plugin, "plugin")?.clone(),
        output_dir: required(&args.outdir, "outdir")?.clone(),
        sample_rate: args.sr,
        block_size: args.bs,
        channels: args.ch,
        max_error_db: args.max_error_db,
    };

    let validation_config = match &args.config {
        Some(path) if path.exists() => ValidationConfig::load(path)?,
        Some(path) => {
            eprintln!(
                "  {} Config {} not found, using defaults",
                "⚠".yellow(),
                path.display()
            );
            ValidationConfig::default_config()
        }
        None => ValidationConfig::default_config(),
    };

    eprintln!(
        "{} Rendering stepped sine at {}Hz, block {}, {} ch...",
        "▶".blue(),
        runner_config.sample_rate,
        runner_config.block_size,
        runner_config.channels
    );

    let output_dir = runner_config.output_dir.clone();
    let runner = TransferCurveRunner::new(runner_config, validation_config);
    let report = runner.run()?;

    report.print_summary();
    if args.detailed {
        report.print_detailed();
    }

    eprintln!(
        "{} Report saved to: {}",
        "✓".green(),
        output_dir.join(REPORT_FILE_NAME).display()
    );

    if !report.passed {
        std::process::exit(1);
    }

    Ok(())
}

fn init_config(path: &Path) -> anyhow::Result<()> {
    ValidationConfig::default_config().save(path)?;
    println!("{} Created default config at: {}", "✓".green(), path.display());
    Ok(())
}

fn list_params(harness: &Path, plugin: &Path) -> anyhow::Result<()> {
    use tabled::{Table, Tabled};

    #[derive(Tabled)]
    struct ParamRow {
        #[tabled(rename = "Index")]
        index: usize,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Default")]
        default: String,
    }

    let runner = HarnessRunner::new(harness);
    runner.check()?;
    let table = ParameterTable::parse_dump(&runner.dump_params(plugin)?)?;

    if table.is_empty() {
        println!("{} No parameters reported for {}", "✗".red(), plugin.display());
        std::process::exit(1);
    }

    let rows: Vec<ParamRow> = table
        .iter()
        .map(|(index, name, info)| ParamRow {
            index,
            name: name.to_string(),
            default: format!("{:.6}", info.default_norm),
        })
        .collect();

    println!("{}", Table::new(rows));
    Ok(())
}
