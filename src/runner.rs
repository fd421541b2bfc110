//! Pipeline orchestration.
//!
//! [`TransferCurveRunner`] drives one complete validation run:
//!
//! 1. Clear and recreate the output directory
//! 2. Synthesize the stepped sine and write `transfer_input.wav`
//! 3. Ask the harness for the plugin's parameters
//! 4. Build the `--set-params` string from defaults and overrides
//! 5. Render through the plugin
//! 6. Decode `wet.wav` and measure every window against the reference curve
//!
//! The measurement stage is available on its own as [`evaluate`], which needs
//! no harness and is what the tests exercise most.
//!
//! # Example
//!
//! ```rust,ignore
//! use compressor_validate::{
//!     config::ValidationConfig,
//!     runner::{RunnerConfig, TransferCurveRunner},
//! };
//!
//! let runner_config = RunnerConfig {
//!     harness: "build/vst3_harness".into(),
//!     plugin: "build/Compressor.vst3".into(),
//!     output_dir: "out/transfer".into(),
//!     ..RunnerConfig::default()
//! };
//!
//! let runner = TransferCurveRunner::new(runner_config, ValidationConfig::default_config());
//! let report = runner.run()?;
//! report.print_rows();
//! ```

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::analytical::GainComputer;
use crate::config::{ConfigError, ValidationConfig};
use crate::harness::{HarnessError, HarnessRunner, RenderRequest};
use crate::metrics::rms_db_window;
use crate::params::{build_set_params, normalized_to_linear, normalized_to_ratio, ParamError, ParameterTable};
use crate::pcm::{self, PcmError};
use crate::report::{unix_timestamp, MeasurementRow, RunInfo, TransferReport};
use crate::signals::{stepped_sine, StimulusPlan};

/// File name of the synthesized stimulus inside the output directory.
pub const STIMULUS_FILE_NAME: &str = "transfer_input.wav";

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("PCM error: {0}")]
    Pcm(#[from] PcmError),
    #[error("{0}")]
    Param(#[from] ParamError),
    #[error("{0}")]
    Harness(#[from] HarnessError),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Rendered file has sample rate {actual} Hz, expected {expected} Hz")]
    SampleRateMismatch { expected: u32, actual: u32 },
    #[error("Harness reported no parameters for {0}")]
    NoParameters(PathBuf),
}

/// Per-run settings supplied on the command line.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Harness executable.
    pub harness: PathBuf,
    /// Plugin bundle passed through to the harness.
    pub plugin: PathBuf,
    /// Receives the stimulus, the rendered file and the report. Wiped first.
    pub output_dir: PathBuf,
    pub sample_rate: u32,
    pub block_size: u32,
    pub channels: u16,
    /// Largest allowed absolute error in dB (exclusive).
    pub max_error_db: f64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            harness: PathBuf::from("vst3_harness"),
            plugin: PathBuf::new(),
            output_dir: PathBuf::from("transfer_out"),
            sample_rate: 48000,
            block_size: 512,
            channels: 2,
            max_error_db: 0.75,
        }
    }
}

/// Main validation runner.
pub struct TransferCurveRunner {
    config: RunnerConfig,
    validation_config: ValidationConfig,
    harness: HarnessRunner,
}

impl TransferCurveRunner {
    pub fn new(config: RunnerConfig, validation_config: ValidationConfig) -> Self {
        let harness = HarnessRunner::new(&config.harness);
        Self {
            config,
            validation_config,
            harness,
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Run the full pipeline and return the report. The report is also saved
    /// to `<output_dir>/transfer_metrics.json`.
    pub fn run(&self) -> Result<TransferReport, RunnerError> {
        self.validation_config.validate()?;
        self.harness.check()?;

        let out = &self.config.output_dir;
        prepare_output_dir(out)?;

        // Stimulus
        let plan = stepped_sine(&self.validation_config.stimulus, self.config.sample_rate);
        let input_path = out.join(STIMULUS_FILE_NAME);
        pcm::write_wav_pcm16(
            &input_path,
            &plan.samples,
            self.config.sample_rate,
            self.config.channels,
        )?;
        info!(
            levels = plan.levels_db.len(),
            seconds = plan.duration(),
            "wrote {}",
            input_path.display()
        );

        // Parameters
        let table = self.load_parameters()?;
        let set_params = build_set_params(&table, &self.validation_config.overrides)?;
        debug!("set-params: {}", set_params);

        // Render
        let request = RenderRequest {
            plugin: self.config.plugin.clone(),
            input: input_path,
            output_dir: out.clone(),
            sample_rate: self.config.sample_rate,
            block_size: self.config.block_size,
            channels: self.config.channels,
            warmup_blocks: self.validation_config.warmup_blocks,
            set_params: set_params.clone(),
        };
        let wet_path = self.harness.render(&request)?;

        let wet = pcm::read_wav(&wet_path)?;
        if wet.sample_rate != self.config.sample_rate {
            return Err(RunnerError::SampleRateMismatch {
                expected: self.config.sample_rate,
                actual: wet.sample_rate,
            });
        }
        if wet.channels != self.config.channels as usize {
            warn!(
                "rendered file has {} channels, requested {}",
                wet.channels, self.config.channels
            );
        }
        info!(
            frames = wet.frames(),
            bits = wet.bits_per_sample,
            "decoded {}",
            wet_path.display()
        );

        // Measure and compare
        let report = evaluate(
            &plan,
            &wet.data,
            &self.validation_config.reference,
            self.config.max_error_db,
        )
        .with_run_info(RunInfo {
            timestamp: unix_timestamp(),
            tolerance_db: self.config.max_error_db,
            sample_rate: self.config.sample_rate,
            block_size: self.config.block_size,
            channels: self.config.channels,
            set_params,
        });

        report.save_json(out.join(crate::report::REPORT_FILE_NAME))?;
        info!(
            max_error_db = report.max_error_db,
            passed = report.passed,
            "transfer curve evaluated"
        );

        Ok(report)
    }

    /// Query, parse and sanity-check the plugin's parameter table.
    pub fn load_parameters(&self) -> Result<ParameterTable, RunnerError> {
        let dump = self.harness.dump_params(&self.config.plugin)?;
        let table = ParameterTable::parse_dump(&dump)?;
        if table.is_empty() {
            return Err(RunnerError::NoParameters(self.config.plugin.clone()));
        }
        for name in &self.validation_config.required_parameters {
            table.require(name)?;
        }
        info!(count = table.len(), "plugin parameters loaded");

        self.log_reference_settings(&table);
        Ok(table)
    }

    fn log_reference_settings(&self, table: &ParameterTable) {
        let overrides = &self.validation_config.overrides;
        let value = |name: &str| {
            overrides
                .get(name)
                .copied()
                .or_else(|| table.get(name).map(|info| info.default_norm))
        };

        if let Some(norm) = value("Threshold") {
            debug!("plugin threshold {:.2} dB", normalized_to_linear(norm, -60.0, 0.0));
        }
        if let Some(norm) = value("Ratio") {
            debug!("plugin ratio {:.2}:1", normalized_to_ratio(norm));
        }
        if let Some(norm) = value("Knee") {
            debug!("plugin knee {:.2} dB", normalized_to_linear(norm, 0.0, 12.0));
        }
    }
}

/// Remove any previous run's files and recreate the directory.
fn prepare_output_dir(dir: &Path) -> Result<(), std::io::Error> {
    if dir.exists() {
        debug!("removing previous contents of {}", dir.display());
        std::fs::remove_dir_all(dir)?;
    }
    std::fs::create_dir_all(dir)
}

/// Measure every window of `plan` in `data` and compare against `curve`.
pub fn evaluate(
    plan: &StimulusPlan,
    data: &[Vec<f64>],
    curve: &GainComputer,
    tolerance_db: f64,
) -> TransferReport {
    let rows = plan
        .windows
        .iter()
        .map(|window| {
            let expected = curve.output_db(window.level_db);
            let measured = rms_db_window(data, window.start, window.length);
            MeasurementRow::new(window.level_db, expected, measured)
        })
        .collect();

    TransferReport::new(rows, curve, tolerance_db)
}
