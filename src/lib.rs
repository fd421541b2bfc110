//! # Compressor Transfer-Curve Validation
//!
//! Offline check that a compressor plugin's static input/output curve matches
//! its analytic soft-knee model. A stepped sine is rendered through the plugin
//! by an external hosting harness, the rendered file is measured window by
//! window, and each level is compared with the model's prediction.
//!
//! ## Library Usage
//!
//! ### Stimulus and Measurement
//!
//! ```rust
//! use compressor_validate::{metrics, signals};
//!
//! let plan = signals::stepped_sine(&signals::StimulusSettings::default(), 48000);
//! let window = plan.windows[0];
//!
//! let level = metrics::rms_db_window(&[plan.samples.clone()], window.start, window.length);
//! assert!((level - window.level_db).abs() < 0.05);
//! ```
//!
//! ### Reference Curve
//!
//! ```rust
//! use compressor_validate::analytical::GainComputer;
//!
//! let curve = GainComputer::new(-18.0, 4.0, 6.0);
//! assert_eq!(curve.output_db(-18.0), -18.5625);
//! assert_eq!(curve.output_db(-6.0), -15.0);
//! ```
//!
//! ### Comparing a Render Without a Harness
//!
//! ```rust
//! use compressor_validate::prelude::*;
//!
//! let plan = stepped_sine(&StimulusSettings::default(), 48000);
//! let rendered = vec![plan.samples.clone(), plan.samples.clone()];
//!
//! let report = evaluate(&plan, &rendered, &GainComputer::new(-18.0, 1.0, 6.0), 0.1);
//! assert!(report.passed);
//! ```
//!
//! ## CLI Usage
//!
//! ```bash
//! # Full run against a plugin
//! compressor-validate run --harness build/vst3_harness \
//!     --plugin build/Compressor.vst3 --outdir out/transfer
//!
//! # Write the default config
//! compressor-validate init
//!
//! # Show what the harness reports for a plugin
//! compressor-validate params --harness build/vst3_harness --plugin build/Compressor.vst3
//! ```
//!
//! ## Module Overview
//!
//! - [`pcm`] - Integer PCM decode/encode and WAV I/O
//! - [`signals`] - Stepped-sine stimulus and measurement windows
//! - [`metrics`] - dB conversions and the windowed RMS meter
//! - [`analytical`] - Soft-knee gain-computer model
//! - [`params`] - Parameter table and `--set-params` encoding
//! - [`harness`] - External harness invocation
//! - [`config`] - YAML-based run configuration
//! - [`runner`] - Pipeline orchestration
//! - [`report`] - JSON and terminal reporting

// ============================================================================
// Public modules
// ============================================================================

pub mod analytical;
pub mod config;
pub mod harness;
pub mod metrics;
pub mod params;
pub mod pcm;
pub mod report;
pub mod runner;
pub mod signals;

// ============================================================================
// Top-level re-exports for convenience
// ============================================================================

pub use analytical::GainComputer;
pub use config::{ConfigError, ValidationConfig};
pub use harness::{HarnessError, HarnessRunner, RenderRequest};
pub use params::{ParamError, ParameterInfo, ParameterTable};
pub use pcm::{DecodedWav, PcmError};
pub use report::{MeasurementRow, RunInfo, TransferReport};
pub use runner::{RunnerConfig, RunnerError, TransferCurveRunner};
pub use signals::{MeasurementWindow, StimulusPlan, StimulusSettings};

/// Prelude module - import everything commonly needed
///
/// ```rust
/// use compressor_validate::prelude::*;
/// ```
pub mod prelude {
    pub use crate::analytical::{gain_computer_output_db, GainComputer};
    pub use crate::config::ValidationConfig;
    pub use crate::harness::{HarnessRunner, RenderRequest};
    pub use crate::metrics::{db_to_gain, gain_to_db, rms_db_window, FLOOR_DB};
    pub use crate::params::{build_set_params, ParameterTable};
    pub use crate::pcm::{read_wav, write_wav_pcm16};
    pub use crate::report::{MeasurementRow, TransferReport};
    pub use crate::runner::{evaluate, RunnerConfig, TransferCurveRunner};
    pub use crate::signals::{stepped_sine, StimulusPlan, StimulusSettings};
}
