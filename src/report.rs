//! Measurement rows, the pass/fail verdict, and report output.
//!
//! # JSON Format
//!
//! `transfer_metrics.json` carries the verdict and the reference curve at the
//! top level, followed by one row per stimulus level:
//!
//! ```json
//! {
//!   "max_error_db": 0.31,
//!   "threshold_db": -18.0,
//!   "ratio": 4.0,
//!   "knee_db": 6.0,
//!   "passed": true,
//!   "rows": [
//!     { "input_db": -48.0, "expected_db": -48.0, "measured_db": -48.02, "error_db": -0.02 }
//!   ],
//!   "run": { "tolerance_db": 0.75, "sample_rate": 48000, ... }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::analytical::GainComputer;

/// File name of the persisted report inside the output directory.
pub const REPORT_FILE_NAME: &str = "transfer_metrics.json";

/// One stimulus level: nominal input, model prediction, measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRow {
    pub input_db: f64,
    pub expected_db: f64,
    pub measured_db: f64,
    /// `measured_db - expected_db`
    pub error_db: f64,
}

impl MeasurementRow {
    pub fn new(input_db: f64, expected_db: f64, measured_db: f64) -> Self {
        Self {
            input_db,
            expected_db,
            measured_db,
            error_db: measured_db - expected_db,
        }
    }

    /// Human-readable one-line summary.
    pub fn to_line(&self) -> String {
        format!(
            "step in={:>6.1} dBFS expected={:>7.2} dBFS measured={:>7.2} dBFS error={:>+6.2} dB",
            self.input_db, self.expected_db, self.measured_db, self.error_db
        )
    }
}

/// Settings a run was performed with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunInfo {
    pub timestamp: String,
    pub tolerance_db: f64,
    pub sample_rate: u32,
    pub block_size: u32,
    pub channels: u16,
    /// Exact `--set-params` string sent to the harness.
    pub set_params: String,
}

/// Full result of one validation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferReport {
    pub max_error_db: f64,
    pub threshold_db: f64,
    pub ratio: f64,
    pub knee_db: f64,
    pub passed: bool,
    pub rows: Vec<MeasurementRow>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run: Option<RunInfo>,
}

impl TransferReport {
    /// Build the verdict from rows. Passes iff the worst absolute error is
    /// strictly below `tolerance_db`.
    pub fn new(rows: Vec<MeasurementRow>, curve: &GainComputer, tolerance_db: f64) -> Self {
        let max_error_db = rows
            .iter()
            .map(|row| row.error_db.abs())
            .fold(0.0_f64, f64::max);

        Self {
            max_error_db,
            threshold_db: curve.threshold_db,
            ratio: curve.ratio,
            knee_db: curve.knee_db,
            passed: max_error_db < tolerance_db,
            rows,
            run: None,
        }
    }

    pub fn with_run_info(mut self, run: RunInfo) -> Self {
        self.run = Some(run);
        self
    }

    /// Row with the largest absolute error.
    pub fn worst_row(&self) -> Option<&MeasurementRow> {
        self.rows
            .iter()
            .max_by(|a, b| a.error_db.abs().total_cmp(&b.error_db.abs()))
    }

    /// Save report to JSON file.
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<(), std::io::Error> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(path, json)
    }

    /// Print one line per row followed by the machine-greppable max error.
    pub fn print_rows(&self) {
        for row in &self.rows {
            println!("{}", row.to_line());
        }
        println!("MAX_ERROR_DB={:.4}", self.max_error_db);
    }

    /// Print human-readable summary to terminal.
    pub fn print_summary(&self) {
        use colored::Colorize;

        println!("\n{}", "═".repeat(60).bold());
        println!("{}", " TRANSFER CURVE VALIDATION ".bold().on_blue());
        println!("{}", "═".repeat(60).bold());
        println!(
            "Reference:  threshold {:.1} dB | ratio {:.2}:1 | knee {:.1} dB",
            self.threshold_db, self.ratio, self.knee_db
        );
        if let Some(ref run) = self.run {
            println!("Timestamp:  {}", run.timestamp.dimmed());
            println!(
                "Config:     {}Hz | block {} | {} ch",
                run.sample_rate, run.block_size, run.channels
            );
        }
        println!();

        self.print_rows();

        if let Some(worst) = self.worst_row() {
            println!(
                "Worst step: {:.1} dBFS in ({:+.2} dB)",
                worst.input_db, worst.error_db
            );
        }

        println!("{}", "─".repeat(60));
        let tolerance = self
            .run
            .as_ref()
            .map(|r| format!(" (tolerance {:.2} dB)", r.tolerance_db))
            .unwrap_or_default();
        if self.passed {
            println!("{}{}", "PASS".green().bold(), tolerance);
        } else {
            println!("{}{}", "FAIL".red().bold(), tolerance);
        }
        println!("{}\n", "═".repeat(60).bold());
    }

    /// Print detailed metrics table.
    pub fn print_detailed(&self) {
        use tabled::{Table, Tabled};

        #[derive(Tabled)]
        struct StepRow {
            #[tabled(rename = "In (dBFS)")]
            input: String,
            #[tabled(rename = "Expected")]
            expected: String,
            #[tabled(rename = "Measured")]
            measured: String,
            #[tabled(rename = "GR (dB)")]
            gain_reduction: String,
            #[tabled(rename = "Error")]
            error: String,
        }

        let rows: Vec<StepRow> = self
            .rows
            .iter()
            .map(|row| StepRow {
                input: format!("{:.1}", row.input_db),
                expected: format!("{:.2}", row.expected_db),
                measured: format!("{:.2}", row.measured_db),
                gain_reduction: format!("{:.2}", row.measured_db - row.input_db),
                error: format!("{:+.2}", row.error_db),
            })
            .collect();

        if !rows.is_empty() {
            let table = Table::new(rows);
            println!("\nDetailed Steps:\n{}", table);
        }
    }
}

/// Seconds since the Unix epoch, as a string.
pub(crate) fn unix_timestamp() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}", duration.as_secs())
}
