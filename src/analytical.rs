//! Analytic static transfer curve of a soft-knee compressor.
//!
//! This is the ground truth every measurement is compared against, so the
//! functional form is exact rather than an approximation:
//!
//! ```text
//!            ┌ x                                    x < T - K/2
//! y(x) =     ┤ x + (1/R - 1) (x - T + K/2)² / (2K)  T - K/2 <= x <= T + K/2
//!            └ T + (x - T) / R                      x > T + K/2
//! ```
//!
//! With `K <= 0` the knee collapses to the hard-knee curve. The quadratic
//! segment meets both straight segments with matching value and slope.

use serde::{Deserialize, Serialize};

/// Gain-computer parameters: threshold (dB), ratio (>= 1), knee width (dB).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GainComputer {
    pub threshold_db: f64,
    pub ratio: f64,
    pub knee_db: f64,
}

impl Default for GainComputer {
    fn default() -> Self {
        Self {
            threshold_db: -18.0,
            ratio: 4.0,
            knee_db: 6.0,
        }
    }
}

impl GainComputer {
    pub fn new(threshold_db: f64, ratio: f64, knee_db: f64) -> Self {
        Self {
            threshold_db,
            ratio,
            knee_db,
        }
    }

    /// Predicted output level for a static input level.
    pub fn output_db(&self, input_db: f64) -> f64 {
        gain_computer_output_db(input_db, self.threshold_db, self.ratio, self.knee_db)
    }

    /// Static gain change (<= 0 for a compressor) at `input_db`.
    pub fn gain_reduction_db(&self, input_db: f64) -> f64 {
        self.output_db(input_db) - input_db
    }

    /// Check that the parameters describe a compressor.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.ratio >= 1.0) {
            return Err(format!("ratio must be >= 1, got {}", self.ratio));
        }
        if !(self.knee_db >= 0.0) {
            return Err(format!("knee_db must be >= 0, got {}", self.knee_db));
        }
        if !self.threshold_db.is_finite() {
            return Err(format!("threshold_db must be finite, got {}", self.threshold_db));
        }
        Ok(())
    }
}

/// Soft-knee gain computer, see the module docs for the curve.
pub fn gain_computer_output_db(input_db: f64, threshold_db: f64, ratio: f64, knee_db: f64) -> f64 {
    if knee_db <= 0.0 {
        if input_db > threshold_db {
            return threshold_db + (input_db - threshold_db) / ratio;
        }
        return input_db;
    }

    let lower = threshold_db - 0.5 * knee_db;
    let upper = threshold_db + 0.5 * knee_db;

    if input_db < lower {
        return input_db;
    }
    if input_db > upper {
        return threshold_db + (input_db - threshold_db) / ratio;
    }

    let x = input_db - lower;
    let slope_delta = (1.0 / ratio) - 1.0;
    input_db + slope_delta * ((x * x) / (2.0 * knee_db))
}
