//! Level conversion and windowed loudness measurement.
//!
//! # Example
//!
//! ```rust
//! use compressor_validate::metrics;
//!
//! let sr = 48000.0;
//! let tone: Vec<f64> = (0..4800)
//!     .map(|i| 0.5 * (2.0 * std::f64::consts::PI * 1000.0 * i as f64 / sr).sin())
//!     .collect();
//!
//! // A sine of peak 0.5 has an RMS of 0.5 / sqrt(2), about -9.03 dBFS.
//! let level = metrics::rms_db_window(&[tone], 0, 4800);
//! assert!((level + 9.031).abs() < 0.01);
//! ```

/// Level reported when there is nothing to measure or the signal is silent.
pub const FLOOR_DB: f64 = -300.0;

/// Convert decibels to a linear gain factor.
pub fn db_to_gain(db: f64) -> f64 {
    10.0_f64.powf(db / 20.0)
}

/// Convert a linear gain factor to decibels, returning `floor_db` for
/// non-positive input.
pub fn gain_to_db(gain: f64, floor_db: f64) -> f64 {
    if gain <= 0.0 {
        return floor_db;
    }
    20.0 * gain.log10()
}

/// RMS level in dBFS over `[start, start + length)` of every channel.
///
/// Squares from all channels are pooled into one mean. The window is clipped
/// to each channel's length; an empty window yields [`FLOOR_DB`].
pub fn rms_db_window(data: &[Vec<f64>], start: usize, length: usize) -> f64 {
    let mut total = 0.0;
    let mut count = 0usize;

    for channel in data {
        let end = channel.len().min(start.saturating_add(length));
        if start >= end {
            continue;
        }
        total += channel[start..end].iter().map(|s| s * s).sum::<f64>();
        count += end - start;
    }

    if count == 0 {
        return FLOOR_DB;
    }

    gain_to_db((total / count as f64).sqrt(), FLOOR_DB)
}
