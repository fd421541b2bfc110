//! Stepped-sine stimulus synthesis.
//!
//! The stimulus is a series of 1 kHz tone bursts at increasing calibrated
//! levels, each followed by a short silence. Every burst carries a
//! [`MeasurementWindow`] placed after the processor's attack transient has
//! settled, so the loudness meter only sees the steady-state portion.
//!
//! ```text
//!  level -48 dB          level -45 dB
//! ┌──────────────────┐  ┌──────────────────┐
//! │ settle │ measure │  │ settle │ measure │  ...
//! └──────────────────┘  └──────────────────┘
//!   tone (250 ms)   gap    tone        gap
//! ```
//!
//! # Example
//!
//! ```rust
//! use compressor_validate::signals::{stepped_sine, StimulusSettings};
//!
//! let plan = stepped_sine(&StimulusSettings::default(), 48000);
//! assert_eq!(plan.levels_db.len(), 15);
//! assert_eq!(plan.windows[0].start, 5760); // 120 ms settle at 48 kHz
//! ```

use serde::{Deserialize, Serialize};
use std::f64::consts::{PI, SQRT_2};

use crate::metrics::db_to_gain;

const TWO_PI: f64 = 2.0 * PI;

/// Timing and level layout of the stepped-sine stimulus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StimulusSettings {
    /// Tone frequency in Hz.
    pub frequency_hz: f64,
    /// First (quietest) level in dBFS RMS.
    pub start_db: i32,
    /// Levels stop before reaching this value.
    pub stop_db: i32,
    pub step_db: i32,
    pub tone_seconds: f64,
    pub silence_seconds: f64,
    /// Delay from burst start to the measurement window.
    pub settle_seconds: f64,
    pub measure_seconds: f64,
    /// Peak amplitude ceiling, keeps the loudest bursts off full scale.
    pub peak_limit: f64,
}

impl Default for StimulusSettings {
    fn default() -> Self {
        Self {
            frequency_hz: 1000.0,
            start_db: -48,
            stop_db: -5,
            step_db: 3,
            tone_seconds: 0.25,
            silence_seconds: 0.05,
            settle_seconds: 0.12,
            measure_seconds: 0.10,
            peak_limit: 0.999,
        }
    }
}

impl StimulusSettings {
    /// Levels in dB, from `start_db` up to but excluding `stop_db`.
    pub fn levels_db(&self) -> Vec<f64> {
        if self.step_db <= 0 {
            return vec![];
        }
        (self.start_db..self.stop_db)
            .step_by(self.step_db as usize)
            .map(f64::from)
            .collect()
    }

    /// Check that the measurement window lies inside each tone burst.
    pub fn validate(&self) -> Result<(), String> {
        if self.step_db <= 0 {
            return Err(format!("step_db must be positive, got {}", self.step_db));
        }
        if self.start_db >= self.stop_db {
            return Err(format!(
                "start_db ({}) must be below stop_db ({}), no levels to measure",
                self.start_db, self.stop_db
            ));
        }
        if self.frequency_hz <= 0.0 {
            return Err(format!("frequency_hz must be positive, got {}", self.frequency_hz));
        }
        if self.measure_seconds <= 0.0 {
            return Err("measure_seconds must be positive".to_string());
        }
        if self.settle_seconds < 0.0 || self.silence_seconds < 0.0 {
            return Err("settle_seconds and silence_seconds must not be negative".to_string());
        }
        if self.settle_seconds + self.measure_seconds > self.tone_seconds {
            return Err(format!(
                "measurement window ({} s + {} s) does not fit in a {} s tone",
                self.settle_seconds, self.measure_seconds, self.tone_seconds
            ));
        }
        if !(self.peak_limit > 0.0 && self.peak_limit <= 1.0) {
            return Err(format!("peak_limit must be in (0, 1], got {}", self.peak_limit));
        }
        Ok(())
    }
}

/// Steady-state region of one burst, in absolute per-channel sample indices.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeasurementWindow {
    pub start: usize,
    pub length: usize,
    /// Nominal RMS input level of the burst in dBFS.
    pub level_db: f64,
}

/// A synthesized stimulus with its level and window tables.
#[derive(Debug, Clone)]
pub struct StimulusPlan {
    pub sample_rate: u32,
    /// Mono signal; fanned out to every channel on encode.
    pub samples: Vec<f64>,
    pub levels_db: Vec<f64>,
    /// Parallel to `levels_db`.
    pub windows: Vec<MeasurementWindow>,
}

impl StimulusPlan {
    /// Duration in seconds.
    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

fn seconds_to_samples(seconds: f64, sample_rate: u32) -> usize {
    (sample_rate as f64 * seconds) as usize
}

/// Append one burst to `signal` starting at `phase`; returns the phase after
/// the last sample.
fn append_burst(
    signal: &mut Vec<f64>,
    n_samples: usize,
    peak: f64,
    phase_inc: f64,
    mut phase: f64,
) -> f64 {
    for _ in 0..n_samples {
        signal.push(phase.sin() * peak);
        phase += phase_inc;
        if phase >= TWO_PI {
            phase -= TWO_PI;
        }
    }
    phase
}

/// Peak amplitude for a sine whose RMS equals `level_db`, capped at `limit`.
pub fn burst_peak(level_db: f64, limit: f64) -> f64 {
    (db_to_gain(level_db) * SQRT_2).min(limit)
}

/// Synthesize the stepped-sine stimulus.
///
/// The oscillator phase is held through each gap, so each burst starts
/// where the previous one left off.
pub fn stepped_sine(settings: &StimulusSettings, sample_rate: u32) -> StimulusPlan {
    let tone_samples = seconds_to_samples(settings.tone_seconds, sample_rate);
    let silence_samples = seconds_to_samples(settings.silence_seconds, sample_rate);
    let settle_samples = seconds_to_samples(settings.settle_seconds, sample_rate);
    let measure_samples = seconds_to_samples(settings.measure_seconds, sample_rate);

    let levels_db = settings.levels_db();
    let phase_inc = TWO_PI * settings.frequency_hz / sample_rate as f64;

    let mut samples =
        Vec::with_capacity(levels_db.len() * (tone_samples + silence_samples));
    let mut windows = Vec::with_capacity(levels_db.len());
    let mut phase = 0.0;

    for &level_db in &levels_db {
        let start = samples.len();
        let peak = burst_peak(level_db, settings.peak_limit);

        phase = append_burst(&mut samples, tone_samples, peak, phase_inc, phase);

        windows.push(MeasurementWindow {
            start: start + settle_samples,
            length: measure_samples,
            level_db,
        });

        samples.resize(samples.len() + silence_samples, 0.0);
    }

    StimulusPlan {
        sample_rate,
        samples,
        levels_db,
        windows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::rms_db_window;

    #[test]
    fn default_levels_run_from_minus_48_to_minus_6() {
        let levels = StimulusSettings::default().levels_db();
        assert_eq!(levels.len(), 15);
        assert_eq!(levels[0], -48.0);
        assert_eq!(*levels.last().unwrap(), -6.0);
        assert!(levels.windows(2).all(|w| w[1] - w[0] == 3.0));
    }

    #[test]
    fn plan_has_expected_length_and_windows() {
        let plan = stepped_sine(&StimulusSettings::default(), 48000);
        let per_level = 12000 + 2400;
        assert_eq!(plan.samples.len(), 15 * per_level);
        assert_eq!(plan.windows.len(), plan.levels_db.len());

        for (i, window) in plan.windows.iter().enumerate() {
            assert_eq!(window.start, i * per_level + 5760);
            assert_eq!(window.length, 4800);
            assert_eq!(window.level_db, plan.levels_db[i]);
            // Window stays inside the tone.
            assert!(window.start + window.length <= i * per_level + 12000);
        }
    }

    #[test]
    fn gaps_are_silent() {
        let plan = stepped_sine(&StimulusSettings::default(), 48000);
        let gap = &plan.samples[12000..14400];
        assert!(gap.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn phase_is_continuous_across_bursts() {
        let sr = 48000;
        let plan = stepped_sine(&StimulusSettings::default(), sr);
        // The gap does not advance the oscillator; burst two picks up at the
        // phase reached after 12000 tone samples.
        let phase_inc = TWO_PI * 1000.0 / sr as f64;
        let second_start = 14400;
        let peak = burst_peak(-45.0, 0.999);
        let expected = ((12000.0 * phase_inc) % TWO_PI).sin() * peak;
        assert!((plan.samples[second_start] - expected).abs() < 1e-9);
    }

    #[test]
    fn window_rms_matches_nominal_level() {
        let plan = stepped_sine(&StimulusSettings::default(), 48000);
        let data = vec![plan.samples.clone()];
        for window in &plan.windows {
            let measured = rms_db_window(&data, window.start, window.length);
            assert!(
                (measured - window.level_db).abs() < 0.01,
                "level {} measured {}",
                window.level_db,
                measured
            );
        }
    }

    #[test]
    fn peak_is_capped() {
        assert_eq!(burst_peak(0.0, 0.999), 0.999);
        assert!((burst_peak(-20.0, 0.999) - 0.1 * SQRT_2).abs() < 1e-12);
    }

    #[test]
    fn validate_rejects_window_past_tone_end() {
        let settings = StimulusSettings {
            settle_seconds: 0.2,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
        assert!(StimulusSettings::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_level_table() {
        let reversed = StimulusSettings {
            start_db: -5,
            stop_db: -48,
            ..Default::default()
        };
        assert!(reversed.levels_db().is_empty());
        assert!(reversed.validate().is_err());

        let equal = StimulusSettings {
            start_db: -20,
            stop_db: -20,
            ..Default::default()
        };
        assert!(equal.validate().is_err());

        let single = StimulusSettings {
            start_db: -20,
            stop_db: -19,
            ..Default::default()
        };
        assert_eq!(single.levels_db(), vec![-20.0]);
        assert!(single.validate().is_ok());
    }
}
