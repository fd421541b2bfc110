//! Plugin parameter table and the harness's `--set-params` wire format.
//!
//! Parameters are identified by name in configuration but by index on the
//! harness command line. The table keeps both directions, and the wire string
//! is always emitted in index order regardless of how overrides were given.
//!
//! # Example
//!
//! ```rust
//! use compressor_validate::params::{build_set_params, ParameterTable};
//! use std::collections::BTreeMap;
//!
//! let table = ParameterTable::parse_dump("1\tRatio\t0.5\n0\tThreshold\t0.7\n").unwrap();
//! let mut overrides = BTreeMap::new();
//! overrides.insert("Ratio".to_string(), 0.25);
//!
//! let wire = build_set_params(&table, &overrides).unwrap();
//! assert_eq!(wire, "0=0.700000,1=0.250000");
//! ```

use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ParamError {
    #[error("Expected parameter '{0}' not found in plugin")]
    MissingExpectedParameter(String),
    #[error("Normalized value out of range for '{name}': {value}")]
    OutOfRangeParameter { name: String, value: f64 },
    #[error("Invalid dump-params line {line}: {reason}")]
    InvalidDumpLine { line: usize, reason: String },
}

/// Index and default normalized value of one plugin parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterInfo {
    pub index: usize,
    pub default_norm: f64,
}

/// Parameters reported by the harness, keyed by name and by index.
#[derive(Debug, Clone, Default)]
pub struct ParameterTable {
    by_name: HashMap<String, ParameterInfo>,
    /// Names in dump order; plugins may report several names on one index.
    by_index: BTreeMap<usize, Vec<String>>,
}

impl ParameterTable {
    /// Parse `index\tname\tdefault[\t...]` lines from `dump-params`.
    ///
    /// Blank lines and lines with fewer than three fields are skipped. A later
    /// line with an already-seen name replaces the earlier entry. Distinct
    /// names sharing an index are all kept.
    pub fn parse_dump(text: &str) -> Result<Self, ParamError> {
        let mut table = Self::default();

        for (line_no, raw_line) in text.lines().enumerate() {
            let line = raw_line.trim();
            if line.is_empty() {
                continue;
            }

            let parts: Vec<&str> = line.split('\t').collect();
            if parts.len() < 3 {
                continue;
            }

            let index: usize = parts[0].trim().parse().map_err(|e| ParamError::InvalidDumpLine {
                line: line_no + 1,
                reason: format!("bad index '{}': {}", parts[0].trim(), e),
            })?;
            let name = parts[1].trim().to_string();
            let default_norm: f64 =
                parts[2].trim().parse().map_err(|e| ParamError::InvalidDumpLine {
                    line: line_no + 1,
                    reason: format!("bad default '{}': {}", parts[2].trim(), e),
                })?;

            table.insert(name, ParameterInfo { index, default_norm });
        }

        Ok(table)
    }

    fn insert(&mut self, name: String, info: ParameterInfo) {
        if let Some(previous) = self.by_name.insert(name.clone(), info) {
            if let Some(names) = self.by_index.get_mut(&previous.index) {
                names.retain(|n| n != &name);
                if names.is_empty() {
                    self.by_index.remove(&previous.index);
                }
            }
        }
        self.by_index.entry(info.index).or_default().push(name);
    }

    pub fn get(&self, name: &str) -> Option<&ParameterInfo> {
        self.by_name.get(name)
    }

    /// Look up a parameter that the run cannot proceed without.
    pub fn require(&self, name: &str) -> Result<&ParameterInfo, ParamError> {
        self.get(name)
            .ok_or_else(|| ParamError::MissingExpectedParameter(name.to_string()))
    }

    /// First name reported at `index`.
    pub fn name_of(&self, index: usize) -> Option<&str> {
        self.by_index
            .get(&index)
            .and_then(|names| names.first())
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// `(index, name, info)` in ascending index order, dump order within an
    /// index.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str, &ParameterInfo)> + '_ {
        self.by_index.iter().flat_map(move |(&index, names)| {
            names.iter().filter_map(move |name| {
                self.by_name
                    .get(name)
                    .map(|info| (index, name.as_str(), info))
            })
        })
    }
}

/// Merge overrides onto the table defaults and render the wire string.
///
/// Override names the plugin does not report are ignored. Every resulting
/// value must lie in `[0, 1]`.
pub fn build_set_params(
    table: &ParameterTable,
    overrides: &BTreeMap<String, f64>,
) -> Result<String, ParamError> {
    let mut pairs = Vec::with_capacity(table.len());

    for (index, name, info) in table.iter() {
        let value = overrides.get(name).copied().unwrap_or(info.default_norm);
        if !(0.0..=1.0).contains(&value) {
            return Err(ParamError::OutOfRangeParameter {
                name: name.to_string(),
                value,
            });
        }
        pairs.push((index, value));
    }

    Ok(pairs
        .iter()
        .map(|(index, value)| format!("{}={:.6}", index, value))
        .collect::<Vec<_>>()
        .join(","))
}

/// Map a value on a linear `[min, max]` range to `[0, 1]`.
pub fn linear_to_normalized(value: f64, min: f64, max: f64) -> f64 {
    ((value - min) / (max - min)).clamp(0.0, 1.0)
}

/// Map `[0, 1]` back to a linear `[min, max]` range.
pub fn normalized_to_linear(norm: f64, min: f64, max: f64) -> f64 {
    min + norm.clamp(0.0, 1.0) * (max - min)
}

/// Compressor ratio from its normalized control value.
///
/// The lower half of the control covers 1:1 to 4:1, the upper half 4:1 to
/// 20:1, so 4:1 sits exactly at 0.5.
pub fn normalized_to_ratio(norm: f64) -> f64 {
    let t = norm.clamp(0.0, 1.0);
    if t <= 0.5 {
        1.0 + (t / 0.5) * 3.0
    } else {
        4.0 + ((t - 0.5) / 0.5) * 16.0
    }
}

/// Inverse of [`normalized_to_ratio`].
pub fn ratio_to_normalized(ratio: f64) -> f64 {
    let v = ratio.clamp(1.0, 20.0);
    if v <= 4.0 {
        ((v - 1.0) / 3.0) * 0.5
    } else {
        0.5 + ((v - 4.0) / 16.0) * 0.5
    }
}
