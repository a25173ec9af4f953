// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Per-chain configuration.
//!
//! A [`ChainConfig`] is immutable once handed to a chain. It is built by the
//! orchestrator from a config file or the command line and passed by value
//! into [`crate::ChainPlan::new`].

use std::fmt;
use std::str::FromStr;

use iqfan_dsp::{DemodMode, DEFAULT_IMPEDANCE};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};
use crate::sink::SinkConfig;

pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;
pub const DEFAULT_OUTPUT_CUTOFF_HZ: u32 = 5_000;

/// Decimation factor, either fixed or derived from the sample rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "DecimationRepr", into = "DecimationRepr")]
pub enum Decimation {
    #[default]
    Auto,
    Factor(u32),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum DecimationRepr {
    Factor(u32),
    Named(String),
}

impl TryFrom<DecimationRepr> for Decimation {
    type Error = String;

    fn try_from(repr: DecimationRepr) -> Result<Self, Self::Error> {
        match repr {
            DecimationRepr::Factor(q) => Ok(Self::Factor(q)),
            DecimationRepr::Named(s) => s.parse(),
        }
    }
}

impl From<Decimation> for DecimationRepr {
    fn from(d: Decimation) -> Self {
        match d {
            Decimation::Auto => Self::Named("auto".to_string()),
            Decimation::Factor(q) => Self::Factor(q),
        }
    }
}

impl FromStr for Decimation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("auto") {
            return Ok(Self::Auto);
        }
        s.parse::<u32>()
            .map(Self::Factor)
            .map_err(|_| format!("decimation must be a positive integer or \"auto\", got '{s}'"))
    }
}

impl fmt::Display for Decimation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str("auto"),
            Self::Factor(q) => write!(f, "{q}"),
        }
    }
}

/// `1 << round(log2(fs / 1000) - 8)`, exponent clamped at 0.
pub fn derive_decimation(sample_rate: u32) -> u32 {
    if sample_rate == 0 {
        return 1;
    }
    let exponent = ((sample_rate as f64 / 1000.0).log2() - 8.0).round();
    if exponent <= 0.0 {
        1
    } else {
        1u32 << (exponent as u32).min(31)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Names the chain's thread and log lines.
    pub id: String,
    pub sample_rate: u32,
    pub decimation: Decimation,
    /// Offset of the wanted signal from the capture centre (Hz).
    pub center_offset_hz: f64,
    /// Display only; never used in processing.
    pub tuned_freq_hz: f64,
    /// Per-VFO offsets relative to the centre (Hz). `Some` selects the
    /// VFO fanout.
    pub vfo_offsets_hz: Option<Vec<f64>>,
    pub mode: Option<DemodMode>,
    pub normalize: bool,
    pub output_cutoff_hz: u32,
    pub iq_correction: bool,
    pub impedance: f64,
    pub continuous_phase: bool,
    pub sink: SinkConfig,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            id: "chain".to_string(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            decimation: Decimation::Auto,
            center_offset_hz: 0.0,
            tuned_freq_hz: 0.0,
            vfo_offsets_hz: None,
            mode: None,
            normalize: false,
            output_cutoff_hz: DEFAULT_OUTPUT_CUTOFF_HZ,
            iq_correction: false,
            impedance: DEFAULT_IMPEDANCE,
            continuous_phase: false,
            sink: SinkConfig::default(),
        }
    }
}

impl ChainConfig {
    pub fn decimation_factor(&self) -> u32 {
        match self.decimation {
            Decimation::Auto => derive_decimation(self.sample_rate),
            Decimation::Factor(q) => q,
        }
    }

    /// `fs >> log2(factor)`.
    pub fn decimated_rate(&self) -> u32 {
        let q = self.decimation_factor().max(1);
        self.sample_rate >> q.trailing_zeros()
    }

    pub fn is_vfo(&self) -> bool {
        self.vfo_offsets_hz.is_some()
    }

    pub fn validate(&self) -> PipelineResult<()> {
        let id = &self.id;
        if self.sample_rate == 0 {
            return Err(PipelineError::config(format!(
                "[{id}] sample rate must be positive"
            )));
        }
        let q = self.decimation_factor();
        if q == 0 || !q.is_power_of_two() {
            return Err(PipelineError::config(format!(
                "[{id}] decimation factor must be a power of two >= 1, got {q}"
            )));
        }
        let fs_dec = self.decimated_rate();
        if fs_dec == 0 {
            return Err(PipelineError::config(format!(
                "[{id}] decimation {q} leaves no samples at {} Hz",
                self.sample_rate
            )));
        }
        if self.mode.is_none() {
            return Err(PipelineError::config(format!(
                "[{id}] no demodulator selected"
            )));
        }
        let nyquist = fs_dec as f64 / 2.0;
        if self.output_cutoff_hz == 0 || self.output_cutoff_hz as f64 >= nyquist {
            return Err(PipelineError::config(format!(
                "[{id}] output cutoff {} Hz must be in (0, {nyquist}) Hz",
                self.output_cutoff_hz
            )));
        }
        if !(self.impedance.is_finite() && self.impedance >= 0.0) {
            return Err(PipelineError::config(format!(
                "[{id}] impedance must be a non-negative number"
            )));
        }
        if let Some(offsets) = &self.vfo_offsets_hz {
            if offsets.is_empty() {
                return Err(PipelineError::config(format!("[{id}] empty VFO list")));
            }
            if let Some(bad) = offsets
                .iter()
                .find(|o| !o.is_finite() || o.abs() >= nyquist)
            {
                return Err(PipelineError::config(format!(
                    "[{id}] VFO offset {bad} Hz outside decimated band ±{nyquist} Hz"
                )));
            }
            if !self.sink.supports_fanout() {
                return Err(PipelineError::config(format!(
                    "[{id}] VFO fanout needs a file or pipe sink"
                )));
            }
        }
        Ok(())
    }
}

/// Parse a comma-separated offset list such as `"0,5000,-5000"`.
pub fn parse_offsets(list: &str) -> PipelineResult<Vec<f64>> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<f64>()
                .map_err(|_| PipelineError::config(format!("invalid VFO offset '{s}'")))
        })
        .collect()
}
