// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

mod am;
mod fm;
mod resample;

use std::fmt;
use std::str::FromStr;

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

pub use resample::resample;

use am::demod_am;
use fm::demod_fm;

/// Narrow FM input band-limiter bandwidth (Hz).
pub const NFM_BANDWIDTH_HZ: f64 = 12_500.0;
/// Wide FM input band-limiter bandwidth (Hz).
pub const WFM_BANDWIDTH_HZ: f64 = 15_000.0;
/// AM input band-limiter bandwidth (Hz).
pub const AM_BANDWIDTH_HZ: f64 = 10_000.0;

/// Demodulation mode as named on the command line and in config files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DemodMode {
    Fm,
    Nfm,
    Wfm,
    Am,
    Real,
    Imag,
}

impl DemodMode {
    pub const ALL: [DemodMode; 6] = [
        DemodMode::Fm,
        DemodMode::Nfm,
        DemodMode::Wfm,
        DemodMode::Am,
        DemodMode::Real,
        DemodMode::Imag,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fm => "fm",
            Self::Nfm => "nfm",
            Self::Wfm => "wfm",
            Self::Am => "am",
            Self::Real => "real",
            Self::Imag => "imag",
        }
    }

    pub fn demodulator(&self) -> Demodulator {
        match self {
            Self::Fm | Self::Nfm | Self::Wfm => Demodulator::Fm,
            Self::Am => Demodulator::Am,
            Self::Real => Demodulator::Real,
            Self::Imag => Demodulator::Imag,
        }
    }

    /// Bandwidth of the input band-limiter, if the mode uses one.
    pub fn input_bandwidth_hz(&self) -> Option<f64> {
        match self {
            Self::Fm | Self::Nfm => Some(NFM_BANDWIDTH_HZ),
            Self::Wfm => Some(WFM_BANDWIDTH_HZ),
            Self::Am => Some(AM_BANDWIDTH_HZ),
            Self::Real | Self::Imag => None,
        }
    }

    /// Whether the output stage starts with de-emphasis.
    pub fn uses_deemphasis(&self) -> bool {
        matches!(self, Self::Wfm)
    }
}

impl fmt::Display for DemodMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown demodulation mode '{0}' (expected fm, nfm, wfm, am, real or imag)")]
pub struct UnknownMode(pub String);

impl FromStr for DemodMode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str() == lower)
            .ok_or_else(|| UnknownMode(s.to_string()))
    }
}

/// Stateless IQ → real demodulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Demodulator {
    /// Quadrature discriminator over sample pairs, resampled to full length.
    Fm,
    /// Envelope: magnitude of IQ.
    Am,
    /// In-phase projection.
    Real,
    /// Quadrature projection.
    Imag,
}

impl Demodulator {
    pub fn demodulate(&self, samples: &[Complex64]) -> Vec<f64> {
        match self {
            Self::Fm => demod_fm(samples),
            Self::Am => demod_am(samples),
            Self::Real => samples.iter().map(|s| s.re).collect(),
            Self::Imag => samples.iter().map(|s| s.im).collect(),
        }
    }
}
