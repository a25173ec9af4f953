// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

pub mod corrector;
pub mod demod;
pub mod filter;
pub mod iq;
pub mod shift;
pub mod unpack;

pub use corrector::{IqCorrector, DEFAULT_IMPEDANCE};
pub use demod::{DemodMode, Demodulator, UnknownMode};
pub use filter::{Decimator, DesignError, FilterChain, Sos};
pub use shift::{FrequencyShifter, PhaseMode};
pub use unpack::{Endian, FormatError, WordKind, WordType};
