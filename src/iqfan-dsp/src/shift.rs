// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::f64::consts::TAU;

use num_complex::Complex64;

/// How the oscillator phase behaves between consecutive blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PhaseMode {
    /// Every block starts at phase zero.
    #[default]
    Reset,
    /// Phase carries over from the end of the previous block.
    Continuous,
}

/// Complex mixer translating `freq_hz` down to baseband.
#[derive(Debug, Clone)]
pub struct FrequencyShifter {
    freq_hz: f64,
    sample_rate: f64,
    mode: PhaseMode,
    phase: f64,
}

impl FrequencyShifter {
    pub fn new(freq_hz: f64, sample_rate: f64, mode: PhaseMode) -> Self {
        Self {
            freq_hz,
            sample_rate,
            mode,
            phase: 0.0,
        }
    }

    pub fn freq_hz(&self) -> f64 {
        self.freq_hz
    }

    pub fn mode(&self) -> PhaseMode {
        self.mode
    }

    pub fn is_noop(&self) -> bool {
        self.freq_hz == 0.0 || self.sample_rate == 0.0
    }

    pub fn process(&mut self, block: &mut [Complex64]) {
        if self.is_noop() || block.is_empty() {
            return;
        }
        let start = match self.mode {
            PhaseMode::Reset => 0.0,
            PhaseMode::Continuous => self.phase,
        };
        let inc = TAU * self.freq_hz / self.sample_rate;
        mix(block, start, inc);
        self.phase = (start + block.len() as f64 * inc).rem_euclid(TAU);
    }
}

fn mix(block: &mut [Complex64], start: f64, inc: f64) {
    for (idx, sample) in block.iter_mut().enumerate() {
        let phase = start + idx as f64 * inc;
        *sample *= Complex64::from_polar(1.0, -phase);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(freq: f64, fs: f64, len: usize) -> Vec<Complex64> {
        (0..len)
            .map(|n| Complex64::from_polar(1.0, TAU * freq / fs * n as f64))
            .collect()
    }

    #[test]
    fn zero_frequency_is_identity() {
        let original = tone(1234.0, 48_000.0, 32);
        let mut block = original.clone();
        FrequencyShifter::new(0.0, 48_000.0, PhaseMode::Reset).process(&mut block);
        assert_eq!(block, original);
    }

    #[test]
    fn zero_sample_rate_is_identity() {
        let original = tone(1234.0, 48_000.0, 32);
        let mut block = original.clone();
        FrequencyShifter::new(1000.0, 0.0, PhaseMode::Reset).process(&mut block);
        assert_eq!(block, original);

        let mut shifter = FrequencyShifter::new(1000.0, 0.0, PhaseMode::Continuous);
        shifter.process(&mut block);
        assert_eq!(block, original);
    }

    #[test]
    fn empty_block_is_accepted() {
        let mut block: Vec<Complex64> = Vec::new();
        FrequencyShifter::new(1000.0, 48_000.0, PhaseMode::Continuous).process(&mut block);
        assert!(block.is_empty());
    }

    #[test]
    fn tone_is_moved_to_dc() {
        let mut block = tone(6000.0, 48_000.0, 64);
        FrequencyShifter::new(6000.0, 48_000.0, PhaseMode::Reset).process(&mut block);
        for sample in &block {
            assert!((sample - Complex64::new(1.0, 0.0)).norm() < 1e-9);
        }
    }

    #[test]
    fn reset_mode_restarts_phase_each_block() {
        let mut shifter = FrequencyShifter::new(1000.0, 8000.0, PhaseMode::Reset);
        let mut a = vec![Complex64::new(1.0, 0.0); 5];
        let mut b = a.clone();
        shifter.process(&mut a);
        shifter.process(&mut b);
        assert_eq!(a, b);
    }

    #[test]
    fn continuous_mode_matches_one_long_block() {
        let fs = 8000.0;
        let input = tone(3000.0, fs, 40);

        let mut whole = input.clone();
        FrequencyShifter::new(1000.0, fs, PhaseMode::Continuous).process(&mut whole);

        let mut shifter = FrequencyShifter::new(1000.0, fs, PhaseMode::Continuous);
        let mut split = input.clone();
        let (head, tail) = split.split_at_mut(13);
        shifter.process(head);
        shifter.process(tail);

        for (x, y) in whole.iter().zip(split.iter()) {
            assert!((x - y).norm() < 1e-9);
        }
    }
}
