// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Adaptive DC / IQ-imbalance correction.
//!
//! A single-pole running estimator: each corrected sample is fed back into
//! the offset accumulator scaled by `inductance = impedance / sample_rate`.
//! The accumulator is neither normalised nor bounded; `impedance` alone sets
//! how fast it converges.

use num_complex::Complex64;

pub const DEFAULT_IMPEDANCE: f64 = 100.0;

#[derive(Debug, Clone)]
pub struct IqCorrector {
    sample_rate: f64,
    impedance: f64,
    inductance: f64,
    offset: Complex64,
}

impl IqCorrector {
    pub fn new(sample_rate: f64, impedance: f64) -> Self {
        Self {
            sample_rate,
            impedance,
            inductance: inductance(impedance, sample_rate),
            offset: Complex64::new(0.0, 0.0),
        }
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn impedance(&self) -> f64 {
        self.impedance
    }

    pub fn inductance(&self) -> f64 {
        self.inductance
    }

    /// Current offset estimate.
    pub fn offset(&self) -> Complex64 {
        self.offset
    }

    /// Keeps the impedance, recomputes the inductance and clears the offset.
    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
        self.inductance = inductance(self.impedance, sample_rate);
        self.offset = Complex64::new(0.0, 0.0);
    }

    /// Recomputes the inductance and clears the offset.
    pub fn set_impedance(&mut self, impedance: f64) {
        self.impedance = impedance;
        self.inductance = inductance(impedance, self.sample_rate);
        self.offset = Complex64::new(0.0, 0.0);
    }

    /// Correct `block` in place, strictly in sample order.
    pub fn apply(&mut self, block: &mut [Complex64]) {
        let k = self.inductance;
        let mut offset = self.offset;
        for sample in block.iter_mut() {
            let corrected = *sample - offset;
            offset += corrected * k;
            *sample = corrected;
        }
        self.offset = offset;
    }
}

fn inductance(impedance: f64, sample_rate: f64) -> f64 {
    if sample_rate > 0.0 {
        impedance / sample_rate
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(re: f64, im: f64) -> Complex64 {
        Complex64::new(re, im)
    }

    #[test]
    fn offset_follows_the_recurrence() {
        let mut corrector = IqCorrector::new(1000.0, 100.0);
        let k = corrector.inductance();
        assert!((k - 0.1).abs() < 1e-15);

        let input = vec![c(1.0, 0.5), c(2.0, -1.0), c(-0.5, 0.25), c(0.0, 3.0)];
        let mut block = input.clone();
        corrector.apply(&mut block);

        let mut offset = c(0.0, 0.0);
        for (s, out) in input.iter().zip(block.iter()) {
            let expected = *s - offset;
            assert!((expected - *out).norm() < 1e-12);
            offset += expected * k;
        }
        assert!((corrector.offset() - offset).norm() < 1e-12);
    }

    #[test]
    fn state_carries_across_blocks() {
        let input: Vec<Complex64> = (0..64).map(|i| c(1.0 + i as f64 * 0.01, -2.0)).collect();

        let mut whole = IqCorrector::new(48_000.0, 500.0);
        let mut a = input.clone();
        whole.apply(&mut a);

        let mut split = IqCorrector::new(48_000.0, 500.0);
        let mut b = input.clone();
        let (head, tail) = b.split_at_mut(20);
        split.apply(head);
        split.apply(tail);

        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).norm() < 1e-12);
        }
    }

    #[test]
    fn applying_twice_differs_from_once() {
        let input = vec![c(1.0, 1.0); 16];
        let mut corrector = IqCorrector::new(100.0, 10.0);
        let mut once = input.clone();
        corrector.apply(&mut once);
        let mut twice = input.clone();
        corrector.apply(&mut twice);
        assert!((once[0] - twice[0]).norm() > 1e-6);
    }

    #[test]
    fn converges_towards_constant_dc() {
        let mut corrector = IqCorrector::new(1000.0, 50.0);
        let mut block = vec![c(3.0, -4.0); 2000];
        corrector.apply(&mut block);
        let last = block[block.len() - 1];
        assert!(last.norm() < 1e-6, "residual DC: {:?}", last);
        assert!((corrector.offset() - c(3.0, -4.0)).norm() < 1e-6);
    }

    #[test]
    fn rate_and_impedance_changes_reset_offset() {
        let mut corrector = IqCorrector::new(1000.0, 100.0);
        let mut block = vec![c(1.0, 1.0); 8];
        corrector.apply(&mut block);
        assert!(corrector.offset().norm() > 0.0);

        corrector.set_sample_rate(2000.0);
        assert_eq!(corrector.offset(), c(0.0, 0.0));
        assert_eq!(corrector.impedance(), 100.0);
        assert!((corrector.inductance() - 0.05).abs() < 1e-15);

        corrector.apply(&mut block);
        corrector.set_impedance(10.0);
        assert_eq!(corrector.offset(), c(0.0, 0.0));
        assert!((corrector.inductance() - 0.005).abs() < 1e-15);
    }
}
