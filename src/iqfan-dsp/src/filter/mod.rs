// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Filters: second-order-section cascades, their design, and the FIR
//! decimator.

pub mod design;
mod ellip;
mod fir;

use std::ops::{Add, Mul, Sub};

use num_complex::Complex64;

pub use design::{deemphasis, ellip_lowpass, DesignError, DEEMPHASIS_TAU_S};
pub use fir::{windowed_sinc_coeffs, BlockFir, Decimator};

/// Values a real-coefficient filter can run over.
pub trait FilterSample:
    Copy + Default + Add<Output = Self> + Sub<Output = Self> + Mul<f64, Output = Self>
{
}

impl FilterSample for f64 {}
impl FilterSample for Complex64 {}

/// One biquad stage, `a0` normalised to 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sos {
    pub b: [f64; 3],
    pub a: [f64; 3],
}

impl Sos {
    pub fn new(b: [f64; 3], a: [f64; 3]) -> Self {
        let a0 = if a[0] == 0.0 { 1.0 } else { a[0] };
        Self {
            b: [b[0] / a0, b[1] / a0, b[2] / a0],
            a: [1.0, a[1] / a0, a[2] / a0],
        }
    }

    /// Complex response of the stage at `omega` radians/sample.
    pub fn response(&self, omega: f64) -> Complex64 {
        let z1 = Complex64::from_polar(1.0, -omega);
        let z2 = z1 * z1;
        let num = z1 * self.b[1] + z2 * self.b[2] + self.b[0];
        let den = z1 * self.a[1] + z2 * self.a[2] + self.a[0];
        num / den
    }
}

#[derive(Debug, Clone)]
struct Section<T> {
    sos: Sos,
    z1: T,
    z2: T,
}

/// Cascade of biquads with per-stage delay lines.
///
/// State persists across calls and is only cleared by [`FilterChain::reset`].
#[derive(Debug, Clone)]
pub struct FilterChain<T: FilterSample> {
    sections: Vec<Section<T>>,
}

impl<T: FilterSample> FilterChain<T> {
    pub fn new(sos: &[Sos]) -> Self {
        Self {
            sections: sos
                .iter()
                .map(|&sos| Section {
                    sos,
                    z1: T::default(),
                    z2: T::default(),
                })
                .collect(),
        }
    }

    /// A chain with no stages; `process` leaves input untouched.
    pub fn passthrough() -> Self {
        Self {
            sections: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn reset(&mut self) {
        for section in &mut self.sections {
            section.z1 = T::default();
            section.z2 = T::default();
        }
    }

    /// Filter `block` in place (transposed direct form II, stage by stage).
    pub fn process(&mut self, block: &mut [T]) {
        for section in &mut self.sections {
            let [b0, b1, b2] = section.sos.b;
            let [_, a1, a2] = section.sos.a;
            let mut z1 = section.z1;
            let mut z2 = section.z2;
            for x in block.iter_mut() {
                let input = *x;
                let y = input * b0 + z1;
                z1 = input * b1 - y * a1 + z2;
                z2 = input * b2 - y * a2;
                *x = y;
            }
            section.z1 = z1;
            section.z2 = z2;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_leaves_block_untouched() {
        let mut chain = FilterChain::<f64>::passthrough();
        let mut block = vec![1.0, -2.0, 3.0];
        chain.process(&mut block);
        assert_eq!(block, vec![1.0, -2.0, 3.0]);
        assert!(chain.is_empty());
    }

    #[test]
    fn sos_normalises_a0() {
        let sos = Sos::new([2.0, 4.0, 6.0], [2.0, 1.0, 0.5]);
        assert_eq!(sos.b, [1.0, 2.0, 3.0]);
        assert_eq!(sos.a, [1.0, 0.5, 0.25]);
    }

    #[test]
    fn single_pole_impulse_response() {
        // y[n] = x[n] + 0.5 y[n-1]
        let mut chain = FilterChain::<f64>::new(&[Sos::new([1.0, 0.0, 0.0], [1.0, -0.5, 0.0])]);
        let mut block = vec![1.0, 0.0, 0.0, 0.0];
        chain.process(&mut block);
        assert_eq!(block, vec![1.0, 0.5, 0.25, 0.125]);
    }

    #[test]
    fn state_carries_across_calls() {
        let sos = [
            Sos::new([0.2, 0.4, 0.2], [1.0, -0.3, 0.1]),
            Sos::new([1.0, -1.0, 0.0], [1.0, -0.9, 0.0]),
        ];
        let input: Vec<f64> = (0..50).map(|i| ((i * 7) % 11) as f64 - 5.0).collect();

        let mut whole = FilterChain::<f64>::new(&sos);
        let mut a = input.clone();
        whole.process(&mut a);

        let mut split = FilterChain::<f64>::new(&sos);
        let mut b = input.clone();
        let (head, tail) = b.split_at_mut(17);
        split.process(head);
        split.process(tail);

        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < 1e-12);
        }
    }

    #[test]
    fn complex_samples_filter_each_component() {
        let sos = [Sos::new([0.5, 0.5, 0.0], [1.0, 0.0, 0.0])];
        let mut chain = FilterChain::<Complex64>::new(&sos);
        let mut block = vec![Complex64::new(2.0, -4.0), Complex64::new(0.0, 0.0)];
        chain.process(&mut block);
        assert_eq!(block[0], Complex64::new(1.0, -2.0));
        assert_eq!(block[1], Complex64::new(1.0, -2.0));
    }

    #[test]
    fn reset_clears_delay_lines() {
        let sos = [Sos::new([1.0, 0.0, 0.0], [1.0, -0.5, 0.0])];
        let mut chain = FilterChain::<f64>::new(&sos);
        let mut block = vec![1.0, 1.0];
        chain.process(&mut block);
        chain.reset();
        let mut again = vec![1.0, 1.0];
        chain.process(&mut again);
        assert_eq!(again, vec![1.0, 1.5]);
    }
}
