// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::f64::consts::PI;
use std::sync::Arc;

use num_complex::Complex64;
use rustfft::{Fft, FftPlanner};

/// Hann-windowed sinc low-pass taps with unity DC gain.
///
/// `cutoff_norm` is in cycles/sample (0.0–0.5).
pub fn windowed_sinc_coeffs(cutoff_norm: f64, taps: usize) -> Vec<f64> {
    let taps = taps.max(1);
    let m = (taps - 1) as f64;
    let mut coeffs = Vec::with_capacity(taps);
    for i in 0..taps {
        let x = i as f64 - m / 2.0;
        let sinc = if x == 0.0 {
            2.0 * cutoff_norm
        } else {
            (2.0 * PI * cutoff_norm * x).sin() / (PI * x)
        };
        let window = if taps == 1 {
            1.0
        } else {
            0.5 * (1.0 - (2.0 * PI * i as f64 / m).cos())
        };
        coeffs.push(sinc * window);
    }
    let sum: f64 = coeffs.iter().sum();
    if sum.abs() > 1e-12 {
        let inv = 1.0 / sum;
        for coeff in &mut coeffs {
            *coeff *= inv;
        }
    }
    coeffs
}

/// FFT overlap-save FIR over complex samples.
pub struct BlockFir {
    h_freq: Vec<Complex64>,
    overlap: Vec<Complex64>,
    n_taps: usize,
    fft_size: usize,
    fft: Arc<dyn Fft<f64>>,
    ifft: Arc<dyn Fft<f64>>,
    scratch: Vec<Complex64>,
}

impl std::fmt::Debug for BlockFir {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockFir")
            .field("n_taps", &self.n_taps)
            .field("fft_size", &self.fft_size)
            .finish()
    }
}

impl BlockFir {
    /// `block_size` is the expected input length; longer inputs are split.
    pub fn new(coeffs: &[f64], block_size: usize) -> Self {
        let n_taps = coeffs.len().max(1);
        let fft_size = (block_size.max(1) + n_taps - 1).next_power_of_two();

        let mut planner = FftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(fft_size);
        let ifft = planner.plan_fft_inverse(fft_size);

        let mut h_freq: Vec<Complex64> = if coeffs.is_empty() {
            vec![Complex64::new(1.0, 0.0)]
        } else {
            coeffs.iter().map(|&c| Complex64::new(c, 0.0)).collect()
        };
        h_freq.resize(fft_size, Complex64::new(0.0, 0.0));
        fft.process(&mut h_freq);

        Self {
            h_freq,
            overlap: vec![Complex64::new(0.0, 0.0); n_taps - 1],
            n_taps,
            fft_size,
            fft,
            ifft,
            scratch: Vec::with_capacity(fft_size),
        }
    }

    pub fn n_taps(&self) -> usize {
        self.n_taps
    }

    /// Filter `input`, appending exactly `input.len()` samples to `output`.
    pub fn filter_into(&mut self, input: &[Complex64], output: &mut Vec<Complex64>) {
        let max_chunk = self.fft_size - (self.n_taps - 1);
        for chunk in input.chunks(max_chunk) {
            self.filter_chunk(chunk, output);
        }
    }

    fn filter_chunk(&mut self, input: &[Complex64], output: &mut Vec<Complex64>) {
        let n_new = input.len();
        let n_overlap = self.n_taps - 1;

        let buf = &mut self.scratch;
        buf.clear();
        buf.extend_from_slice(&self.overlap);
        buf.extend_from_slice(input);
        buf.resize(self.fft_size, Complex64::new(0.0, 0.0));

        self.fft.process(buf);
        let scale = 1.0 / self.fft_size as f64;
        for (x, h) in buf.iter_mut().zip(self.h_freq.iter()) {
            *x = *x * *h * scale;
        }
        self.ifft.process(buf);

        output.extend_from_slice(&buf[n_overlap..n_overlap + n_new]);

        if n_overlap > 0 {
            if n_new >= n_overlap {
                self.overlap.copy_from_slice(&input[n_new - n_overlap..]);
            } else {
                let keep_old = n_overlap - n_new;
                self.overlap.copy_within(n_new..n_overlap, 0);
                self.overlap[keep_old..].copy_from_slice(input);
            }
        }
    }
}

/// Anti-aliased integer decimator.
///
/// Low-passes at `0.5 / factor` cycles/sample with `20·factor + 1` taps and
/// keeps every `factor`-th filtered sample. The keep counter carries across
/// blocks so the output is independent of how the input is split.
#[derive(Debug)]
pub struct Decimator {
    factor: usize,
    fir: Option<BlockFir>,
    counter: usize,
    filtered: Vec<Complex64>,
}

impl Decimator {
    pub fn new(factor: usize, block_size: usize) -> Self {
        let factor = factor.max(1);
        let fir = (factor > 1).then(|| {
            let taps = 20 * factor + 1;
            BlockFir::new(&windowed_sinc_coeffs(0.5 / factor as f64, taps), block_size)
        });
        Self {
            factor,
            fir,
            counter: 0,
            filtered: Vec::with_capacity(block_size),
        }
    }

    pub fn factor(&self) -> usize {
        self.factor
    }

    pub fn process(&mut self, input: &[Complex64]) -> Vec<Complex64> {
        let Some(fir) = self.fir.as_mut() else {
            return input.to_vec();
        };
        self.filtered.clear();
        fir.filter_into(input, &mut self.filtered);

        let mut out = Vec::with_capacity(input.len() / self.factor + 1);
        for &sample in &self.filtered {
            if self.counter == 0 {
                out.push(sample);
            }
            self.counter += 1;
            if self.counter >= self.factor {
                self.counter = 0;
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_approx_eq(a: f64, b: f64, tol: f64, label: &str) {
        assert!(
            (a - b).abs() <= tol,
            "{}: expected {} ≈ {} (tol {})",
            label,
            a,
            b,
            tol
        );
    }

    fn direct_convolution(coeffs: &[f64], input: &[Complex64]) -> Vec<Complex64> {
        (0..input.len())
            .map(|n| {
                coeffs
                    .iter()
                    .enumerate()
                    .filter(|(k, _)| *k <= n)
                    .map(|(k, &c)| input[n - k] * c)
                    .sum::<Complex64>()
            })
            .collect()
    }

    #[test]
    fn coeffs_have_unity_dc_gain() {
        let coeffs = windowed_sinc_coeffs(0.1, 31);
        let sum: f64 = coeffs.iter().sum();
        assert_approx_eq(sum, 1.0, 1e-12, "coefficient sum");
    }

    #[test]
    fn block_fir_matches_direct_convolution() {
        let coeffs = windowed_sinc_coeffs(0.2, 9);
        let input: Vec<Complex64> = (0..40)
            .map(|i| Complex64::new((i % 5) as f64, -((i % 3) as f64)))
            .collect();
        let expected = direct_convolution(&coeffs, &input);

        // Small block size forces chunking and overlap carry.
        let mut fir = BlockFir::new(&coeffs, 4);
        let mut out = Vec::new();
        fir.filter_into(&input[..7], &mut out);
        fir.filter_into(&input[7..9], &mut out);
        fir.filter_into(&input[9..], &mut out);

        assert_eq!(out.len(), input.len());
        for (idx, (got, exp)) in out.iter().zip(expected.iter()).enumerate() {
            assert!((got - exp).norm() < 1e-9, "sample {}: {} vs {}", idx, got, exp);
        }
    }

    #[test]
    fn decimator_output_length() {
        let mut dec = Decimator::new(4, 256);
        let block = vec![Complex64::new(1.0, 0.0); 256];
        assert_eq!(dec.process(&block).len(), 64);
        assert_eq!(dec.process(&block[..6]).len(), 2);
        assert_eq!(dec.process(&block[..6]).len(), 1);
    }

    #[test]
    fn decimator_unity_factor_is_passthrough() {
        let mut dec = Decimator::new(1, 16);
        let block: Vec<Complex64> = (0..16).map(|i| Complex64::new(i as f64, 0.0)).collect();
        assert_eq!(dec.process(&block), block);
    }

    #[test]
    fn decimator_passes_dc() {
        let mut dec = Decimator::new(2, 512);
        let block = vec![Complex64::new(0.5, -0.5); 512];
        let out = dec.process(&block);
        let last = out[out.len() - 1];
        assert_approx_eq(last.re, 0.5, 1e-6, "re");
        assert_approx_eq(last.im, -0.5, 1e-6, "im");
    }

    #[test]
    fn decimator_rejects_out_of_band_tone() {
        let fs = 48_000.0;
        let mut dec = Decimator::new(4, 4096);
        let block: Vec<Complex64> = (0..4096)
            .map(|n| Complex64::from_polar(1.0, 2.0 * PI * 15_000.0 / fs * n as f64))
            .collect();
        let out = dec.process(&block);
        let tail = &out[out.len() / 2..];
        let peak = tail.iter().map(|s| s.norm()).fold(0.0, f64::max);
        assert!(peak < 0.05, "alias leaked through: {}", peak);
    }
}
