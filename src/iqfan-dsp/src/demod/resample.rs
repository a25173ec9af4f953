// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::cell::RefCell;

use num_complex::Complex64;
use rustfft::FftPlanner;

thread_local! {
    static PLANNER: RefCell<FftPlanner<f64>> = RefCell::new(FftPlanner::new());
}

/// Fourier-method resampling of a real sequence to `num` samples.
///
/// The spectrum is truncated or zero-padded; an even-length Nyquist bin is
/// split across both halves when upsampling and folded when downsampling.
/// The result is scaled so amplitudes are preserved.
pub fn resample(x: &[f64], num: usize) -> Vec<f64> {
    let nx = x.len();
    if num == 0 {
        return Vec::new();
    }
    if nx == 0 {
        return vec![0.0; num];
    }
    if nx == num {
        return x.to_vec();
    }

    PLANNER.with(|planner| {
        let mut planner = planner.borrow_mut();

        let mut spectrum: Vec<Complex64> = x.iter().map(|&v| Complex64::new(v, 0.0)).collect();
        planner.plan_fft_forward(nx).process(&mut spectrum);

        // Half spectrum of the output, bins 0..=num/2.
        let half = num / 2 + 1;
        let n = num.min(nx);
        let keep = (n / 2 + 1).min(half);
        let mut y_half = vec![Complex64::new(0.0, 0.0); half];
        y_half[..keep].copy_from_slice(&spectrum[..keep]);
        if n % 2 == 0 && n / 2 < half {
            if num < nx {
                y_half[n / 2] *= 2.0;
            } else {
                y_half[n / 2] *= 0.5;
            }
        }

        // Hermitian extension, then a real inverse transform.
        let mut full = vec![Complex64::new(0.0, 0.0); num];
        for (k, bin) in full.iter_mut().enumerate() {
            *bin = if k < half {
                y_half[k]
            } else {
                y_half[num - k].conj()
            };
        }
        planner.plan_fft_inverse(num).process(&mut full);

        let scale = 1.0 / nx as f64;
        full.iter().map(|c| c.re * scale).collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_has_requested_length() {
        let x: Vec<f64> = (0..10).map(|i| i as f64).collect();
        assert_eq!(resample(&x, 20).len(), 20);
        assert_eq!(resample(&x, 7).len(), 7);
        assert!(resample(&x, 0).is_empty());
        assert_eq!(resample(&[], 4), vec![0.0; 4]);
    }

    #[test]
    fn constant_stays_constant() {
        let out = resample(&[0.25; 16], 32);
        for v in out {
            assert!((v - 0.25).abs() < 1e-12);
        }
    }

    #[test]
    fn doubling_preserves_original_points() {
        for len in [8usize, 9] {
            let x: Vec<f64> = (0..len).map(|i| ((i * 37) % 11) as f64 - 5.0).collect();
            let y = resample(&x, 2 * len);
            for (k, &orig) in x.iter().enumerate() {
                assert!((y[2 * k] - orig).abs() < 1e-9, "len {} k {}", len, k);
            }
        }
    }

    #[test]
    fn bandlimited_tone_roundtrips_through_downsampling() {
        let n = 64;
        let x: Vec<f64> = (0..n)
            .map(|i| (2.0 * std::f64::consts::PI * 3.0 * i as f64 / n as f64).cos())
            .collect();
        let down = resample(&x, 32);
        for (k, v) in down.iter().enumerate() {
            let expected = (2.0 * std::f64::consts::PI * 3.0 * k as f64 / 32.0).cos();
            assert!((v - expected).abs() < 1e-9, "k {}", k);
        }
    }
}
