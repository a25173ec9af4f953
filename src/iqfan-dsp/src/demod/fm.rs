// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use num_complex::Complex64;

use super::resample::resample;

/// Quadrature FM discriminator over sample pairs.
///
/// Each even sample is multiplied by the conjugate of its odd neighbour and
/// the angle taken; the half-length phase sequence is then resampled back to
/// the input length.
pub(super) fn demod_fm(samples: &[Complex64]) -> Vec<f64> {
    let n = samples.len();
    if n < 2 {
        return vec![0.0; n];
    }
    let phase: Vec<f64> = samples
        .chunks_exact(2)
        .map(|pair| (pair[0] * pair[1].conj()).arg())
        .collect();
    resample(&phase, n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::TAU;

    fn complex_tone(freq_norm: f64, len: usize) -> Vec<Complex64> {
        (0..len)
            .map(|n| Complex64::from_polar(1.0, TAU * freq_norm * n as f64))
            .collect()
    }

    #[test]
    fn output_length_matches_input() {
        for len in [2usize, 3, 64, 1000] {
            assert_eq!(demod_fm(&complex_tone(0.01, len)).len(), len);
        }
        assert!(demod_fm(&[]).is_empty());
        assert_eq!(demod_fm(&[Complex64::new(1.0, 0.0)]), vec![0.0]);
    }

    #[test]
    fn constant_tone_gives_constant_phase_step() {
        let f = 0.05;
        let out = demod_fm(&complex_tone(f, 256));
        for (idx, &v) in out.iter().enumerate() {
            assert!((v + TAU * f).abs() < 1e-9, "sample {idx}: {v}");
        }
    }

    #[test]
    fn even_outputs_are_pair_phases() {
        let input: Vec<Complex64> = (0..128)
            .map(|n| {
                let t = n as f64;
                Complex64::from_polar(1.0, 0.3 * (t * 0.07).sin() * t)
            })
            .collect();
        let expected: Vec<f64> = input
            .chunks_exact(2)
            .map(|p| {
                let z = p[0] * p[1].conj();
                z.im.atan2(z.re)
            })
            .collect();
        let out = demod_fm(&input);
        for (k, &phase) in expected.iter().enumerate() {
            assert!((out[2 * k] - phase).abs() < 1e-9, "pair {k}");
        }
    }
}
