// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use num_complex::Complex64;

/// AM envelope detector: magnitude of IQ.
pub(super) fn demod_am(samples: &[Complex64]) -> Vec<f64> {
    samples.iter().map(|sample| sample.norm()).collect()
}

#[cfg(test)]
mod tests {
    use super::demod_am;
    use num_complex::Complex64;

    #[test]
    fn magnitude_per_sample() {
        let input = vec![
            Complex64::new(0.0, 0.0),
            Complex64::new(3.0, -4.0),
            Complex64::new(-1.0, 0.0),
            Complex64::new(0.0, 2.5),
        ];
        let expected = [0.0, 5.0, 1.0, 2.5];
        let out = demod_am(&input);
        assert_eq!(out.len(), 4);
        for (idx, (&got, &exp)) in out.iter().zip(expected.iter()).enumerate() {
            assert!((got - exp).abs() <= 1e-12, "AM sample {idx}: {got} vs {exp}");
        }
    }
}
