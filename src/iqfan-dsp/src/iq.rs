// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use num_complex::Complex64;

/// Pair interleaved `[re0, im0, re1, im1, ...]` values into complex samples.
///
/// An odd trailing value has no partner and is dropped.
pub fn assemble(flat: &[f64]) -> Vec<Complex64> {
    let mut out = Vec::with_capacity(flat.len() / 2);
    assemble_into(flat, &mut out);
    out
}

pub fn assemble_into(flat: &[f64], out: &mut Vec<Complex64>) {
    out.clear();
    out.extend(
        flat.chunks_exact(2)
            .map(|pair| Complex64::new(pair[0], pair[1])),
    );
}

/// Scale every sample to unit magnitude.
///
/// Zero-magnitude samples have no direction and are left as they are.
pub fn normalize(block: &mut [Complex64]) {
    for sample in block.iter_mut() {
        let mag = sample.norm();
        if mag > 0.0 {
            *sample /= mag;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assemble_selects_by_stride_two() {
        let flat = [0.0, 0.0, 1.0, 2.0, 2.0, 3.0, 3.0, 4.0];
        let iq = assemble(&flat);
        assert_eq!(
            iq,
            vec![
                Complex64::new(0.0, 0.0),
                Complex64::new(1.0, 2.0),
                Complex64::new(2.0, 3.0),
                Complex64::new(3.0, 4.0),
            ]
        );
    }

    #[test]
    fn assemble_drops_odd_trailing_value() {
        let iq = assemble(&[1.0, 2.0, 3.0]);
        assert_eq!(iq, vec![Complex64::new(1.0, 2.0)]);
        assert!(assemble(&[5.0]).is_empty());
    }

    #[test]
    fn normalize_yields_unit_magnitude() {
        let mut block = vec![Complex64::new(3.0, 4.0), Complex64::new(-2.0, 0.0)];
        normalize(&mut block);
        assert!((block[0] - Complex64::new(0.6, 0.8)).norm() < 1e-12);
        assert!((block[1] - Complex64::new(-1.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn normalize_leaves_zero_samples_unmodified() {
        let mut block = vec![
            Complex64::new(0.0, 0.0),
            Complex64::new(0.0, 2.0),
            Complex64::new(0.0, 0.0),
        ];
        normalize(&mut block);
        assert_eq!(block[0], Complex64::new(0.0, 0.0));
        assert_eq!(block[1], Complex64::new(0.0, 1.0));
        assert_eq!(block[2], Complex64::new(0.0, 0.0));
    }
}
