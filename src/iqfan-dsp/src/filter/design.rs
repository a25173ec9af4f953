// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Digital IIR design: elliptic low-pass as second-order sections, plus the
//! broadcast FM de-emphasis stage.

use std::f64::consts::PI;

use num_complex::Complex64;

use super::ellip::{ellipap, Zpk};
use super::Sos;

/// 75 µs de-emphasis time constant.
pub const DEEMPHASIS_TAU_S: f64 = 75e-6;

const REAL_TOL: f64 = 100.0 * f64::EPSILON;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DesignError {
    #[error("filter order must be at least 1")]
    ZeroOrder,
    #[error("ripple {rp} dB / attenuation {rs} dB must be positive with rs > rp")]
    InvalidRipple { rp: f64, rs: f64 },
    #[error("cutoff {cutoff_hz} Hz must lie strictly between 0 and Nyquist {nyquist_hz} Hz")]
    InvalidCutoff { cutoff_hz: f64, nyquist_hz: f64 },
}

/// Elliptic low-pass at `cutoff_hz` for a stream sampled at `sample_rate`.
///
/// The overall gain is folded into the first section. Sections are ordered
/// so the poles closest to the unit circle run last.
pub fn ellip_lowpass(
    order: usize,
    rp: f64,
    rs: f64,
    cutoff_hz: f64,
    sample_rate: f64,
) -> Result<Vec<Sos>, DesignError> {
    if order == 0 {
        return Err(DesignError::ZeroOrder);
    }
    if !(rp > 0.0 && rs > rp) {
        return Err(DesignError::InvalidRipple { rp, rs });
    }
    let nyquist_hz = sample_rate / 2.0;
    let wn = cutoff_hz / nyquist_hz;
    if !(wn > 0.0 && wn < 1.0) {
        return Err(DesignError::InvalidCutoff {
            cutoff_hz,
            nyquist_hz,
        });
    }

    let proto = ellipap(order, rp, rs);
    // Pre-warp for the bilinear transform at a normalised rate of 2.
    let warped = 4.0 * (PI * wn / 2.0).tan();
    let analog = lp2lp(proto, warped);
    let digital = bilinear(analog, 2.0);
    Ok(zpk2sos(digital))
}

/// Single-pole de-emphasis low-pass with time constant `tau_s`.
pub fn deemphasis(sample_rate: f64, tau_s: f64) -> Sos {
    let x = (-1.0 / (sample_rate * tau_s)).exp();
    Sos::new([1.0 - x, 0.0, 0.0], [1.0, -x, 0.0])
}

fn lp2lp(zpk: Zpk, wo: f64) -> Zpk {
    let degree = zpk.poles.len() as i32 - zpk.zeros.len() as i32;
    Zpk {
        zeros: zpk.zeros.iter().map(|z| *z * wo).collect(),
        poles: zpk.poles.iter().map(|p| *p * wo).collect(),
        gain: zpk.gain * wo.powi(degree),
    }
}

fn bilinear(zpk: Zpk, fs: f64) -> Zpk {
    let degree = zpk.poles.len().saturating_sub(zpk.zeros.len());
    let fs2 = Complex64::new(2.0 * fs, 0.0);

    let num: Complex64 = zpk.zeros.iter().map(|z| fs2 - *z).product();
    let den: Complex64 = zpk.poles.iter().map(|p| fs2 - *p).product();

    let mut zeros: Vec<Complex64> = zpk.zeros.iter().map(|z| (fs2 + *z) / (fs2 - *z)).collect();
    zeros.extend(std::iter::repeat(Complex64::new(-1.0, 0.0)).take(degree));

    Zpk {
        zeros,
        poles: zpk.poles.iter().map(|p| (fs2 + *p) / (fs2 - *p)).collect(),
        gain: zpk.gain * (num / den).re,
    }
}

fn is_real(c: Complex64) -> bool {
    c.im == 0.0
}

/// Keep one member of each conjugate pair (positive imaginary part), then
/// the real values with their imaginary part cleared.
fn cplxreal(values: &[Complex64]) -> Vec<Complex64> {
    let mut complex: Vec<Complex64> = Vec::new();
    let mut real: Vec<Complex64> = Vec::new();
    for &v in values {
        if v.im.abs() <= REAL_TOL * v.norm() {
            real.push(Complex64::new(v.re, 0.0));
        } else if v.im > 0.0 {
            complex.push(v);
        }
    }
    complex.sort_by(|a, b| a.re.total_cmp(&b.re));
    real.sort_by(|a, b| a.re.total_cmp(&b.re));
    complex.extend(real);
    complex
}

fn argmin_by(values: &[Complex64], key: impl Fn(Complex64) -> f64) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .min_by(|a, b| key(*a.1).total_cmp(&key(*b.1)))
        .map(|(idx, _)| idx)
}

/// Index of the element of `from` nearest `to`, restricted to real (or
/// complex) elements.
fn nearest(from: &[Complex64], to: Complex64, want_real: bool) -> Option<usize> {
    from.iter()
        .enumerate()
        .filter(|(_, v)| is_real(**v) == want_real)
        .min_by(|a, b| (*a.1 - to).norm().total_cmp(&(*b.1 - to).norm()))
        .map(|(idx, _)| idx)
}

fn take(values: &mut Vec<Complex64>, idx: Option<usize>) -> Complex64 {
    match idx {
        Some(idx) if idx < values.len() => values.remove(idx),
        _ => Complex64::new(0.0, 0.0),
    }
}

fn poly2(r1: Complex64, r2: Complex64, k: f64) -> [f64; 3] {
    [k, -k * (r1 + r2).re, k * (r1 * r2).re]
}

/// Pair poles and zeros into biquads, nearest-first.
fn zpk2sos(zpk: Zpk) -> Vec<Sos> {
    let Zpk {
        mut zeros,
        mut poles,
        gain,
    } = zpk;

    let n_sections = (poles.len().max(zeros.len()) + 1) / 2;
    if n_sections == 0 {
        return vec![Sos::new([gain, 0.0, 0.0], [1.0, 0.0, 0.0])];
    }
    if poles.len() % 2 == 1 {
        poles.push(Complex64::new(0.0, 0.0));
        zeros.push(Complex64::new(0.0, 0.0));
    }
    while zeros.len() < poles.len() {
        zeros.push(Complex64::new(0.0, 0.0));
    }
    while poles.len() < zeros.len() {
        poles.push(Complex64::new(0.0, 0.0));
    }

    let mut z = cplxreal(&zeros);
    let mut p = cplxreal(&poles);

    let mut pairs: Vec<([Complex64; 2], [Complex64; 2])> = Vec::with_capacity(n_sections);
    for _ in 0..n_sections {
        let p1_idx = argmin_by(&p, |v| (1.0 - v.norm()).abs());
        let p1 = take(&mut p, p1_idx);

        let (p2, z1, z2);
        if is_real(p1) && !p.iter().any(|v| is_real(*v)) {
            // First-order section.
            let z1_idx = nearest(&z, p1, true);
            z1 = take(&mut z, z1_idx);
            p2 = Complex64::new(0.0, 0.0);
            z2 = Complex64::new(0.0, 0.0);
        } else {
            let z1_idx = if !is_real(p1) && z.iter().filter(|v| is_real(**v)).count() == 1 {
                nearest(&z, p1, false)
            } else {
                argmin_by(&z, |v| (p1 - v).norm())
            };
            z1 = take(&mut z, z1_idx);

            if !is_real(p1) {
                p2 = p1.conj();
                z2 = if !is_real(z1) {
                    z1.conj()
                } else {
                    let z2_idx = nearest(&z, p1, true);
                    take(&mut z, z2_idx)
                };
            } else if !is_real(z1) {
                z2 = z1.conj();
                let p2_idx = nearest(&p, z1, true);
                p2 = take(&mut p, p2_idx);
            } else {
                let p2_idx = p
                    .iter()
                    .enumerate()
                    .filter(|(_, v)| is_real(**v))
                    .min_by(|a, b| (a.1.norm() - 1.0).abs().total_cmp(&(b.1.norm() - 1.0).abs()))
                    .map(|(idx, _)| idx);
                p2 = take(&mut p, p2_idx);
                let z2_idx = nearest(&z, p2, true);
                z2 = take(&mut z, z2_idx);
            }
        }
        pairs.push(([p1, p2], [z1, z2]));
    }

    pairs.reverse();
    pairs
        .iter()
        .enumerate()
        .map(|(idx, (ps, zs))| {
            let k = if idx == 0 { gain } else { 1.0 };
            Sos::new(poly2(zs[0], zs[1], k), poly2(ps[0], ps[1], 1.0))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::super::FilterChain;
    use super::*;

    fn magnitude(sos: &[Sos], freq_hz: f64, fs: f64) -> f64 {
        let omega = 2.0 * PI * freq_hz / fs;
        sos.iter()
            .fold(Complex64::new(1.0, 0.0), |acc, s| acc * s.response(omega))
            .norm()
    }

    #[test]
    fn rejects_bad_parameters() {
        assert_eq!(
            ellip_lowpass(0, 1.0, 30.0, 1000.0, 48_000.0),
            Err(DesignError::ZeroOrder)
        );
        assert!(matches!(
            ellip_lowpass(8, 1.0, 30.0, 24_000.0, 48_000.0),
            Err(DesignError::InvalidCutoff { .. })
        ));
        assert!(matches!(
            ellip_lowpass(8, 1.0, 30.0, 0.0, 48_000.0),
            Err(DesignError::InvalidCutoff { .. })
        ));
        assert!(matches!(
            ellip_lowpass(8, 30.0, 1.0, 1000.0, 48_000.0),
            Err(DesignError::InvalidRipple { .. })
        ));
    }

    #[test]
    fn eighth_order_lowpass_shape() {
        let fs = 48_000.0;
        let sos = ellip_lowpass(8, 1.0, 30.0, 5000.0, fs).unwrap();
        assert_eq!(sos.len(), 4);

        let floor = 10f64.powf(-1.0 / 20.0);
        let dc = magnitude(&sos, 0.0, fs);
        assert!((dc - floor).abs() < 1e-6, "dc gain {}", dc);

        for i in 0..=20 {
            let f = 5000.0 * i as f64 / 20.0;
            let mag = magnitude(&sos, f, fs);
            assert!(mag >= floor - 1e-6 && mag <= 1.0 + 1e-6, "{} Hz -> {}", f, mag);
        }

        let stop = 10f64.powf(-30.0 / 20.0);
        for &f in &[7500.0, 10_000.0, 20_000.0, 23_999.0] {
            let mag = magnitude(&sos, f, fs);
            assert!(mag <= stop + 1e-5, "{} Hz -> {}", f, mag);
        }
        assert!(magnitude(&sos, 24_000.0, fs) <= 0.035);
    }

    #[test]
    fn sections_are_stable() {
        for &(cutoff, fs) in &[(5000.0, 48_000.0), (12_500.0, 250_000.0), (100.0, 8000.0)] {
            let sos = ellip_lowpass(8, 1.0, 30.0, cutoff, fs).unwrap();
            for s in &sos {
                assert!(s.a[2].abs() < 1.0, "a2 {}", s.a[2]);
                assert!(s.a[1].abs() < 1.0 + s.a[2], "a1 {}", s.a[1]);
            }
        }
    }

    #[test]
    fn last_section_holds_poles_nearest_unit_circle() {
        let sos = ellip_lowpass(8, 1.0, 30.0, 5000.0, 48_000.0).unwrap();
        // |p|^2 = a2 for a conjugate pair.
        let radii: Vec<f64> = sos.iter().map(|s| s.a[2].sqrt()).collect();
        for pair in radii.windows(2) {
            assert!(pair[0] <= pair[1] + 1e-12, "{:?}", radii);
        }
    }

    #[test]
    fn odd_order_lowpass() {
        let sos = ellip_lowpass(3, 1.0, 30.0, 2000.0, 16_000.0).unwrap();
        assert_eq!(sos.len(), 2);
        let dc = magnitude(&sos, 0.0, 16_000.0);
        assert!((dc - 1.0).abs() < 1e-6, "dc gain {}", dc);
    }

    #[test]
    fn filtered_dc_settles_to_passband_gain() {
        let sos = ellip_lowpass(8, 1.0, 30.0, 5000.0, 48_000.0).unwrap();
        let mut chain = FilterChain::<f64>::new(&sos);
        let mut block = vec![1.0; 4000];
        chain.process(&mut block);
        let last = block[block.len() - 1];
        assert!((last - 10f64.powf(-1.0 / 20.0)).abs() < 1e-4, "{}", last);
    }

    #[test]
    fn deemphasis_coefficients() {
        let fs = 48_000.0;
        let sos = deemphasis(fs, DEEMPHASIS_TAU_S);
        let x = (-1.0 / (fs * DEEMPHASIS_TAU_S)).exp();
        assert!((sos.b[0] - (1.0 - x)).abs() < 1e-15);
        assert_eq!(sos.b[1], 0.0);
        assert!((sos.a[1] + x).abs() < 1e-15);
        // Unity gain at DC.
        assert!((sos.response(0.0).norm() - 1.0).abs() < 1e-12);
    }
}
