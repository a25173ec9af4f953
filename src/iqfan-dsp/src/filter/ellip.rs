// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Jacobian elliptic functions and the analog elliptic (Cauer) prototype.

use std::f64::consts::{FRAC_PI_2, PI};

use num_complex::Complex64;

const MACHEP: f64 = 1.110_223_024_625_156_5e-16;
const EPSILON: f64 = 2e-16;
const DEGREE_TERMS: usize = 7;
const LANDEN_MAX_ITER: usize = 10;

/// Analog prototype in zero-pole-gain form, passband edge at 1 rad/s.
#[derive(Debug, Clone, Default)]
pub(crate) struct Zpk {
    pub zeros: Vec<Complex64>,
    pub poles: Vec<Complex64>,
    pub gain: f64,
}

fn agm(mut a: f64, mut b: f64) -> f64 {
    for _ in 0..64 {
        if (a - b).abs() <= 1e-15 * a {
            break;
        }
        let next = 0.5 * (a + b);
        b = (a * b).sqrt();
        a = next;
    }
    a
}

/// Complete elliptic integral of the first kind, parameter `m = k²`.
pub(crate) fn ellipk(m: f64) -> f64 {
    if m >= 1.0 {
        return f64::INFINITY;
    }
    FRAC_PI_2 / agm(1.0, (1.0 - m).sqrt())
}

/// `K(1 - p)`, accurate for small `p`.
pub(crate) fn ellipkm1(p: f64) -> f64 {
    if p <= 0.0 {
        return f64::INFINITY;
    }
    FRAC_PI_2 / agm(1.0, p.sqrt())
}

/// Jacobian elliptic functions `(sn, cn, dn)` of `u` with parameter `m`.
pub(crate) fn ellipj(u: f64, m: f64) -> (f64, f64, f64) {
    if m.is_nan() || !(0.0..=1.0).contains(&m) {
        return (f64::NAN, f64::NAN, f64::NAN);
    }

    if m < 1e-9 {
        let t = u.sin();
        let b = u.cos();
        let ai = 0.25 * m * (u - t * b);
        return (t - ai * b, b + ai * t, 1.0 - 0.5 * m * t * t);
    }

    if m >= 0.999_999_999_9 {
        let mut ai = 0.25 * (1.0 - m);
        let b = u.cosh();
        let t = u.tanh();
        let phi = 1.0 / b;
        let twon = b * u.sinh();
        let sn = t + ai * (twon - u) / (b * b);
        ai *= t * phi;
        let cn = phi - ai * (twon - u);
        let dn = phi + ai * (twon + u);
        return (sn, cn, dn);
    }

    // Descending AGM, then back-substitute the amplitude.
    let mut a = [0.0f64; 9];
    let mut c = [0.0f64; 9];
    a[0] = 1.0;
    c[0] = m.sqrt();
    let mut b = (1.0 - m).sqrt();
    let mut twon = 1.0;
    let mut i = 0;
    while (c[i] / a[i]).abs() > MACHEP {
        if i > 7 {
            break;
        }
        let ai = a[i];
        i += 1;
        c[i] = 0.5 * (ai - b);
        let t = (ai * b).sqrt();
        a[i] = 0.5 * (ai + b);
        b = t;
        twon *= 2.0;
    }

    let mut phi = twon * a[i] * u;
    loop {
        let t = c[i] * phi.sin() / a[i];
        b = phi;
        phi = 0.5 * (t.asin() + phi);
        i -= 1;
        if i == 0 {
            break;
        }
    }

    let cn = phi.cos();
    (phi.sin(), cn, cn / (phi - b).cos())
}

/// Solve the degree equation for the selectivity parameter of an order-`n`
/// filter with discrimination parameter `m1`.
pub(crate) fn ellipdeg(n: usize, m1: f64) -> f64 {
    let k1 = ellipk(m1);
    let k1p = ellipkm1(m1);
    let q1 = (-PI * k1p / k1).exp();
    let q = q1.powf(1.0 / n as f64);

    let num: f64 = (0..=DEGREE_TERMS)
        .map(|m| q.powi((m * (m + 1)) as i32))
        .sum();
    let den: f64 = 1.0
        + 2.0
            * (1..=DEGREE_TERMS + 1)
                .map(|m| q.powi((m * m) as i32))
                .sum::<f64>();
    16.0 * q * (num / den).powi(4)
}

fn complement(x: Complex64) -> Complex64 {
    ((Complex64::new(1.0, 0.0) - x) * (Complex64::new(1.0, 0.0) + x)).sqrt()
}

/// Inverse Jacobian `sn` via descending Landen transformations.
fn arc_jac_sn(w: Complex64, m: f64) -> Complex64 {
    let k = m.sqrt();
    if k > 1.0 {
        return Complex64::new(f64::NAN, f64::NAN);
    }
    if k == 1.0 {
        return w.atanh();
    }

    let mut ks = vec![k];
    while ks.len() <= LANDEN_MAX_ITER {
        let last = ks[ks.len() - 1];
        if last == 0.0 {
            break;
        }
        let kp = ((1.0 - last) * (1.0 + last)).sqrt();
        ks.push((1.0 - kp) / (1.0 + kp));
    }

    let capk = ks[1..].iter().map(|kn| 1.0 + kn).product::<f64>() * FRAC_PI_2;

    let mut wn = w;
    for pair in ks.windows(2) {
        let (kn, knext) = (pair[0], pair[1]);
        wn = wn * 2.0 / ((1.0 + knext) * (complement(wn * kn) + 1.0));
    }

    wn.asin() * (2.0 / PI) * capk
}

/// Real inverse Jacobian `sc` with complementary parameter.
fn arc_jac_sc1(w: f64, m: f64) -> f64 {
    arc_jac_sn(Complex64::new(0.0, w), m).im
}

/// Analog elliptic low-pass prototype of `order` with `rp` dB passband
/// ripple and `rs` dB stopband attenuation.
pub(crate) fn ellipap(order: usize, rp: f64, rs: f64) -> Zpk {
    let eps_sq = 10f64.powf(0.1 * rp) - 1.0;

    if order == 1 {
        let p = -(1.0 / eps_sq).sqrt();
        return Zpk {
            zeros: Vec::new(),
            poles: vec![Complex64::new(p, 0.0)],
            gain: -p,
        };
    }

    let eps = eps_sq.sqrt();
    let ck1_sq = eps_sq / (10f64.powf(0.1 * rs) - 1.0);
    let m = ellipdeg(order, ck1_sq);
    let capk = ellipk(m);
    let n = order as f64;

    let js: Vec<usize> = (1 - order % 2..order).step_by(2).collect();
    let sncd: Vec<(f64, f64, f64)> = js
        .iter()
        .map(|&j| ellipj(j as f64 * capk / n, m))
        .collect();

    let mut zeros: Vec<Complex64> = sncd
        .iter()
        .filter(|(s, _, _)| s.abs() > EPSILON)
        .map(|(s, _, _)| Complex64::new(0.0, 1.0 / (m.sqrt() * s)))
        .collect();
    let conj: Vec<Complex64> = zeros.iter().map(|z| z.conj()).collect();
    zeros.extend(conj);

    let r = arc_jac_sc1(1.0 / eps, ck1_sq);
    let v0 = capk * r / (n * ellipk(ck1_sq));
    let (sv, cv, dv) = ellipj(v0, 1.0 - m);

    let mut poles: Vec<Complex64> = sncd
        .iter()
        .map(|&(s, c, d)| {
            let num = Complex64::new(c * d * sv * cv, s * dv);
            -num / (1.0 - (d * sv).powi(2))
        })
        .collect();
    if order % 2 == 1 {
        let energy = poles.iter().map(|p| p.norm_sqr()).sum::<f64>().sqrt();
        let conj: Vec<Complex64> = poles
            .iter()
            .filter(|p| p.im.abs() > EPSILON * energy)
            .map(|p| p.conj())
            .collect();
        poles.extend(conj);
    } else {
        let conj: Vec<Complex64> = poles.iter().map(|p| p.conj()).collect();
        poles.extend(conj);
    }

    let pp: Complex64 = poles.iter().map(|p| -*p).product();
    let zp: Complex64 = zeros.iter().map(|z| -*z).product();
    let mut gain = (pp / zp).re;
    if order % 2 == 0 {
        gain /= (1.0 + eps_sq).sqrt();
    }

    Zpk {
        zeros,
        poles,
        gain,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analog_response(zpk: &Zpk, w: f64) -> Complex64 {
        let s = Complex64::new(0.0, w);
        let num: Complex64 = zpk.zeros.iter().map(|z| s - *z).product();
        let den: Complex64 = zpk.poles.iter().map(|p| s - *p).product();
        num / den * zpk.gain
    }

    #[test]
    fn complete_integral_known_values() {
        assert!((ellipk(0.0) - FRAC_PI_2).abs() < 1e-15);
        assert!((ellipk(0.5) - 1.854_074_677_301_371_9).abs() < 1e-12);
        assert!((ellipkm1(0.5) - ellipk(0.5)).abs() < 1e-12);
        assert!(ellipk(1.0).is_infinite());
    }

    #[test]
    fn jacobi_functions_reduce_to_circular_at_zero_parameter() {
        for &u in &[0.0, 0.3, 1.1, 2.5] {
            let (sn, cn, dn) = ellipj(u, 0.0);
            assert!((sn - f64::sin(u)).abs() < 1e-12);
            assert!((cn - f64::cos(u)).abs() < 1e-12);
            assert!((dn - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn jacobi_functions_satisfy_identities() {
        for &m in &[0.1, 0.5, 0.9] {
            for &u in &[0.2, 0.7, 1.4] {
                let (sn, cn, dn) = ellipj(u, m);
                assert!((sn * sn + cn * cn - 1.0).abs() < 1e-12);
                assert!((dn * dn + m * sn * sn - 1.0).abs() < 1e-12);
            }
        }
        // sn(K, m) = 1
        let (sn, _, _) = ellipj(ellipk(0.5), 0.5);
        assert!((sn - 1.0).abs() < 1e-9);
    }

    #[test]
    fn prototype_has_expected_shape() {
        let zpk = ellipap(8, 1.0, 30.0);
        assert_eq!(zpk.poles.len(), 8);
        assert_eq!(zpk.zeros.len(), 8);
        for p in &zpk.poles {
            assert!(p.re < 0.0, "unstable pole {}", p);
        }
        for z in &zpk.zeros {
            assert!(z.re.abs() < 1e-12, "zero off the imaginary axis {}", z);
            assert!(z.im.abs() > 1.0);
        }
    }

    #[test]
    fn prototype_meets_ripple_and_attenuation() {
        let zpk = ellipap(8, 1.0, 30.0);
        let floor = 10f64.powf(-1.0 / 20.0);
        let dc = analog_response(&zpk, 0.0).norm();
        assert!((dc - floor).abs() < 1e-6, "dc gain {}", dc);

        for i in 0..=20 {
            let w = i as f64 / 20.0;
            let mag = analog_response(&zpk, w).norm();
            assert!(mag <= 1.0 + 1e-6 && mag >= floor - 1e-6, "w={} mag={}", w, mag);
        }

        let stop = 10f64.powf(-30.0 / 20.0);
        for &w in &[1.2, 2.0, 5.0, 50.0] {
            let mag = analog_response(&zpk, w).norm();
            assert!(mag <= stop + 1e-6, "w={} mag={}", w, mag);
        }
    }

    #[test]
    fn odd_order_prototype() {
        let zpk = ellipap(3, 1.0, 30.0);
        assert_eq!(zpk.poles.len(), 3);
        assert_eq!(zpk.zeros.len(), 2);
        let dc = analog_response(&zpk, 0.0).norm();
        assert!((dc - 1.0).abs() < 1e-6, "dc gain {}", dc);
    }
}
