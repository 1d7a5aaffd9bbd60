//! Derived metric mathematics.
//!
//! Pure functions over reconstructed component arrays. Every function here
//! computes node-by-node, so results do not depend on where chunk
//! boundaries fall — the property the batch reduction relies on.

use nalgebra::DMatrix;

use crate::analysis::FatigueParameters;
use crate::reconstruct::{MotionChunk, StressChunk};
use crate::scalar::Scalar;

/// Von Mises equivalent stress for one stress state. Always >= 0.
#[inline]
pub fn von_mises_scalar<T: Scalar>(sx: T, sy: T, sz: T, sxy: T, syz: T, sxz: T) -> T {
    let half = <T as Scalar>::from_f64(0.5);
    let three = <T as Scalar>::from_f64(3.0);
    (half * ((sx - sy).powi(2) + (sy - sz).powi(2) + (sz - sx).powi(2))
        + three * (sxy.powi(2) + syz.powi(2) + sxz.powi(2)))
    .sqrt()
}

/// Principal stresses (s1 >= s2 >= s3) for one stress state.
///
/// Closed-form trigonometric solution of the characteristic cubic, chosen
/// over an iterative eigensolver so the batch path stays a tight
/// elementwise kernel over millions of (node, time) pairs. Near-hydrostatic
/// states collapse to the mean stress before the arccos argument can
/// degenerate, and the argument itself is clamped to [-1, 1] to absorb
/// floating-point overshoot.
#[inline]
pub fn principal_scalar<T: Scalar>(sx: T, sy: T, sz: T, sxy: T, syz: T, sxz: T) -> (T, T, T) {
    let two = <T as Scalar>::from_f64(2.0);
    let three = <T as Scalar>::from_f64(3.0);

    let i1 = sx + sy + sz;
    let i2 = sx * sy + sy * sz + sz * sx - sxy.powi(2) - syz.powi(2) - sxz.powi(2);
    let i3 = sx * sy * sz + two * sxy * syz * sxz
        - sx * syz.powi(2)
        - sy * sxz.powi(2)
        - sz * sxy.powi(2);

    let mean = i1 / three;
    let p = i2 - i1 * i1 / three;
    let q = two * i1 * i1 * i1 / <T as Scalar>::from_f64(27.0) - i1 * i2 / three + i3;

    let m = (-p / three).max(T::zero());
    let sqrt_m = m.sqrt();

    // Numerically isotropic: all roots coincide at the mean stress
    let scale = mean.abs().max(T::one());
    if sqrt_m <= <T as Scalar>::from_f64(1.0e-7) * scale {
        return (mean, mean, mean);
    }

    let cos_arg = (q / (two * sqrt_m * sqrt_m * sqrt_m)).clamp(-T::one(), T::one());
    let theta = cos_arg.acos() / three;
    let two_pi_third = T::two_pi() / three;

    let r1 = mean + two * sqrt_m * theta.cos();
    let r2 = mean + two * sqrt_m * (theta + two_pi_third).cos();
    let r3 = mean + two * sqrt_m * (theta - two_pi_third).cos();

    let s1 = r1.max(r2).max(r3);
    let s3 = r1.min(r2).min(r3);
    let s2 = r1 + r2 + r3 - s1 - s3;
    (s1, s2, s3)
}

/// Von Mises stress for every (node, time) entry of a chunk
pub fn von_mises_into<T: Scalar>(chunk: &StressChunk<T>, out: &mut DMatrix<T>) {
    debug_assert_eq!(chunk.shape(), out.shape());
    let sx = chunk.sx.as_slice();
    let sy = chunk.sy.as_slice();
    let sz = chunk.sz.as_slice();
    let sxy = chunk.sxy.as_slice();
    let syz = chunk.syz.as_slice();
    let sxz = chunk.sxz.as_slice();
    let out = out.as_mut_slice();
    for i in 0..out.len() {
        out[i] = von_mises_scalar(sx[i], sy[i], sz[i], sxy[i], syz[i], sxz[i]);
    }
}

/// Principal stresses for every (node, time) entry of a chunk
pub fn principal_into<T: Scalar>(
    chunk: &StressChunk<T>,
    s1: &mut DMatrix<T>,
    s2: &mut DMatrix<T>,
    s3: &mut DMatrix<T>,
) {
    debug_assert_eq!(chunk.shape(), s1.shape());
    debug_assert_eq!(chunk.shape(), s2.shape());
    debug_assert_eq!(chunk.shape(), s3.shape());
    let sx = chunk.sx.as_slice();
    let sy = chunk.sy.as_slice();
    let sz = chunk.sz.as_slice();
    let sxy = chunk.sxy.as_slice();
    let syz = chunk.syz.as_slice();
    let sxz = chunk.sxz.as_slice();
    let s1 = s1.as_mut_slice();
    let s2 = s2.as_mut_slice();
    let s3 = s3.as_mut_slice();
    for i in 0..s1.len() {
        let (a, b, c) = principal_scalar(sx[i], sy[i], sz[i], sxy[i], syz[i], sxz[i]);
        s1[i] = a;
        s2[i] = b;
        s3[i] = c;
    }
}

/// Resultant magnitude for every (node, time) entry of a motion chunk
pub fn magnitude_into<T: Scalar>(chunk: &MotionChunk<T>, out: &mut DMatrix<T>) {
    debug_assert_eq!(chunk.shape(), out.shape());
    let ux = chunk.ux.as_slice();
    let uy = chunk.uy.as_slice();
    let uz = chunk.uz.as_slice();
    let out = out.as_mut_slice();
    for i in 0..out.len() {
        out[i] = (ux[i].powi(2) + uy[i].powi(2) + uz[i].powi(2)).sqrt();
    }
}

/// Cumulative fatigue damage index for one node's stress series.
///
/// Rainflow-counts the series into closed and residual half cycles, then
/// accumulates Miner damage with the Basquin stress-life relation
/// sigma_a = sigma_f' * (2 Nf)^b. Parameters must already be validated.
pub fn damage_index(series: &[f64], fatigue: &FatigueParameters) -> f64 {
    let points = turning_points(series);
    let inv_b = 1.0 / fatigue.strength_exponent;
    let mut damage = 0.0;
    for (range, count) in rainflow_cycles(&points) {
        let amplitude = 0.5 * range;
        if amplitude <= 0.0 {
            continue;
        }
        let cycles_to_failure = 0.5 * (amplitude / fatigue.strength_coefficient).powf(inv_b);
        if cycles_to_failure.is_finite() && cycles_to_failure > 0.0 {
            damage += count / cycles_to_failure;
        }
    }
    damage
}

/// Strip a series down to its turning points (peaks and valleys)
fn turning_points(series: &[f64]) -> Vec<f64> {
    let Some((&first, rest)) = series.split_first() else {
        return Vec::new();
    };
    let mut points = vec![first];
    let mut direction = 0i8;
    for &v in rest {
        let last = *points.last().unwrap();
        let step = if v > last {
            1
        } else if v < last {
            -1
        } else {
            continue;
        };
        if step == direction {
            *points.last_mut().unwrap() = v;
        } else {
            points.push(v);
            direction = step;
        }
    }
    points
}

/// Three-point rainflow counting over a turning-point sequence.
///
/// Returns (range, cycle count) pairs; closed cycles count 1.0, the
/// residual ranges left on the stack count 0.5 each.
fn rainflow_cycles(points: &[f64]) -> Vec<(f64, f64)> {
    let mut cycles = Vec::new();
    let mut stack: Vec<f64> = Vec::with_capacity(points.len().min(64));
    for &p in points {
        stack.push(p);
        while stack.len() >= 3 {
            let n = stack.len();
            let x = (stack[n - 1] - stack[n - 2]).abs();
            let y = (stack[n - 2] - stack[n - 3]).abs();
            if x < y {
                break;
            }
            if n == 3 {
                // Range contains the series start: half cycle
                cycles.push((y, 0.5));
                stack.remove(0);
            } else {
                cycles.push((y, 1.0));
                stack.remove(n - 3);
                stack.remove(n - 3);
            }
        }
    }
    for pair in stack.windows(2) {
        let range = (pair[1] - pair[0]).abs();
        if range > 0.0 {
            cycles.push((range, 0.5));
        }
    }
    cycles
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn von_mises_uniaxial_recovers_the_input() {
        assert_relative_eq!(
            von_mises_scalar(250.0, 0.0, 0.0, 0.0, 0.0, 0.0),
            250.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn von_mises_pure_shear() {
        let tau = 120.0;
        assert_relative_eq!(
            von_mises_scalar(0.0, 0.0, 0.0, tau, 0.0, 0.0),
            3.0f64.sqrt() * tau,
            epsilon = 1e-9
        );
    }

    #[test]
    fn von_mises_is_non_negative() {
        let states = [
            (-80.0, -120.0, -40.0, 15.0, -25.0, 5.0),
            (0.0, 0.0, 0.0, 0.0, 0.0, 0.0),
            (1e6, -1e6, 0.5, -300.0, 200.0, -100.0),
        ];
        for (sx, sy, sz, sxy, syz, sxz) in states {
            assert!(von_mises_scalar(sx, sy, sz, sxy, syz, sxz) >= 0.0);
        }
    }

    #[test]
    fn principal_of_diagonal_state_is_the_sorted_diagonal() {
        let (s1, s2, s3) = principal_scalar(2.0, 5.0, -3.0, 0.0, 0.0, 0.0);
        assert_relative_eq!(s1, 5.0, epsilon = 1e-9);
        assert_relative_eq!(s2, 2.0, epsilon = 1e-9);
        assert_relative_eq!(s3, -3.0, epsilon = 1e-9);
    }

    #[test]
    fn principal_pure_shear() {
        let tau = 75.0;
        let (s1, s2, s3) = principal_scalar(0.0, 0.0, 0.0, tau, 0.0, 0.0);
        assert_relative_eq!(s1, tau, epsilon = 1e-9);
        assert_relative_eq!(s2, 0.0, epsilon = 1e-6);
        assert_relative_eq!(s3, -tau, epsilon = 1e-9);
    }

    #[test]
    fn principal_ordering_and_trace_hold_for_general_states() {
        let states: [(f64, f64, f64, f64, f64, f64); 4] = [
            (120.0, -45.0, 80.0, 30.0, -12.0, 55.0),
            (-3.0, -7.0, -1.0, 0.4, 0.9, -0.2),
            (1e5, 2e5, -5e4, 3e4, -2e4, 1e4),
            (0.0, 0.0, 0.0, 10.0, 20.0, 30.0),
        ];
        for (sx, sy, sz, sxy, syz, sxz) in states {
            let (s1, s2, s3) = principal_scalar(sx, sy, sz, sxy, syz, sxz);
            assert!(s1 >= s2 && s2 >= s3, "ordering broken for {sx} {sy} {sz}");
            let trace = sx + sy + sz;
            assert_relative_eq!(s1 + s2 + s3, trace, max_relative = 1e-6, epsilon = 1e-6);

            // The equivalent stress from principal values must match the
            // component form
            let vm_components = von_mises_scalar(sx, sy, sz, sxy, syz, sxz);
            let vm_principal = (0.5
                * ((s1 - s2).powi(2) + (s2 - s3).powi(2) + (s3 - s1).powi(2)))
            .sqrt();
            assert_relative_eq!(vm_components, vm_principal, max_relative = 1e-6);
        }
    }

    #[test]
    fn principal_hydrostatic_collapses_exactly() {
        for v in [-250.0, -1.0, 0.0, 0.1, 3.0, 1e6] {
            let (s1, s2, s3) = principal_scalar(v, v, v, 0.0, 0.0, 0.0);
            assert_relative_eq!(s1, v, epsilon = 1e-9);
            assert_relative_eq!(s2, v, epsilon = 1e-9);
            assert_relative_eq!(s3, v, epsilon = 1e-9);
        }
    }

    #[test]
    fn magnitude_of_unit_axes() {
        let chunk = MotionChunk::<f64> {
            ux: DMatrix::from_row_slice(1, 2, &[3.0, 0.0]),
            uy: DMatrix::from_row_slice(1, 2, &[4.0, 0.0]),
            uz: DMatrix::from_row_slice(1, 2, &[0.0, 2.0]),
        };
        let mut out = DMatrix::zeros(1, 2);
        magnitude_into(&chunk, &mut out);
        assert_relative_eq!(out[(0, 0)], 5.0, epsilon = 1e-12);
        assert_relative_eq!(out[(0, 1)], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn turning_points_drop_monotonic_runs() {
        let tp = turning_points(&[0.0, 1.0, 2.0, 1.0, 1.0, 3.0, -1.0]);
        assert_eq!(tp, vec![0.0, 2.0, 1.0, 3.0, -1.0]);
    }

    #[test]
    fn damage_of_one_full_cycle() {
        let fatigue = FatigueParameters::new(100.0, -0.1);
        // One cycle of amplitude 100 = sigma_f': fails at Nf = 0.5
        let damage = damage_index(&[0.0, 200.0, 0.0], &fatigue);
        assert_relative_eq!(damage, 2.0, epsilon = 1e-9);
    }

    #[test]
    fn damage_grows_with_amplitude() {
        let fatigue = FatigueParameters::new(900.0, -0.106);
        let small = damage_index(&[0.0, 100.0, 0.0, 100.0, 0.0], &fatigue);
        let large = damage_index(&[0.0, 400.0, 0.0, 400.0, 0.0], &fatigue);
        assert!(large > small);
        assert!(small > 0.0);
    }

    #[test]
    fn constant_series_accumulates_no_damage() {
        let fatigue = FatigueParameters::new(900.0, -0.106);
        assert_eq!(damage_index(&[50.0; 10], &fatigue), 0.0);
    }
}
