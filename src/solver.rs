//! Closed form and enumerative design parameter models.
//!
//! All functions are pure. Stage `k` of the recurrence rotates by
//! `atan(2^-(k+1))`: the quadrant pre-reduction takes care of the 45 degree
//! stage, so the recurrence starts at the 26.57 degree rotation.

use core::f64::consts::{PI, SQRT_2};

use serde::{Deserialize, Serialize};

use crate::{CoreConfiguration, CordicMode};

/// `ceil(log2(v))`, the number of address bits needed for `v` entries.
///
/// `ceil_log2(0) == ceil_log2(1) == 0`.
pub fn ceil_log2(v: u64) -> u32 {
    if v <= 1 {
        0
    } else {
        u64::BITS - (v - 1).leading_zeros()
    }
}

/// Phase units per radian for a `phase_bits` wide phase accumulator
/// (a full turn is `2^phase_bits`).
pub fn phase_scale(phase_bits: u32) -> f64 {
    (1u64 << phase_bits) as f64 / (2.0 * PI)
}

/// Exact rotation angle of stage `k` in phase units, before truncation.
pub fn stage_angle(k: u32, phase_bits: u32) -> f64 {
    1f64.atan2(2f64.powi(k as i32 + 1)) * phase_scale(phase_bits)
}

/// Magnitude gain of `nstages` micro-rotations.
///
/// `prod_{k=1..n} sqrt(1 + 2^(-2k))`. Strictly increasing in `n`, converges
/// to about 1.16443535.
pub fn gain(nstages: u32) -> f64 {
    (0..nstages).fold(1.0, |g, k| g * (1.0 + 2f64.powi(-2 * (k as i32 + 1))).sqrt())
}

/// Output phase variance in radians^2.
///
/// Starts with the 1/12 variance of the truncated input phase and adds the
/// squared truncation error of every stage angle constant.
pub fn phase_variance(nstages: u32, phase_bits: u32) -> f64 {
    let scale = phase_scale(phase_bits);
    let variance = (0..nstages).fold(1.0 / 12.0, |v, k| {
        let x = stage_angle(k, phase_bits);
        let err = x.trunc() - x;
        v + err * err
    });
    variance / (scale * scale)
}

/// Quantization noise variance at the output, in output LSB^2.
///
/// # Args
/// * `nstages`: Number of micro-rotations
/// * `extra_bits`: Bits between the input LSB and the working LSB
/// * `dropped_bits`: Bits between the working LSB and the output LSB
pub fn quantization_variance(nstages: u32, extra_bits: u32, dropped_bits: u32) -> f64 {
    let v = (0..nstages).fold(2f64.powi(2 * extra_bits as i32) / 12.0, |v, k| {
        (1.0 + 4f64.powi(-(k as i32) - 1)) * v + 1.0 / 3.0
    });
    if dropped_bits > 0 {
        2f64.powi(-2 * dropped_bits as i32) * v + 1.0 / 12.0
    } else {
        v
    }
}

/// Smallest number of stages beyond which the angle constants vanish or
/// the shifts exceed the working width.
pub fn minimal_stage_count(working_width: u32, phase_bits: u32) -> u32 {
    (0..64)
        .find(|&n| stage_angle(n, phase_bits) as u64 == 0 || working_width <= n)
        .unwrap_or(64)
}

/// Smallest phase width (at least 3) whose finest step moves a full scale
/// `width` bit sine by less than half an LSB.
pub fn minimal_phase_bits(width: u32) -> u32 {
    let full_scale = ((1u128 << width) - 1) as f64;
    (3..64)
        .find(|&p| (2.0 * PI / (1u64 << p) as f64).sin() * full_scale < 0.5)
        .unwrap_or(64)
}

/// Predicted signal to noise ratio for a full scale input, in dB.
///
/// The phase noise term is weighted by `2^gain`, matching the validation
/// harness' expected error bound.
pub fn best_possible_cnr_db(
    input_width: u32,
    output_width: u32,
    working_width: u32,
    nstages: u32,
    phase_bits: u32,
    gain: f64,
) -> f64 {
    let amplitude = ((1u64 << (input_width - 1)) - 1) as f64
        * 2f64.powi((working_width - input_width) as i32)
        * gain
        * 2f64.powi(-((working_width - output_width) as i32));
    let signal = amplitude * amplitude;
    let noise = quantization_variance(
        nstages,
        working_width - input_width,
        working_width - output_width,
    ) + signal * phase_variance(nstages, phase_bits) * 2f64.powf(gain);
    10.0 * (signal / noise).log10()
}

/// Predicted error behaviour of a rotation core.
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct ErrorModel {
    /// Magnitude gain: `out ~ in * gain * 2^(OW - IW - 1)`
    pub gain: f64,
    /// Output quantization variance (output LSB^2)
    pub quantization_variance: f64,
    /// Output phase variance (radians^2)
    pub phase_variance_rad: f64,
    /// Best achievable carrier to noise ratio (dB)
    pub best_possible_cnr_db: f64,
}

impl ErrorModel {
    /// Derive the error model for a resolved configuration
    pub fn new(cfg: &CoreConfiguration) -> Self {
        let n = cfg.stage_count();
        let raw = gain(n);
        // The vectoring pre-rotation adds sqrt(2), the second guard bit takes
        // a factor of two.
        let gain = match cfg.mode() {
            CordicMode::Rotate => raw,
            CordicMode::Vectoring => raw * SQRT_2 / 2.0,
        };
        let ww = cfg.working_width();
        Self {
            gain,
            quantization_variance: quantization_variance(
                n,
                ww - cfg.input_width(),
                ww - cfg.output_width(),
            ),
            phase_variance_rad: phase_variance(n, cfg.phase_bits()),
            best_possible_cnr_db: best_possible_cnr_db(
                cfg.input_width(),
                cfg.output_width(),
                ww,
                n,
                cfg.phase_bits(),
                gain,
            ),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{GenerationRequest, Mode, testing::isclose};
    use quickcheck_macros::quickcheck;

    #[test]
    fn nextlg() {
        let lg: Vec<_> = [0, 1, 2, 3, 4, 5, 7, 8, 9].map(ceil_log2).into();
        assert_eq!(lg, [0, 0, 1, 2, 2, 3, 3, 3, 4]);
    }

    #[test]
    fn gain_closed_form() {
        for n in 1..=20 {
            let g: f64 = (1..=n).map(|k| (1.0 + 4f64.powi(-k)).sqrt()).product();
            assert!(isclose(gain(n as _), g, 1e-15, 0.0));
            assert!(gain(n as _) > gain(n as u32 - 1));
        }
        assert!(isclose(gain(40), 1.1644353455, 0.0, 1e-9));
    }

    #[test]
    fn stage_count_boundary() {
        for pb in 3..40 {
            for ww in 1..40 {
                let n = minimal_stage_count(ww, pb);
                assert!(stage_angle(n, pb) as u64 == 0 || n == ww);
                if n > 0 {
                    assert!(stage_angle(n - 1, pb) as u64 != 0);
                    assert!(n - 1 < ww);
                }
            }
        }
    }

    #[quickcheck]
    fn phase_bits_minimal(width: u8) -> bool {
        let w = (width % 48) as u32 + 1;
        let p = minimal_phase_bits(w);
        let step = |p: u32| (2.0 * PI / (1u64 << p) as f64).sin() * ((1u64 << w) - 1) as f64;
        step(p) < 0.5 && (p == 3 || step(p - 1) >= 0.5) && minimal_phase_bits(w + 1) >= p
    }

    #[test]
    fn rotation_fixture() {
        let ww = 15;
        let pb = minimal_phase_bits(ww);
        assert_eq!(pb, 19);
        let n = minimal_stage_count(ww, pb);
        assert_eq!(n, 15);
        let g = gain(n);
        assert!(isclose(g, 1.16443535, 0.0, 1e-8));
        assert!(isclose(quantization_variance(n, 3, 3), 0.27504, 0.0, 1e-5));
        assert!(isclose(phase_variance(n, pb), 8.77e-10, 1e-3, 0.0));
        let cnr = best_possible_cnr_db(12, 12, ww, n, pb, g);
        assert!(isclose(cnr, 72.98, 0.0, 5e-3));
    }

    #[test]
    fn resolved_error_model() {
        let req = GenerationRequest::new(Mode::Rotate)
            .input_width(12)
            .output_width(12);
        let cfg = CoreConfiguration::resolve(&req).unwrap();
        assert_eq!((cfg.phase_bits(), cfg.stage_count()), (19, 15));
        let m = ErrorModel::new(&cfg);
        assert!(isclose(m.gain, 1.16443535, 0.0, 1e-8));
        assert!(isclose(m.quantization_variance, 0.275037, 0.0, 1e-6));
        assert!(isclose(m.phase_variance_rad, 8.7713e-10, 1e-4, 0.0));
        assert!(isclose(m.best_possible_cnr_db, 72.978, 0.0, 1e-3));

        let cfg = CoreConfiguration::resolve(&GenerationRequest::new(Mode::Vectoring).input_width(12))
            .unwrap();
        let v = ErrorModel::new(&cfg);
        assert!(isclose(v.gain, gain(cfg.stage_count()) * SQRT_2 / 2.0, 1e-15, 0.0));
    }

    #[test]
    fn no_dropped_bits() {
        let v = quantization_variance(0, 2, 0);
        assert!(isclose(v, 16.0 / 12.0, 1e-15, 0.0));
        let v = quantization_variance(1, 0, 0);
        assert!(isclose(v, 1.25 / 12.0 + 1.0 / 3.0, 1e-15, 0.0));
    }
}
