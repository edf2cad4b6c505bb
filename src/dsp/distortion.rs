//! Saturation and limiting
//!
//! Two nonlinearities live here, both built on the hyperbolic tangent:
//!
//! # Saturation
//!
//! `tanh` is the classic "analog" transfer curve. Near zero it is a straight
//! line (tanh(x) ≈ x), and it bends smoothly toward ±1 as the input grows:
//!
//! ```text
//!  +1 ┤          ________
//!     │       ╱
//!   0 ┼─────╱─────────────
//!     │   ╱
//!  -1 ┤__╱
//! ```
//!
//! Signals in this crate are voltages (±5 V nominal audio), so the curve is
//! scaled: `ceiling * tanh(x / ceiling)`. Small signals pass unchanged, large
//! ones are compressed toward the ceiling.
//!
//! # Soft-knee limiting
//!
//! A limiter should leave normal program material alone and only act on
//! peaks. Below the threshold the output is the input, untouched. Above it
//! the excess is compressed by a tanh segment that meets the identity line
//! with matching slope (no kink) and approaches the ceiling asymptotically:
//!
//! ```text
//! out
//!  C ┤               ___________
//!  T ┤        ____╱
//!    │     ╱
//!    │  ╱
//!  0 ┼──────────┬──────────────→ in
//!               T
//! ```
//!
//! A final clamp hard-caps the result at the ceiling in case the input is so
//! large that rounding pushes tanh's output to exactly 1.0.

/// Scaled tanh saturation: linear for small inputs, bounded by `ceiling`.
#[inline]
pub fn saturate(sample: f32, ceiling: f32) -> f32 {
    let ceiling = ceiling.max(f32::EPSILON);
    ceiling * (sample / ceiling).tanh()
}

/// Identity below `threshold`, tanh compression above it, never beyond `ceiling`.
#[inline]
pub fn soft_knee_limit(sample: f32, threshold: f32, ceiling: f32) -> f32 {
    let magnitude = sample.abs();
    if magnitude <= threshold {
        return sample;
    }
    if !magnitude.is_finite() {
        // +inf maps to the ceiling, NaN to silence.
        return if sample.is_nan() {
            0.0
        } else {
            ceiling.copysign(sample)
        };
    }

    let knee = (ceiling - threshold).max(f32::EPSILON);
    let compressed = threshold + knee * ((magnitude - threshold) / knee).tanh();
    compressed.min(ceiling).copysign(sample)
}

/// Blend a dry sample with its saturated version.
#[inline]
pub fn saturate_mix(sample: f32, ceiling: f32, mix: f32) -> f32 {
    let mix = mix.clamp(0.0, 1.0);
    sample + (saturate(sample, ceiling) - sample) * mix
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saturate_is_linear_for_small_signals() {
        let out = saturate(0.01, 5.0);
        assert!((out - 0.01).abs() < 1e-6);
    }

    #[test]
    fn saturate_never_exceeds_ceiling() {
        assert!(saturate(1_000.0, 5.0) <= 5.0);
        assert!(saturate(-1_000.0, 5.0) >= -5.0);
    }

    #[test]
    fn limiter_is_identity_below_threshold() {
        assert_eq!(soft_knee_limit(3.0, 4.5, 6.0), 3.0);
        assert_eq!(soft_knee_limit(-4.5, 4.5, 6.0), -4.5);
    }

    #[test]
    fn limiter_compresses_above_threshold() {
        let out = soft_knee_limit(5.0, 4.5, 6.0);
        assert!(out > 4.5 && out < 5.0);

        let huge = soft_knee_limit(1e30, 4.5, 6.0);
        assert!(huge <= 6.0);
        assert_eq!(soft_knee_limit(f32::NEG_INFINITY, 4.5, 6.0), -6.0);
        assert_eq!(soft_knee_limit(f32::NAN, 4.5, 6.0), 0.0);
    }

    #[test]
    fn limiter_is_monotonic() {
        let mut previous = 0.0;
        for i in 0..1000 {
            let out = soft_knee_limit(i as f32 * 0.02, 4.5, 6.0);
            assert!(out >= previous);
            previous = out;
        }
    }

    #[test]
    fn saturate_mix_endpoints() {
        assert_eq!(saturate_mix(8.0, 5.0, 0.0), 8.0);
        assert!((saturate_mix(8.0, 5.0, 1.0) - saturate(8.0, 5.0)).abs() < 1e-6);
    }
}
