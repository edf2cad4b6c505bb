//! Small numeric helpers shared by every primitive.

/// Magnitudes below this are treated as zero in decaying state.
pub const DENORMAL_FLOOR: f32 = 1e-20;

/// Replace values that have decayed into the subnormal range with zero.
///
/// Feedback state that decays toward zero will otherwise spend a long time
/// as subnormal floats, which are dramatically slower on most CPUs.
#[inline]
pub fn flush_denormal(x: f32) -> f32 {
    if x.abs() < DENORMAL_FLOOR {
        0.0
    } else {
        x
    }
}

/// Replace NaN and infinities with silence.
#[inline]
pub fn sanitize(x: f32) -> f32 {
    if x.is_finite() {
        x
    } else {
        0.0
    }
}

/// Convert decibels to a linear amplitude ratio.
#[inline]
pub fn db_to_gain(db: f32) -> f32 {
    10.0f32.powf(db / 20.0)
}

/// Convert a linear amplitude ratio to decibels.
#[inline]
pub fn gain_to_db(gain: f32) -> f32 {
    20.0 * gain.max(1e-12).log10()
}

/// Per-sample coefficient of a one-pole smoother with time constant `tau`.
///
/// `state += (target - state) * coeff` reaches `1 - 1/e` of a step after
/// `tau` seconds. Zero or negative times give an instantaneous response.
#[inline]
pub fn one_pole_coeff(tau: f32, sample_rate: f32) -> f32 {
    if tau <= 0.0 || sample_rate <= 0.0 {
        return 1.0;
    }
    let c = 1.0 - (-1.0 / (tau * sample_rate)).exp();
    if c.is_finite() {
        c.clamp(0.0, 1.0)
    } else {
        1.0
    }
}

/// Clamp a parameter-derived integer out of a float.
#[inline]
pub fn to_index(value: f32, max: usize) -> usize {
    if !value.is_finite() || value <= 0.0 {
        return 0;
    }
    (value.round() as usize).min(max)
}
