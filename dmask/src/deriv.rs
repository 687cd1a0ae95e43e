//! # Finite difference approximations

/// Centered finite difference of two samples.
///
/// Given `f1` at time `t` and `f2` at time `t + 2h`, this approximates the first derivative at
/// `t + h` with second order accuracy. `h` must be nonzero.
///
/// # Arguments
///
/// * `f1` - sample at the earlier time.
/// * `f2` - sample two time steps later.
/// * `h` - time step between consecutive samples.
///
/// # Examples
///
/// ```
/// # use dmask::deriv::deriv_approx;
/// assert_eq!(deriv_approx(0.0, 2.0, 0.5), 2.0);
/// assert_eq!(deriv_approx(4.0, 1.0, 0.5), -3.0);
/// ```
#[inline]
pub fn deriv_approx(f1: f64, f2: f64, h: f64) -> f64 {
    (f2 - f1) / (2.0 * h)
}

/// Forward finite difference of two consecutive samples.
///
/// First order estimate of the derivative at the time of `f1`.
#[inline]
pub fn forward_diff(f1: f64, f2: f64, h: f64) -> f64 {
    (f2 - f1) / h
}
