//! ==============================================================================
//! round.rs - fixed-precision rounding for sensor values
//! ==============================================================================
//!
//! purpose:
//!     rounds readings to a number of decimal places before they are stored
//!     in a rolling series or shown on the dashboard.
//!
//! algorithm:
//! ```text
//!     floor((x + EPSILON) * 10^p + 0.5) / 10^p
//!
//!     the EPSILON bias nudges values like 1.005 (stored as 1.00499999...)
//!     over the half-way point so they round up. ties round toward +inf,
//!     the same way a browser `Math.round` does.
//! ```
//!
//! ==============================================================================

/// round half up toward +inf, like `Math.round`
pub fn half_up(x: f64) -> f64 {
    // x + 0.5 can round up on its own, so compare against the fraction instead
    let f = x.floor();
    if x - f >= 0.5 {
        f + 1.0
    } else {
        f
    }
}

/// round `x` to `precision` decimal places
pub fn round(x: f64, precision: u32) -> f64 {
    if !x.is_finite() {
        return x;
    }

    let scale = 10f64.powi(precision as i32);
    let scaled = (x + f64::EPSILON) * scale;
    if !scaled.is_finite() {
        return x;
    }

    // already integral at this scale, nothing left to round
    if scaled.abs() >= 2f64.powi(52) {
        return x;
    }

    half_up(scaled) / scale
}
