//! Spherical Web Mercator projection into the unit square.
//!
//! `x` grows eastward from 0 at -180° to 1 at 180°; `y` grows southward
//! from 0 at the northern projection limit to 1 at the southern one.

use std::f64::consts::PI;

/// Longitude to normalized x.
#[must_use]
pub fn lng_x(lng: f64) -> f64 {
    lng / 360.0 + 0.5
}

/// Latitude to normalized y, clamped to `[0, 1]`.
#[must_use]
pub fn lat_y(lat: f64) -> f64 {
    let sin = (lat * PI / 180.0).sin();
    let y = 0.5 - 0.25 * ((1.0 + sin) / (1.0 - sin)).ln() / PI;
    y.clamp(0.0, 1.0)
}

/// Normalized x to longitude.
#[must_use]
pub fn x_lng(x: f64) -> f64 {
    (x - 0.5) * 360.0
}

/// Normalized y to latitude.
#[must_use]
pub fn y_lat(y: f64) -> f64 {
    let y2 = (180.0 - y * 360.0) * PI / 180.0;
    360.0 * y2.exp().atan() / PI - 90.0
}
