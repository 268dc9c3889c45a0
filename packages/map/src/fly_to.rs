//! Fly-to camera path.
//!
//! Implements the smooth zoom-and-pan path of van Wijk and Nuij ("Smooth
//! and efficient zooming and panning", 2003): the camera zooms out while
//! panning and back in on arrival, with `curve` (ρ) trading zoom for pan.
//! Pan distances are measured in pixels at the start zoom and the visible
//! width is the larger side of the viewport.

use crime_cluster_spatial::mercator::{lat_y, lng_x, x_lng, y_lat};
use serde::{Deserialize, Serialize};

use crate::TILE_SIZE;
use crate::viewport::{Viewport, ViewportSize, lerp};

/// Pan distances below this many pixels fall back to linear interpolation.
const EPSILON: f64 = 0.01;

const fn default_curve() -> f64 {
    1.414
}

/// Fly-to interpolation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlyToInterpolator {
    /// Average speed, used to derive an automatic duration.
    pub speed: f64,
    /// Zoom-out curvature ρ.
    #[serde(default = "default_curve")]
    pub curve: f64,
}

impl Default for FlyToInterpolator {
    fn default() -> Self {
        Self::new(1.2)
    }
}

struct FlyPath {
    start_xy: [f64; 2],
    delta: [f64; 2],
    w0: f64,
    u1: f64,
    r0: f64,
    /// Total path length.
    s: f64,
}

impl FlyToInterpolator {
    /// Creates an interpolator with the default curve.
    #[must_use]
    pub const fn new(speed: f64) -> Self {
        Self {
            speed,
            curve: default_curve(),
        }
    }

    fn path(&self, start: &Viewport, end: &Viewport, size: ViewportSize) -> FlyPath {
        let rho = self.curve;
        let rho2 = rho * rho;

        let start_xy = world_xy(start);
        let end_xy = world_xy(end);
        let delta = [end_xy[0] - start_xy[0], end_xy[1] - start_xy[1]];

        let w0 = size.width.max(size.height).max(1.0);
        let w1 = w0 / (end.zoom - start.zoom).exp2();
        let u1 = delta[0].hypot(delta[1]) * start.zoom.exp2();

        if u1 < EPSILON {
            return FlyPath {
                start_xy,
                delta,
                w0,
                u1,
                r0: 0.0,
                s: (w1 / w0).ln().abs() / rho,
            };
        }

        let b0 = rho2.mul_add(rho2 * u1 * u1, w1 * w1 - w0 * w0) / (2.0 * w0 * rho2 * u1);
        let b1 = (-rho2).mul_add(rho2 * u1 * u1, w1 * w1 - w0 * w0) / (2.0 * w1 * rho2 * u1);
        let r0 = (b0.hypot(1.0) - b0).ln();
        let r1 = (b1.hypot(1.0) - b1).ln();

        FlyPath {
            start_xy,
            delta,
            w0,
            u1,
            r0,
            s: (r1 - r0) / rho,
        }
    }

    /// Viewport at progress `t` in `[0, 1]`.
    #[must_use]
    pub fn interpolate(
        &self,
        start: &Viewport,
        end: &Viewport,
        size: ViewportSize,
        t: f64,
    ) -> Viewport {
        if t <= 0.0 {
            return Viewport {
                transition: None,
                ..start.clone()
            };
        }
        if t >= 1.0 {
            return Viewport {
                transition: None,
                ..end.clone()
            };
        }

        let path = self.path(start, end, size);

        if path.u1 < EPSILON {
            return Viewport {
                latitude: lerp(start.latitude, end.latitude, t),
                longitude: lerp(start.longitude, end.longitude, t),
                zoom: lerp(start.zoom, end.zoom, t),
                transition: None,
            };
        }

        let rho = self.curve;
        let s = t * path.s;
        let w = path.r0.cosh() / rho.mul_add(s, path.r0).cosh();
        let u = path.w0
            * (path.r0.cosh().mul_add(rho.mul_add(s, path.r0).tanh(), -path.r0.sinh())
                / (rho * rho))
            / path.u1;

        let x = path.delta[0].mul_add(u, path.start_xy[0]);
        let y = path.delta[1].mul_add(u, path.start_xy[1]);

        Viewport {
            latitude: y_lat(y / TILE_SIZE),
            longitude: x_lng(x / TILE_SIZE),
            zoom: start.zoom + (1.0 / w).log2(),
            transition: None,
        }
    }

    /// Duration in milliseconds for flying from `start` to `end` at
    /// [`Self::speed`].
    #[must_use]
    pub fn duration_ms(&self, start: &Viewport, end: &Viewport, size: ViewportSize) -> f64 {
        if self.speed <= 0.0 {
            return 0.0;
        }
        1000.0 * self.path(start, end, size).s / self.speed
    }
}

/// Centre in world pixels at zoom 0.
fn world_xy(viewport: &Viewport) -> [f64; 2] {
    [
        lng_x(viewport.longitude) * TILE_SIZE,
        lat_y(viewport.latitude) * TILE_SIZE,
    ]
}
