//! Viewport and transition state.

use crime_cluster_spatial::BoundingBox;
use crime_cluster_spatial::mercator::{lat_y, lng_x, x_lng, y_lat};
use serde::{Deserialize, Serialize};

use crate::fly_to::FlyToInterpolator;
use crate::{MAX_ZOOM, TILE_SIZE};

/// Initial map centre latitude.
pub const INITIAL_LATITUDE: f64 = 52.6376;
/// Initial map centre longitude.
pub const INITIAL_LONGITUDE: f64 = -1.135_171;
/// Initial zoom level.
pub const INITIAL_ZOOM: f64 = 12.0;

/// Size of the rendered map in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportSize {
    /// Width in pixels.
    pub width: f64,
    /// Height in pixels.
    pub height: f64,
}

impl ViewportSize {
    /// Creates a size.
    #[must_use]
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// How the map animates towards a new viewport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TransitionInterpolator {
    /// Zoom out, pan, zoom in.
    FlyTo(FlyToInterpolator),
}

impl TransitionInterpolator {
    /// Viewport at progress `t` in `[0, 1]` between `start` and `end`.
    #[must_use]
    pub fn interpolate(
        &self,
        start: &Viewport,
        end: &Viewport,
        size: ViewportSize,
        t: f64,
    ) -> Viewport {
        match self {
            Self::FlyTo(fly) => fly.interpolate(start, end, size, t),
        }
    }

    /// Duration the path would take at the interpolator's own speed.
    #[must_use]
    pub fn natural_duration_ms(&self, start: &Viewport, end: &Viewport, size: ViewportSize) -> f64 {
        match self {
            Self::FlyTo(fly) => fly.duration_ms(start, end, size),
        }
    }
}

pub(crate) fn lerp(a: f64, b: f64, t: f64) -> f64 {
    (b - a).mul_add(t, a)
}

/// Animation parameters attached to a viewport change.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transition {
    /// Duration in milliseconds.
    pub duration_ms: u32,
    /// Interpolation path.
    pub interpolator: TransitionInterpolator,
}

impl Transition {
    /// Viewports along the path from `start` to `end`, one per `step_ms` of
    /// [`Self::duration_ms`], both ends included.
    #[must_use]
    pub fn frames(
        &self,
        start: &Viewport,
        end: &Viewport,
        size: ViewportSize,
        step_ms: u32,
    ) -> Vec<Viewport> {
        let steps = self.duration_ms.div_ceil(step_ms.max(1)).max(1);
        (0..=steps)
            .map(|i| {
                let t = f64::from(i) / f64::from(steps);
                self.interpolator.interpolate(start, end, size, t)
            })
            .collect()
    }
}

/// Centre and zoom of the map, with an optional transition to get there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewport {
    /// Centre latitude.
    pub latitude: f64,
    /// Centre longitude.
    pub longitude: f64,
    /// Zoom level.
    pub zoom: f64,
    /// Animation for reaching this viewport.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition: Option<Transition>,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            latitude: INITIAL_LATITUDE,
            longitude: INITIAL_LONGITUDE,
            zoom: INITIAL_ZOOM,
            transition: None,
        }
    }
}

impl Viewport {
    /// Returns this viewport with its zoom clamped to `[0, MAX_ZOOM]`.
    #[must_use]
    pub fn clamped(mut self) -> Self {
        let zoom = if self.zoom.is_nan() { 0.0 } else { self.zoom };
        self.zoom = zoom.clamp(0.0, f64::from(MAX_ZOOM));
        self
    }

    /// Geographic bounds visible at `size`.
    ///
    /// Longitudes are not wrapped, so a zoomed-out view may extend past
    /// ±180°.
    #[must_use]
    pub fn bounds(&self, size: ViewportSize) -> BoundingBox {
        let world = TILE_SIZE * self.zoom.exp2();
        let cx = lng_x(self.longitude) * world;
        let cy = lat_y(self.latitude) * world;
        let half_w = size.width / 2.0;
        let half_h = size.height / 2.0;

        BoundingBox::new(
            x_lng((cx - half_w) / world),
            y_lat((cy + half_h) / world),
            x_lng((cx + half_w) / world),
            y_lat((cy - half_h) / world),
        )
    }
}
