//! The map view: viewport, size, points and their cluster index.

use crime_cluster_crime_models::{CrimePoint, StreetCrime};
use crime_cluster_spatial::{
    BoundingBox, ClusterId, PointFeature, Supercluster, SuperclusterOptions,
};

use crate::fly_to::FlyToInterpolator;
use crate::viewport::{Transition, TransitionInterpolator, Viewport, ViewportSize};
use crate::{CLUSTER_RADIUS, EXPAND_FLY_SPEED, EXPAND_TRANSITION_MS, MAX_ZOOM, MapError, Marker};

/// Clustering options used by the map.
#[must_use]
pub fn cluster_options() -> SuperclusterOptions {
    SuperclusterOptions {
        radius: CLUSTER_RADIUS,
        max_zoom: MAX_ZOOM,
        ..SuperclusterOptions::default()
    }
}

/// State of the single map view.
///
/// Markers are not stored; [`MapView::markers`] recomputes them from the
/// current points, bounds and zoom on every call.
pub struct MapView {
    viewport: Viewport,
    size: Option<ViewportSize>,
    index: Supercluster<CrimePoint>,
}

impl Default for MapView {
    fn default() -> Self {
        Self::new()
    }
}

impl MapView {
    /// A view at the initial viewport with no size and no points.
    #[must_use]
    pub fn new() -> Self {
        Self {
            viewport: Viewport::default(),
            size: None,
            index: Supercluster::new(cluster_options()),
        }
    }

    /// Current viewport.
    #[must_use]
    pub const fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    /// Map size, once reported.
    #[must_use]
    pub const fn size(&self) -> Option<ViewportSize> {
        self.size
    }

    /// The cluster index over the loaded points.
    #[must_use]
    pub const fn index(&self) -> &Supercluster<CrimePoint> {
        &self.index
    }

    /// Number of loaded points.
    #[must_use]
    pub fn point_count(&self) -> usize {
        self.index.len()
    }

    /// Records the rendered map size.
    pub fn set_size(&mut self, size: ViewportSize) {
        self.size = Some(size);
    }

    /// Replaces the viewport after a pan or zoom. The zoom is clamped.
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport.clamped();
    }

    /// Replaces the points and rebuilds the cluster index.
    pub fn set_points(&mut self, points: Vec<CrimePoint>) {
        let features = points
            .into_iter()
            .map(|p| PointFeature {
                point: geo::Point::new(p.longitude, p.latitude),
                properties: p,
            })
            .collect();
        self.index.load(features);
    }

    /// Converts fetched records into points and loads them.
    ///
    /// Records whose coordinates do not parse are skipped with a warning.
    /// Returns the number of points loaded.
    pub fn set_crimes(&mut self, crimes: &[StreetCrime]) -> usize {
        let points: Vec<CrimePoint> = crimes
            .iter()
            .filter_map(|crime| {
                CrimePoint::try_from(crime)
                    .inspect_err(|e| log::warn!("Skipping crime: {e}"))
                    .ok()
            })
            .collect();
        let loaded = points.len();
        self.set_points(points);
        loaded
    }

    /// Visible bounds, unknown until the map size is reported.
    #[must_use]
    pub fn bounds(&self) -> Option<BoundingBox> {
        self.size.map(|size| self.viewport.bounds(size))
    }

    /// Markers for the current view, clustered at the rounded zoom.
    #[must_use]
    pub fn markers(&self) -> Vec<Marker> {
        let Some(bounds) = self.bounds() else {
            return Vec::new();
        };
        let total = self.index.len();

        self.index
            .get_clusters(bounds, self.viewport.zoom.round())
            .iter()
            .map(|feature| Marker::from_feature(feature, total))
            .collect()
    }

    /// Zoom at which the cluster splits, capped at [`MAX_ZOOM`].
    ///
    /// # Errors
    ///
    /// Returns [`MapError::Spatial`] if the cluster does not exist.
    pub fn expansion_zoom(&self, cluster_id: ClusterId) -> Result<u8, MapError> {
        Ok(self
            .index
            .get_cluster_expansion_zoom(cluster_id)?
            .min(MAX_ZOOM))
    }

    /// Handles a click on a cluster marker: flies to the cluster's location
    /// at its expansion zoom.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::Spatial`] if the cluster does not exist; the
    /// viewport is left unchanged.
    pub fn expand_cluster(
        &mut self,
        cluster_id: ClusterId,
        latitude: f64,
        longitude: f64,
    ) -> Result<&Viewport, MapError> {
        let zoom = self.expansion_zoom(cluster_id)?;

        log::debug!("Expanding cluster {cluster_id} to zoom {zoom}");

        self.viewport = Viewport {
            latitude,
            longitude,
            zoom: f64::from(zoom),
            transition: Some(Transition {
                duration_ms: EXPAND_TRANSITION_MS,
                interpolator: TransitionInterpolator::FlyTo(FlyToInterpolator::new(
                    EXPAND_FLY_SPEED,
                )),
            }),
        };

        Ok(&self.viewport)
    }
}

#[cfg(test)]
mod tests {
    use crime_cluster_crime_models::{Location, Street};

    use super::*;

    fn crime(id: i64, lat: &str, lng: &str) -> StreetCrime {
        StreetCrime {
            id,
            category: "vehicle-crime".to_string(),
            persistent_id: String::new(),
            month: "2019-10".to_string(),
            location: Location {
                latitude: lat.to_string(),
                longitude: lng.to_string(),
                street: Street {
                    id,
                    name: "On or near Granby Street".to_string(),
                },
            },
            location_type: Some("Force".to_string()),
            location_subtype: None,
            context: None,
            outcome_status: None,
        }
    }

    fn crimes_around_centre() -> Vec<StreetCrime> {
        (0..40)
            .map(|i| {
                let lat = 0.002f64.mul_add(f64::from(i % 8), 52.628);
                let lng = 0.003f64.mul_add(f64::from(i / 8), -1.14);
                crime(i64::from(i), &lat.to_string(), &lng.to_string())
            })
            .collect()
    }

    fn sized_view() -> MapView {
        let mut view = MapView::new();
        view.set_size(ViewportSize::new(1280.0, 800.0));
        view.set_crimes(&crimes_around_centre());
        view
    }

    #[test]
    fn no_markers_before_size_is_known() {
        let mut view = MapView::new();
        view.set_crimes(&crimes_around_centre());
        assert!(view.bounds().is_none());
        assert!(view.markers().is_empty());
    }

    #[test]
    fn no_markers_without_points() {
        let mut view = MapView::new();
        view.set_size(ViewportSize::new(1280.0, 800.0));
        assert!(view.markers().is_empty());
    }

    #[test]
    fn markers_account_for_all_visible_crimes() {
        let view = sized_view();
        let total: usize = view
            .markers()
            .iter()
            .map(|m| match m {
                Marker::Cluster { point_count, .. } => *point_count,
                Marker::Crime { .. } => 1,
            })
            .sum();
        assert_eq!(total, 40);
    }

    #[test]
    fn skips_crimes_with_bad_coordinates() {
        let mut view = MapView::new();
        let mut crimes = crimes_around_centre();
        crimes.push(crime(999, "", "-1.13"));
        assert_eq!(view.set_crimes(&crimes), 40);
        assert_eq!(view.point_count(), 40);
    }

    #[test]
    fn zooming_out_clusters_more() {
        let mut view = sized_view();
        let close = view.markers().len();
        view.set_viewport(Viewport {
            zoom: 9.0,
            ..view.viewport().clone()
        });
        let far = view.markers().len();
        assert!(far < close, "{far} !< {close}");
        assert_eq!(far, 1);
    }

    #[test]
    fn clicking_a_cluster_flies_to_expansion_zoom() {
        let mut view = sized_view();
        view.set_viewport(Viewport {
            zoom: 9.0,
            ..Viewport::default()
        });

        let Some(Marker::Cluster {
            id,
            latitude,
            longitude,
            point_count,
            size_px,
        }) = view.markers().into_iter().next()
        else {
            panic!("expected a cluster marker");
        };
        assert_eq!(point_count, 40);
        assert!((size_px - 30.0).abs() < 1e-9);

        let expected = view.expansion_zoom(id).unwrap();
        let viewport = view.expand_cluster(id, latitude, longitude).unwrap().clone();

        assert!((viewport.zoom - f64::from(expected)).abs() < f64::EPSILON);
        assert!(viewport.zoom > 9.0 && viewport.zoom <= 20.0);
        assert!((viewport.latitude - latitude).abs() < f64::EPSILON);
        let transition = viewport.transition.unwrap();
        assert_eq!(transition.duration_ms, 1000);
        assert_eq!(
            transition.interpolator,
            TransitionInterpolator::FlyTo(FlyToInterpolator::new(2.0))
        );

        // The cluster splits at the new viewport.
        assert!(view.markers().len() > 1);
    }

    #[test]
    fn unknown_cluster_leaves_viewport_unchanged() {
        let mut view = sized_view();
        let before = view.viewport().clone();
        assert!(
            view.expand_cluster(ClusterId::from_value(0), 0.0, 0.0)
                .is_err()
        );
        assert_eq!(view.viewport(), &before);
    }

    #[test]
    fn set_viewport_clamps_zoom() {
        let mut view = MapView::new();
        view.set_viewport(Viewport {
            zoom: 23.0,
            ..Viewport::default()
        });
        assert!((view.viewport().zoom - 20.0).abs() < f64::EPSILON);
    }
}
