//! Markers rendered on the map.

use crime_cluster_crime_models::CrimePoint;
use crime_cluster_spatial::{ClusterFeature, ClusterId};
use serde::{Deserialize, Serialize};

/// Smallest cluster marker diameter in pixels.
const MIN_CLUSTER_SIZE_PX: f64 = 10.0;
/// Extra diameter a cluster holding every point gets.
const CLUSTER_SIZE_RANGE_PX: f64 = 20.0;

/// A marker placed on the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Marker {
    /// Aggregate of several crimes; clicking it expands the cluster.
    #[serde(rename_all = "camelCase")]
    Cluster {
        /// Cluster identifier for expansion.
        id: ClusterId,
        /// Representative latitude.
        latitude: f64,
        /// Representative longitude.
        longitude: f64,
        /// Number of crimes in the cluster.
        point_count: usize,
        /// Marker diameter in pixels.
        size_px: f64,
    },
    /// A single crime.
    #[serde(rename_all = "camelCase")]
    Crime {
        /// police.uk crime identifier.
        crime_id: i64,
        /// Category label, verbatim.
        category: String,
        /// Latitude.
        latitude: f64,
        /// Longitude.
        longitude: f64,
    },
}

impl Marker {
    /// Builds a marker from a cluster query result. `total_points` is the
    /// number of points loaded into the index.
    #[must_use]
    pub fn from_feature(feature: &ClusterFeature<'_, CrimePoint>, total_points: usize) -> Self {
        let point = feature.point();
        match feature {
            ClusterFeature::Cluster {
                id, point_count, ..
            } => Self::Cluster {
                id: *id,
                latitude: point.y(),
                longitude: point.x(),
                point_count: *point_count,
                size_px: cluster_size_px(*point_count, total_points),
            },
            ClusterFeature::Leaf { properties, .. } => Self::Crime {
                crime_id: properties.crime_id,
                category: properties.category.clone(),
                latitude: point.y(),
                longitude: point.x(),
            },
        }
    }

    /// Stable key for client-side diffing.
    #[must_use]
    pub fn key(&self) -> String {
        match self {
            Self::Cluster { id, .. } => format!("cluster-{id}"),
            Self::Crime { crime_id, .. } => format!("crime-{crime_id}"),
        }
    }
}

/// Diameter of a cluster marker, growing linearly with the cluster's share
/// of all points.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn cluster_size_px(point_count: usize, total_points: usize) -> f64 {
    if total_points == 0 {
        return MIN_CLUSTER_SIZE_PX;
    }
    (point_count as f64 / total_points as f64).mul_add(CLUSTER_SIZE_RANGE_PX, MIN_CLUSTER_SIZE_PX)
}
