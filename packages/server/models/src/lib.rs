#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the crime cluster map server.
//!
//! These types are serialized to JSON for the REST API. Cluster query
//! results are returned as `GeoJSON` and are not modelled here.

use chrono::{DateTime, Utc};
use crime_cluster_map::{Marker, Viewport};
use crime_cluster_spatial::ClusterId;
use serde::{Deserialize, Serialize};

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    /// Whether the service is healthy.
    pub healthy: bool,
    /// Service version.
    pub version: String,
}

/// Settings the map client needs before rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiMapConfig {
    /// Access token for the map tile provider.
    pub access_token: String,
    /// Highest zoom the map allows.
    pub max_zoom: u8,
    /// Viewport to start from.
    pub initial_viewport: Viewport,
}

/// Resolution state of the crime feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiFeedStatus {
    /// Feed identifier.
    pub feed_id: String,
    /// `pending`, `loaded` or `failed`.
    pub state: String,
    /// Whether the last fetch failed.
    pub error: bool,
    /// Records received by the last successful fetch.
    pub record_count: usize,
    /// Points currently loaded into the map.
    pub point_count: usize,
    /// When the last successful fetch resolved.
    pub fetched_at: Option<DateTime<Utc>>,
}

/// Query parameters for the clusters endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterQueryParams {
    /// Bounding box as `west,south,east,north`.
    pub bbox: String,
    /// Map zoom level.
    pub zoom: f64,
}

/// Query parameters for the cluster leaves endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeavesQueryParams {
    /// Maximum number of leaves (default 10).
    pub limit: Option<usize>,
    /// Leaves to skip (default 0).
    pub offset: Option<usize>,
}

/// Expansion zoom of one cluster.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiExpansionZoom {
    /// Cluster identifier.
    pub cluster_id: ClusterId,
    /// Zoom at which the cluster splits, capped at the map's max zoom.
    pub expansion_zoom: u8,
}

/// Body of a cluster click.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpandClusterRequest {
    /// Latitude of the clicked marker.
    pub latitude: f64,
    /// Longitude of the clicked marker.
    pub longitude: f64,
}

/// A marker with a stable key for client-side diffing.
#[derive(Debug, Clone, Serialize)]
pub struct ApiMarker {
    /// `cluster-{id}` or `crime-{crimeId}`.
    pub key: String,
    /// The marker itself, flattened next to the key.
    #[serde(flatten)]
    pub marker: Marker,
}

impl From<Marker> for ApiMarker {
    fn from(marker: Marker) -> Self {
        Self {
            key: marker.key(),
            marker,
        }
    }
}

/// Markers for the current view state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiMarkers {
    /// Viewport the markers were computed for.
    pub viewport: Viewport,
    /// Number of loaded points.
    pub total_points: usize,
    /// Cluster and crime markers.
    pub markers: Vec<ApiMarker>,
}
