#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Map view state for the crime cluster map.
//!
//! A [`view::MapView`] owns the viewport, the map's pixel size and the
//! cluster index over the loaded crime points. Markers are recomputed from
//! those on every request; clicking a cluster flies the viewport to the
//! zoom at which the cluster splits.

pub mod fly_to;
pub mod marker;
pub mod view;
pub mod viewport;

pub use marker::Marker;
pub use view::MapView;
pub use viewport::{Transition, TransitionInterpolator, Viewport, ViewportSize};

/// Highest zoom the map allows; also the clustering `max_zoom`.
pub const MAX_ZOOM: u8 = 20;

/// Cluster radius in pixels.
pub const CLUSTER_RADIUS: f64 = 75.0;

/// Tile size used for zoom-level pixel math.
pub const TILE_SIZE: f64 = 512.0;

/// Duration of the fly-to animation after a cluster click.
pub const EXPAND_TRANSITION_MS: u32 = 1000;

/// Fly-to speed after a cluster click.
pub const EXPAND_FLY_SPEED: f64 = 2.0;

/// Errors returned by view operations.
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    /// A cluster query failed.
    #[error(transparent)]
    Spatial(#[from] crime_cluster_spatial::SpatialError),
}
