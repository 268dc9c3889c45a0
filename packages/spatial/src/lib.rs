#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! In-memory point clustering for map views.
//!
//! [`Supercluster`] builds one R-tree per zoom level over points projected
//! into normalized Web Mercator space, greedily merging neighbours within a
//! pixel radius at each zoom. Queries return clusters or original points
//! for a bounding box and zoom, and clusters can be expanded into their
//! children, their leaves, or the zoom at which they split.

pub mod bbox;
pub mod feature;
pub mod mercator;
pub mod supercluster;

pub use bbox::BoundingBox;
pub use feature::ClusterFeature;
pub use supercluster::{ClusterId, PointFeature, Supercluster, SuperclusterOptions};

/// Errors returned by cluster queries.
#[derive(Debug, thiserror::Error)]
pub enum SpatialError {
    /// The id does not name a cluster in the current index.
    #[error("No cluster with the specified id: {0}")]
    ClusterNotFound(ClusterId),

    /// Point properties could not be rendered as JSON.
    #[error("Failed to serialize feature properties: {0}")]
    Serialize(#[from] serde_json::Error),
}
