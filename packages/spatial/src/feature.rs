//! Query output and its `GeoJSON` rendering.

use geojson::feature::Id;
use geojson::{Feature, Geometry, JsonObject, Value};
use serde::Serialize;
use serde_json::json;

use crate::{ClusterId, SpatialError};

/// A cluster or an original point, as returned by cluster queries.
#[derive(Debug, Clone, PartialEq)]
pub enum ClusterFeature<'a, P> {
    /// Several points merged at the queried zoom.
    Cluster {
        /// Cluster identifier, valid for expansion queries.
        id: ClusterId,
        /// Weighted centroid of the merged points.
        point: geo::Point<f64>,
        /// Number of original points in the cluster.
        point_count: usize,
    },
    /// A single original point.
    Leaf {
        /// Original position.
        point: geo::Point<f64>,
        /// Original properties.
        properties: &'a P,
    },
}

impl<P> ClusterFeature<'_, P> {
    /// Whether this is a cluster.
    #[must_use]
    pub const fn is_cluster(&self) -> bool {
        matches!(self, Self::Cluster { .. })
    }

    /// Position as `(lng, lat)`.
    #[must_use]
    pub const fn point(&self) -> geo::Point<f64> {
        match self {
            Self::Cluster { point, .. } | Self::Leaf { point, .. } => *point,
        }
    }

    /// Number of original points represented; 1 for a leaf.
    #[must_use]
    pub const fn point_count(&self) -> usize {
        match self {
            Self::Cluster { point_count, .. } => *point_count,
            Self::Leaf { .. } => 1,
        }
    }

    /// Short label for the point count: `999`, `1.2k`, `15k`.
    #[must_use]
    pub fn point_count_abbreviated(&self) -> String {
        abbreviate(self.point_count())
    }
}

impl<P: Serialize> ClusterFeature<'_, P> {
    /// Renders the feature as a `GeoJSON` point feature.
    ///
    /// Clusters carry `cluster`, `cluster_id`, `point_count` and
    /// `point_count_abbreviated`; leaves carry `cluster: false` merged with
    /// their own properties.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::Serialize`] if the leaf properties fail to
    /// serialize.
    pub fn to_geojson(&self) -> Result<Feature, SpatialError> {
        let point = self.point();
        let mut properties = JsonObject::new();

        let id = match self {
            Self::Cluster {
                id, point_count, ..
            } => {
                properties.insert("cluster".to_string(), json!(true));
                properties.insert("cluster_id".to_string(), json!(id.value()));
                properties.insert("point_count".to_string(), json!(point_count));
                properties.insert(
                    "point_count_abbreviated".to_string(),
                    json!(self.point_count_abbreviated()),
                );
                Some(Id::Number(id.value().into()))
            }
            Self::Leaf {
                properties: leaf, ..
            } => {
                properties.insert("cluster".to_string(), json!(false));
                match serde_json::to_value(leaf)? {
                    serde_json::Value::Object(map) => properties.extend(map),
                    serde_json::Value::Null => {}
                    other => {
                        properties.insert("value".to_string(), other);
                    }
                }
                None
            }
        };

        Ok(Feature {
            bbox: None,
            geometry: Some(Geometry::new(Value::from(&point))),
            id,
            properties: Some(properties),
            foreign_members: None,
        })
    }
}

#[allow(clippy::cast_precision_loss)]
fn abbreviate(count: usize) -> String {
    if count >= 10_000 {
        format!("{}k", (count as f64 / 1000.0).round())
    } else if count >= 1000 {
        format!("{}k", (count as f64 / 100.0).round() / 10.0)
    } else {
        count.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct Props {
        crime_id: i64,
    }

    #[test]
    fn abbreviates_counts() {
        assert_eq!(abbreviate(999), "999");
        assert_eq!(abbreviate(1000), "1k");
        assert_eq!(abbreviate(1249), "1.2k");
        assert_eq!(abbreviate(15_400), "15k");
    }

    #[test]
    fn renders_cluster_properties() {
        let feature: ClusterFeature<'_, Props> = ClusterFeature::Cluster {
            id: ClusterId::from_value(197),
            point: geo::Point::new(-1.13, 52.63),
            point_count: 1500,
        };
        let geojson = feature.to_geojson().unwrap();
        let props = geojson.properties.unwrap();
        assert_eq!(props["cluster"], json!(true));
        assert_eq!(props["cluster_id"], json!(197));
        assert_eq!(props["point_count"], json!(1500));
        assert_eq!(props["point_count_abbreviated"], json!("1.5k"));
        assert_eq!(geojson.id, Some(Id::Number(197.into())));
    }

    #[test]
    fn renders_leaf_properties() {
        let props = Props { crime_id: 42 };
        let feature = ClusterFeature::Leaf {
            point: geo::Point::new(-1.13, 52.63),
            properties: &props,
        };
        let geojson = feature.to_geojson().unwrap();
        let rendered = geojson.properties.unwrap();
        assert_eq!(rendered["cluster"], json!(false));
        assert_eq!(rendered["crimeId"], json!(42));
        assert_eq!(
            geojson.geometry.unwrap().value,
            Value::Point(vec![-1.13, 52.63])
        );
    }
}
