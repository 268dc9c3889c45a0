//! Hierarchical greedy point clustering.
//!
//! Points are projected into the unit square and indexed at zoom
//! `max_zoom + 1`. Each lower zoom is built from the one above it: every
//! node not yet claimed at that zoom claims all unclaimed neighbours within
//! `radius / (extent * 2^zoom)` and, when the combined point count reaches
//! `min_points`, is replaced by a cluster at the weighted centroid. Child
//! nodes remember their parent cluster, which makes expansion queries a
//! radius search plus a parent filter.

use std::fmt;

use rstar::primitives::GeomWithData;
use rstar::{AABB, RTree};
use serde::{Deserialize, Serialize};

use crate::feature::ClusterFeature;
use crate::mercator::{lat_y, lng_x, x_lng, y_lat};
use crate::{BoundingBox, SpatialError};

/// Highest supported `max_zoom`; cluster ids reserve 5 bits for the zoom.
const MAX_SUPPORTED_ZOOM: u8 = 29;

/// Sentinel zoom of a node no zoom level has claimed yet.
const UNCLAIMED: u8 = u8::MAX;

/// Clustering parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuperclusterOptions {
    /// Lowest zoom level with its own index.
    pub min_zoom: u8,
    /// Highest zoom level at which points are clustered.
    pub max_zoom: u8,
    /// Minimum number of points to form a cluster.
    pub min_points: usize,
    /// Cluster radius in pixels.
    pub radius: f64,
    /// Tile extent the radius is relative to.
    pub extent: f64,
}

impl Default for SuperclusterOptions {
    fn default() -> Self {
        Self {
            min_zoom: 0,
            max_zoom: 16,
            min_points: 2,
            radius: 40.0,
            extent: 512.0,
        }
    }
}

/// Identifier of a cluster.
///
/// Encodes the index of the node that seeded the cluster and the zoom level
/// holding that node (one above the zoom the cluster was formed at).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterId(u64);

impl ClusterId {
    fn new(origin_index: usize, origin_zoom: u8) -> Self {
        Self(((origin_index as u64) << 5) | u64::from(origin_zoom))
    }

    /// Wraps a raw id, e.g. one received from a client.
    #[must_use]
    pub const fn from_value(value: u64) -> Self {
        Self(value)
    }

    /// The raw id.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Zoom level of the index holding this cluster's children.
    #[must_use]
    pub const fn origin_zoom(self) -> u8 {
        (self.0 & 0x1f) as u8
    }

    #[allow(clippy::cast_possible_truncation)]
    const fn origin_index(self) -> usize {
        (self.0 >> 5) as usize
    }
}

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ClusterId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

/// An input point with arbitrary properties.
#[derive(Debug, Clone, PartialEq)]
pub struct PointFeature<P> {
    /// Position as `(lng, lat)`.
    pub point: geo::Point<f64>,
    /// Properties carried through to leaf output.
    pub properties: P,
}

#[derive(Debug, Clone, Copy)]
enum NodeKind {
    Leaf(usize),
    Cluster(ClusterId),
}

#[derive(Debug, Clone)]
struct Node {
    x: f64,
    y: f64,
    zoom: u8,
    kind: NodeKind,
    parent: Option<ClusterId>,
    num_points: usize,
}

type IndexedPoint = GeomWithData<[f64; 2], usize>;

#[derive(Default)]
struct Level {
    nodes: Vec<Node>,
    tree: RTree<IndexedPoint>,
}

impl Level {
    fn new(nodes: Vec<Node>) -> Self {
        let tree = RTree::bulk_load(
            nodes
                .iter()
                .enumerate()
                .map(|(i, n)| GeomWithData::new([n.x, n.y], i))
                .collect(),
        );
        Self { nodes, tree }
    }

    fn within(&self, x: f64, y: f64, r: f64) -> Vec<usize> {
        self.tree
            .locate_within_distance([x, y], r * r)
            .map(|p| p.data)
            .collect()
    }
}

/// A clustering index over a fixed set of points.
pub struct Supercluster<P> {
    options: SuperclusterOptions,
    points: Vec<PointFeature<P>>,
    /// Indexed by zoom; entries below `min_zoom` stay empty.
    levels: Vec<Level>,
}

impl<P> Supercluster<P> {
    /// Creates an empty index. `max_zoom` is capped at 29.
    #[must_use]
    pub fn new(options: SuperclusterOptions) -> Self {
        let max_zoom = options.max_zoom.min(MAX_SUPPORTED_ZOOM);
        Self {
            options: SuperclusterOptions {
                max_zoom,
                min_zoom: options.min_zoom.min(max_zoom),
                ..options
            },
            points: Vec::new(),
            levels: Vec::new(),
        }
    }

    /// The effective options.
    #[must_use]
    pub const fn options(&self) -> &SuperclusterOptions {
        &self.options
    }

    /// Number of loaded points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether no points are loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Replaces the indexed points and rebuilds every zoom level.
    pub fn load(&mut self, points: Vec<PointFeature<P>>) {
        let SuperclusterOptions {
            min_zoom, max_zoom, ..
        } = self.options;

        let leaves = points
            .iter()
            .enumerate()
            .map(|(i, p)| Node {
                x: lng_x(p.point.x()),
                y: lat_y(p.point.y()),
                zoom: UNCLAIMED,
                kind: NodeKind::Leaf(i),
                parent: None,
                num_points: 1,
            })
            .collect();

        self.points = points;
        self.levels = std::iter::repeat_with(Level::default)
            .take(usize::from(max_zoom) + 2)
            .collect();
        self.levels[usize::from(max_zoom) + 1] = Level::new(leaves);

        for zoom in (min_zoom..=max_zoom).rev() {
            let nodes = self.cluster_level(zoom);
            log::trace!("z{zoom}: {} nodes", nodes.len());
            self.levels[usize::from(zoom)] = Level::new(nodes);
        }

        log::debug!(
            "Indexed {} points across zooms {min_zoom}-{max_zoom}",
            self.points.len()
        );
    }

    /// Builds the node list for `zoom` from the level above, marking the
    /// claimed nodes of that level with their parent cluster.
    #[allow(clippy::cast_precision_loss)]
    fn cluster_level(&mut self, zoom: u8) -> Vec<Node> {
        let SuperclusterOptions {
            min_points,
            radius,
            extent,
            ..
        } = self.options;
        let r = radius / (extent * 2f64.powi(i32::from(zoom)));
        let level = &mut self.levels[usize::from(zoom) + 1];
        let mut out = Vec::new();

        for i in 0..level.nodes.len() {
            if level.nodes[i].zoom <= zoom {
                continue;
            }
            level.nodes[i].zoom = zoom;

            let (x, y, origin_points) = {
                let p = &level.nodes[i];
                (p.x, p.y, p.num_points)
            };
            let neighbors = level.within(x, y, r);

            let num_points = origin_points
                + neighbors
                    .iter()
                    .map(|&n| &level.nodes[n])
                    .filter(|b| b.zoom > zoom)
                    .map(|b| b.num_points)
                    .sum::<usize>();

            if num_points > origin_points && num_points >= min_points {
                let id = ClusterId::new(i, zoom + 1);
                let mut wx = x * origin_points as f64;
                let mut wy = y * origin_points as f64;

                for &n in &neighbors {
                    let b = &mut level.nodes[n];
                    if b.zoom <= zoom {
                        continue;
                    }
                    b.zoom = zoom;
                    b.parent = Some(id);
                    wx += b.x * b.num_points as f64;
                    wy += b.y * b.num_points as f64;
                }
                level.nodes[i].parent = Some(id);

                out.push(Node {
                    x: wx / num_points as f64,
                    y: wy / num_points as f64,
                    zoom: UNCLAIMED,
                    kind: NodeKind::Cluster(id),
                    parent: None,
                    num_points,
                });
            } else {
                out.push(level.nodes[i].clone());

                if num_points > 1 {
                    for &n in &neighbors {
                        let b = &mut level.nodes[n];
                        if b.zoom <= zoom {
                            continue;
                        }
                        b.zoom = zoom;
                        out.push(b.clone());
                    }
                }
            }
        }

        out
    }

    /// Clamps a fractional zoom to an indexed level.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn limit_zoom(&self, zoom: f64) -> usize {
        let min = f64::from(self.options.min_zoom);
        let max = f64::from(self.options.max_zoom) + 1.0;
        let z = if zoom.is_nan() { min } else { zoom.floor() };
        z.clamp(min, max) as usize
    }

    /// Returns clusters and points inside `bbox` at `zoom`.
    ///
    /// Longitudes are wrapped into `[-180, 180]`. A box spanning at least
    /// 360° covers the world, and a box crossing the antimeridian is
    /// queried as two halves.
    #[must_use]
    pub fn get_clusters(&self, bbox: BoundingBox, zoom: f64) -> Vec<ClusterFeature<'_, P>> {
        if self.levels.is_empty() {
            return Vec::new();
        }

        let mut min_lng = (bbox.west + 180.0).rem_euclid(360.0) - 180.0;
        let min_lat = bbox.south.clamp(-90.0, 90.0);
        #[allow(clippy::float_cmp)]
        let mut max_lng = if bbox.east == 180.0 {
            180.0
        } else {
            (bbox.east + 180.0).rem_euclid(360.0) - 180.0
        };
        let max_lat = bbox.north.clamp(-90.0, 90.0);

        if bbox.east - bbox.west >= 360.0 {
            min_lng = -180.0;
            max_lng = 180.0;
        } else if min_lng > max_lng {
            let mut eastern =
                self.get_clusters(BoundingBox::new(min_lng, min_lat, 180.0, max_lat), zoom);
            let western =
                self.get_clusters(BoundingBox::new(-180.0, min_lat, max_lng, max_lat), zoom);
            eastern.extend(western);
            return eastern;
        }

        let level = &self.levels[self.limit_zoom(zoom)];
        let envelope = AABB::from_corners(
            [lng_x(min_lng), lat_y(max_lat)],
            [lng_x(max_lng), lat_y(min_lat)],
        );

        level
            .tree
            .locate_in_envelope(&envelope)
            .map(|p| self.feature(&level.nodes[p.data]))
            .collect()
    }

    /// Returns the nodes one zoom level above the cluster that it merged.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::ClusterNotFound`] if `cluster_id` does not
    /// name a cluster of this index.
    pub fn get_children(
        &self,
        cluster_id: ClusterId,
    ) -> Result<Vec<ClusterFeature<'_, P>>, SpatialError> {
        let not_found = || SpatialError::ClusterNotFound(cluster_id);
        let origin_zoom = cluster_id.origin_zoom();
        if origin_zoom == 0 {
            return Err(not_found());
        }

        let level = self
            .levels
            .get(usize::from(origin_zoom))
            .ok_or_else(not_found)?;
        let origin = level
            .nodes
            .get(cluster_id.origin_index())
            .ok_or_else(not_found)?;

        let r = self.options.radius
            / (self.options.extent * 2f64.powi(i32::from(origin_zoom) - 1));

        let children: Vec<_> = level
            .within(origin.x, origin.y, r)
            .into_iter()
            .map(|n| &level.nodes[n])
            .filter(|n| n.parent == Some(cluster_id))
            .map(|n| self.feature(n))
            .collect();

        if children.is_empty() {
            return Err(not_found());
        }

        Ok(children)
    }

    /// Returns up to `limit` original points of a cluster, skipping the
    /// first `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::ClusterNotFound`] if `cluster_id` does not
    /// name a cluster of this index.
    pub fn get_leaves(
        &self,
        cluster_id: ClusterId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ClusterFeature<'_, P>>, SpatialError> {
        let mut leaves = Vec::new();
        if limit > 0 {
            self.append_leaves(&mut leaves, cluster_id, limit, offset, 0)?;
        }
        Ok(leaves)
    }

    fn append_leaves<'a>(
        &'a self,
        result: &mut Vec<ClusterFeature<'a, P>>,
        cluster_id: ClusterId,
        limit: usize,
        offset: usize,
        mut skipped: usize,
    ) -> Result<usize, SpatialError> {
        for child in self.get_children(cluster_id)? {
            match child {
                ClusterFeature::Cluster {
                    id, point_count, ..
                } => {
                    if skipped + point_count <= offset {
                        skipped += point_count;
                    } else {
                        skipped = self.append_leaves(result, id, limit, offset, skipped)?;
                    }
                }
                leaf @ ClusterFeature::Leaf { .. } => {
                    if skipped < offset {
                        skipped += 1;
                    } else {
                        result.push(leaf);
                    }
                }
            }

            if result.len() == limit {
                break;
            }
        }

        Ok(skipped)
    }

    /// Returns the zoom at which the cluster splits into more than one
    /// child.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::ClusterNotFound`] if `cluster_id` does not
    /// name a cluster of this index.
    pub fn get_cluster_expansion_zoom(&self, cluster_id: ClusterId) -> Result<u8, SpatialError> {
        let mut id = cluster_id;
        let mut expansion_zoom = id
            .origin_zoom()
            .checked_sub(1)
            .ok_or(SpatialError::ClusterNotFound(cluster_id))?;

        loop {
            let children = self.get_children(id)?;
            expansion_zoom += 1;

            match children.as_slice() {
                [ClusterFeature::Cluster { id: only, .. }]
                    if expansion_zoom <= self.options.max_zoom =>
                {
                    id = *only;
                }
                _ => break,
            }
        }

        Ok(expansion_zoom)
    }

    fn feature<'a>(&'a self, node: &Node) -> ClusterFeature<'a, P> {
        match node.kind {
            NodeKind::Cluster(id) => ClusterFeature::Cluster {
                id,
                point: geo::Point::new(x_lng(node.x), y_lat(node.y)),
                point_count: node.num_points,
            },
            NodeKind::Leaf(i) => {
                let p = &self.points[i];
                ClusterFeature::Leaf {
                    point: p.point,
                    properties: &p.properties,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WORLD: BoundingBox = BoundingBox::new(-180.0, -85.0, 180.0, 85.0);

    fn options() -> SuperclusterOptions {
        SuperclusterOptions {
            radius: 75.0,
            max_zoom: 20,
            ..SuperclusterOptions::default()
        }
    }

    fn grid(lng: f64, lat: f64, n: usize, step: f64) -> Vec<PointFeature<usize>> {
        (0..n * n)
            .map(|i| PointFeature {
                point: geo::Point::new(
                    lng + step * (i % n) as f64,
                    lat + step * (i / n) as f64,
                ),
                properties: i,
            })
            .collect()
    }

    fn total_points(features: &[ClusterFeature<'_, usize>]) -> usize {
        features.iter().map(ClusterFeature::point_count).sum()
    }

    fn index(points: Vec<PointFeature<usize>>) -> Supercluster<usize> {
        let mut index = Supercluster::new(options());
        index.load(points);
        index
    }

    #[test]
    fn empty_index_returns_nothing() {
        let index: Supercluster<usize> = Supercluster::new(options());
        assert!(index.get_clusters(WORLD, 3.0).is_empty());
        assert!(index.is_empty());
    }

    #[test]
    fn every_zoom_accounts_for_every_point() {
        let index = index(grid(-1.2, 52.6, 10, 0.01));
        for zoom in 0..=21 {
            let features = index.get_clusters(WORLD, f64::from(zoom));
            assert_eq!(total_points(&features), 100, "zoom {zoom}");
        }
    }

    #[test]
    fn low_zoom_collapses_into_one_cluster() {
        let index = index(grid(-1.2, 52.6, 5, 0.001));
        let features = index.get_clusters(WORLD, 0.0);
        assert_eq!(features.len(), 1);
        assert!(features[0].is_cluster());
        assert_eq!(features[0].point_count(), 25);
    }

    #[test]
    fn above_max_zoom_returns_leaves() {
        let index = index(grid(-1.2, 52.6, 5, 0.001));
        let features = index.get_clusters(WORLD, 25.0);
        assert_eq!(features.len(), 25);
        assert!(features.iter().all(|f| !f.is_cluster()));
    }

    #[test]
    fn single_point_never_clusters() {
        let index = index(grid(-1.2, 52.6, 1, 0.0));
        let features = index.get_clusters(WORLD, 0.0);
        assert_eq!(features.len(), 1);
        assert!(matches!(features[0], ClusterFeature::Leaf { properties: &0, .. }));
    }

    #[test]
    fn bbox_filters_points() {
        let mut points = grid(-1.2, 52.6, 2, 0.0001);
        points.extend(grid(151.2, -33.8, 2, 0.0001));
        let index = index(points);

        let leicester = BoundingBox::new(-2.0, 52.0, 0.0, 53.0);
        let features = index.get_clusters(leicester, 2.0);
        assert_eq!(total_points(&features), 4);
        assert!(features.iter().all(|f| f.point().x() < 0.0));
    }

    #[test]
    fn antimeridian_bbox_is_split() {
        let points = vec![
            PointFeature {
                point: geo::Point::new(179.5, 0.0),
                properties: 0,
            },
            PointFeature {
                point: geo::Point::new(-179.5, 0.0),
                properties: 1,
            },
            PointFeature {
                point: geo::Point::new(0.0, 0.0),
                properties: 2,
            },
        ];
        let index = index(points);
        let features = index.get_clusters(BoundingBox::new(179.0, -1.0, -179.0, 1.0), 20.0);
        let mut ids: Vec<usize> = features
            .iter()
            .filter_map(|f| match f {
                ClusterFeature::Leaf { properties, .. } => Some(**properties),
                ClusterFeature::Cluster { .. } => None,
            })
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![0, 1]);
    }

    #[test]
    fn children_sum_to_cluster_count() {
        let index = index(grid(-1.2, 52.6, 10, 0.01));
        for feature in index.get_clusters(WORLD, 8.0) {
            if let ClusterFeature::Cluster {
                id, point_count, ..
            } = feature
            {
                let children = index.get_children(id).unwrap();
                assert!(children.len() > 1 || children[0].is_cluster());
                assert_eq!(total_points(&children), point_count);
            }
        }
    }

    #[test]
    fn leaves_are_paginated() {
        let index = index(grid(-1.2, 52.6, 5, 0.001));
        let root = index.get_clusters(WORLD, 0.0);
        let ClusterFeature::Cluster { id, .. } = root[0] else {
            panic!("expected cluster");
        };

        let all = index.get_leaves(id, usize::MAX, 0).unwrap();
        assert_eq!(all.len(), 25);

        let page = index.get_leaves(id, 10, 20).unwrap();
        assert_eq!(page.len(), 5);
        assert!(page.iter().all(|f| !f.is_cluster()));

        let mut seen: Vec<usize> = all
            .iter()
            .filter_map(|f| match f {
                ClusterFeature::Leaf { properties, .. } => Some(**properties),
                ClusterFeature::Cluster { .. } => None,
            })
            .collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 25);

        assert_eq!(index.get_leaves(id, 10, 0).unwrap().len(), 10);
    }

    #[test]
    fn expansion_zoom_splits_the_cluster() {
        let index = index(grid(-1.2, 52.6, 10, 0.01));
        for feature in index.get_clusters(WORLD, 5.0) {
            if let ClusterFeature::Cluster { id, point, .. } = feature {
                let zoom = index.get_cluster_expansion_zoom(id).unwrap();
                assert!(zoom > 5 && zoom <= 21, "zoom {zoom}");

                // Around the cluster at its expansion zoom there is more than
                // one feature.
                let around = BoundingBox::new(
                    point.x() - 0.5,
                    point.y() - 0.5,
                    point.x() + 0.5,
                    point.y() + 0.5,
                );
                assert!(index.get_clusters(around, f64::from(zoom)).len() > 1);
            }
        }
    }

    #[test]
    fn unknown_cluster_id_is_an_error() {
        let index = index(grid(-1.2, 52.6, 3, 0.001));
        // zoom 0, missing level, missing node, node without a parent
        for raw in [0, 31, (9999 << 5) | 3, 21] {
            let id = ClusterId::from_value(raw);
            assert!(matches!(
                index.get_children(id),
                Err(SpatialError::ClusterNotFound(_))
            ));
            assert!(index.get_cluster_expansion_zoom(id).is_err());
        }
    }

    #[test]
    fn cluster_id_roundtrips_through_strings() {
        let id = ClusterId::new(1234, 13);
        assert_eq!(id.origin_zoom(), 13);
        assert_eq!(id.origin_index(), 1234);
        assert_eq!(id.to_string().parse::<ClusterId>().unwrap(), id);
    }

    #[test]
    fn max_zoom_is_capped() {
        let index: Supercluster<usize> = Supercluster::new(SuperclusterOptions {
            max_zoom: 40,
            min_zoom: 35,
            ..SuperclusterOptions::default()
        });
        assert_eq!(index.options().max_zoom, 29);
        assert_eq!(index.options().min_zoom, 29);
    }
}
