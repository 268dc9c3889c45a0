//! One-shot cluster queries against a live feed.
//!
//! Fetches a feed once, loads it into a [`MapView`] and prints the clusters
//! for a bounding box and zoom, or the outcome of clicking one of them.

use crime_cluster_crime_models::{CrimeCategory, StreetCrime};
use crime_cluster_map::{MapView, Marker, Viewport, ViewportSize};
use crime_cluster_source::CrimeSource;
use crime_cluster_source::feed_def::FeedDefinition;
use crime_cluster_source::police_uk::PoliceUkSource;
use crime_cluster_source::registry::{all_feeds, feed_by_id};
use crime_cluster_spatial::{BoundingBox, ClusterId};

/// Box covering the whole Web Mercator world.
pub const WORLD: BoundingBox = BoundingBox {
    west: -180.0,
    south: -85.0,
    east: 180.0,
    north: 85.0,
};

/// Map size assumed when printing fly-to paths.
pub const MAP_SIZE: ViewportSize = ViewportSize::new(1280.0, 800.0);

/// Spacing of the printed fly-to frames.
const FRAME_MS: u32 = 250;

/// Parses a `west,south,east,north` argument.
///
/// # Errors
///
/// Returns a message if the value is not four finite numbers.
pub fn parse_bbox(s: &str) -> Result<BoundingBox, String> {
    BoundingBox::parse(s).ok_or_else(|| format!("invalid bbox '{s}', expected west,south,east,north"))
}

/// Looks up a bundled feed.
///
/// # Errors
///
/// Returns an error naming the feed if it is not bundled.
pub fn find_feed(id: &str) -> Result<FeedDefinition, Box<dyn std::error::Error>> {
    feed_by_id(id).ok_or_else(|| format!("Unknown feed: {id}").into())
}

/// Prints the bundled feeds as a table.
pub fn print_feeds() {
    println!("{:<14} {:<28} {:<8} NAME", "ID", "CATEGORY", "MONTH");
    println!("{}", "-".repeat(72));
    for feed in all_feeds() {
        println!(
            "{:<14} {:<28} {:<8} {}",
            feed.id,
            feed.category.label(),
            feed.month,
            feed.name
        );
    }
}

/// Fetches `feed` once and returns its usable leading records.
///
/// # Errors
///
/// Returns an error if the fetch fails.
pub async fn fetch_usable(
    feed: &FeedDefinition,
) -> Result<Vec<StreetCrime>, Box<dyn std::error::Error>> {
    let mut crimes = PoliceUkSource::new().fetch(feed).await?;
    let received = crimes.len();
    crimes.truncate(feed.max_records);
    log::info!("[{}] Using {} of {received} records", feed.id, crimes.len());
    Ok(crimes)
}

/// Loads `crimes` into a new view sized [`MAP_SIZE`].
#[must_use]
pub fn view_from(crimes: &[StreetCrime]) -> MapView {
    let mut view = MapView::new();
    view.set_size(MAP_SIZE);
    let loaded = view.set_crimes(crimes);
    log::info!("Loaded {loaded} points");
    view
}

/// Number of records per known category, in taxonomy order, followed by
/// the count of records whose label is not in the taxonomy. Empty
/// categories are left out.
#[must_use]
pub fn category_counts(crimes: &[StreetCrime]) -> (Vec<(CrimeCategory, usize)>, usize) {
    let known: Vec<Option<CrimeCategory>> = crimes.iter().map(StreetCrime::known_category).collect();

    let counts = CrimeCategory::all()
        .iter()
        .filter(|category| **category != CrimeCategory::AllCrime)
        .map(|category| {
            let count = known.iter().filter(|k| **k == Some(*category)).count();
            (*category, count)
        })
        .filter(|(_, count)| *count > 0)
        .collect();
    let unknown = known.iter().filter(|k| k.is_none()).count();

    (counts, unknown)
}

/// Markers inside `bbox`, clustered at the rounded `zoom` like
/// [`MapView::markers`].
#[must_use]
pub fn markers_in(view: &MapView, bbox: BoundingBox, zoom: f64) -> Vec<Marker> {
    let total = view.point_count();
    view.index()
        .get_clusters(bbox, zoom.round())
        .iter()
        .map(|feature| Marker::from_feature(feature, total))
        .collect()
}

/// Renders one table row for a marker.
#[must_use]
pub fn format_marker(marker: &Marker) -> String {
    match marker {
        Marker::Cluster {
            id,
            latitude,
            longitude,
            point_count,
            size_px,
        } => format!(
            "{:<8} {:>12} {latitude:>10.5} {longitude:>10.5} {point_count:>6} crimes ({size_px:.1}px)",
            "cluster",
            id.value()
        ),
        Marker::Crime {
            crime_id,
            category,
            latitude,
            longitude,
        } => format!(
            "{:<8} {crime_id:>12} {latitude:>10.5} {longitude:>10.5} {category}",
            "crime"
        ),
    }
}

/// Fetches the feed and prints its category breakdown and markers.
///
/// # Errors
///
/// Returns an error if the feed is unknown or the fetch fails.
pub async fn print_clusters(
    feed_id: &str,
    zoom: f64,
    bbox: BoundingBox,
) -> Result<(), Box<dyn std::error::Error>> {
    let feed = find_feed(feed_id)?;
    let crimes = fetch_usable(&feed).await?;
    let view = view_from(&crimes);

    let (counts, unknown) = category_counts(&crimes);
    for (category, count) in counts {
        println!("{:<28} {count:>6}", category.label());
    }
    if unknown > 0 {
        println!("{:<28} {unknown:>6}", "Uncategorised");
    }
    println!();

    let markers = markers_in(&view, bbox, zoom);

    println!(
        "{} marker(s) for {} crimes at zoom {zoom}",
        markers.len(),
        view.point_count()
    );
    println!("{:<8} {:>12} {:>10} {:>10}", "TYPE", "ID", "LAT", "LNG");
    for marker in &markers {
        println!("{}", format_marker(marker));
    }

    Ok(())
}

/// Outcome of clicking a cluster.
#[derive(Debug, Clone)]
pub struct Expansion {
    /// Zoom at which the cluster splits.
    pub expansion_zoom: u8,
    /// Viewport the map flies to.
    pub viewport: Viewport,
    /// Viewports along the fly-to path, one per [`FRAME_MS`].
    pub frames: Vec<Viewport>,
    /// Duration of the same path at the interpolator's own speed.
    pub natural_duration_ms: f64,
}

/// Clicks the cluster with `cluster_id` as shown at `zoom` within `bbox`.
///
/// # Errors
///
/// Returns an error if the cluster is not among the markers shown, or does
/// not exist in the index.
pub fn expand_in(
    view: &mut MapView,
    cluster_id: ClusterId,
    zoom: f64,
    bbox: BoundingBox,
) -> Result<Expansion, Box<dyn std::error::Error>> {
    let (latitude, longitude) = markers_in(view, bbox, zoom)
        .into_iter()
        .find_map(|marker| match marker {
            Marker::Cluster {
                id,
                latitude,
                longitude,
                ..
            } if id == cluster_id => Some((latitude, longitude)),
            _ => None,
        })
        .ok_or_else(|| format!("Cluster {cluster_id} is not shown at zoom {zoom}"))?;

    view.set_viewport(Viewport {
        latitude,
        longitude,
        zoom,
        transition: None,
    });
    let start = view.viewport().clone();
    let size = view.size().unwrap_or(MAP_SIZE);

    let expansion_zoom = view.expansion_zoom(cluster_id)?;
    let viewport = view.expand_cluster(cluster_id, latitude, longitude)?.clone();

    let (frames, natural_duration_ms) = viewport.transition.map_or_else(
        || (vec![viewport.clone()], 0.0),
        |transition| {
            (
                transition.frames(&start, &viewport, size, FRAME_MS),
                transition
                    .interpolator
                    .natural_duration_ms(&start, &viewport, size),
            )
        },
    );

    Ok(Expansion {
        expansion_zoom,
        viewport,
        frames,
        natural_duration_ms,
    })
}

/// Fetches the feed, clicks a cluster and prints the fly-to path and the
/// new viewport.
///
/// # Errors
///
/// See [`expand_in`]; also fails if the feed is unknown or the fetch fails.
pub async fn print_expansion(
    feed_id: &str,
    cluster_id: ClusterId,
    zoom: f64,
    bbox: BoundingBox,
) -> Result<(), Box<dyn std::error::Error>> {
    let feed = find_feed(feed_id)?;
    let crimes = fetch_usable(&feed).await?;
    let mut view = view_from(&crimes);
    let expansion = expand_in(&mut view, cluster_id, zoom, bbox)?;

    println!(
        "Cluster {cluster_id} expands at zoom {}",
        expansion.expansion_zoom
    );
    if let Some(transition) = expansion.viewport.transition {
        println!(
            "Flying over {} ms ({:.0} ms at the path's own speed)",
            transition.duration_ms, expansion.natural_duration_ms
        );
    }
    println!("{:>6} {:>10} {:>10} {:>6}", "MS", "LAT", "LNG", "ZOOM");
    for (i, frame) in (0u32..).zip(&expansion.frames) {
        println!(
            "{:>6} {:>10.5} {:>10.5} {:>6.2}",
            i * FRAME_MS,
            frame.latitude,
            frame.longitude,
            frame.zoom
        );
    }
    println!("{}", serde_json::to_string_pretty(&expansion.viewport)?);

    Ok(())
}

#[cfg(test)]
mod tests {
    use crime_cluster_crime_models::{CrimePoint, Location, Street};
    use crime_cluster_map::MAX_ZOOM;
    use crime_cluster_source::registry::DEFAULT_FEED_ID;

    use super::*;

    fn view_with_points() -> MapView {
        let mut view = MapView::new();
        view.set_size(MAP_SIZE);
        view.set_points(
            (0..12)
                .map(|i: i32| CrimePoint {
                    crime_id: i64::from(i),
                    category: "burglary".to_string(),
                    latitude: 0.001f64.mul_add(f64::from(i % 4), 52.63),
                    longitude: 0.001f64.mul_add(f64::from(i / 4), -1.13),
                })
                .collect(),
        );
        view
    }

    fn crime(id: i64, category: &str) -> StreetCrime {
        StreetCrime {
            id,
            category: category.to_string(),
            persistent_id: String::new(),
            month: "2019-10".to_string(),
            location: Location {
                latitude: "52.63".to_string(),
                longitude: "-1.13".to_string(),
                street: Street {
                    id,
                    name: "On or near Belvoir Street".to_string(),
                },
            },
            location_type: None,
            location_subtype: None,
            context: None,
            outcome_status: None,
        }
    }

    #[test]
    fn parses_bbox_argument() {
        assert!(parse_bbox("-1.2,52.6,-1.1,52.7").is_ok());
        assert!(parse_bbox("-1.2,52.6").is_err());
    }

    #[test]
    fn default_feed_is_bundled() {
        assert!(find_feed(DEFAULT_FEED_ID).is_ok());
        assert!(find_feed("atlantis").is_err());
    }

    #[test]
    fn counts_crimes_per_category() {
        let crimes = [
            crime(1, "drugs"),
            crime(2, "burglary"),
            crime(3, "drugs"),
            crime(4, "cyber-fraud"),
        ];
        let (counts, unknown) = category_counts(&crimes);
        assert_eq!(
            counts,
            vec![(CrimeCategory::Burglary, 1), (CrimeCategory::Drugs, 2)]
        );
        assert_eq!(unknown, 1);
    }

    #[test]
    fn view_from_crimes_is_sized() {
        let view = view_from(&[crime(1, "drugs"), crime(2, "robbery")]);
        assert_eq!(view.size(), Some(MAP_SIZE));
        assert_eq!(view.point_count(), 2);
    }

    #[test]
    fn world_markers_cover_every_point() {
        let view = view_with_points();
        let markers = markers_in(&view, WORLD, 5.0);
        assert_eq!(markers.len(), 1);
        let row = format_marker(&markers[0]);
        assert!(row.starts_with("cluster"));
        assert!(row.contains("12 crimes"));
    }

    #[test]
    fn fractional_zoom_matches_view_markers() {
        let mut view = view_with_points();
        view.set_viewport(Viewport {
            latitude: 52.6315,
            longitude: -1.129,
            zoom: 14.6,
            transition: None,
        });
        let bounds = view.bounds().unwrap();
        assert_eq!(markers_in(&view, bounds, 14.6), view.markers());
        assert_eq!(
            markers_in(&view, bounds, 14.6),
            markers_in(&view, bounds, 15.0)
        );
    }

    #[test]
    fn expanding_a_shown_cluster_zooms_in() {
        let mut view = view_with_points();
        let Some(Marker::Cluster { id, .. }) = markers_in(&view, WORLD, 5.0).pop() else {
            panic!("expected a cluster");
        };
        let expansion = expand_in(&mut view, id, 5.0, WORLD).unwrap();
        assert!(expansion.expansion_zoom > 5 && expansion.expansion_zoom <= MAX_ZOOM);
        assert!(
            (expansion.viewport.zoom - f64::from(expansion.expansion_zoom)).abs() < f64::EPSILON
        );

        assert_eq!(expansion.frames.len(), 5);
        assert!((expansion.frames[0].zoom - 5.0).abs() < f64::EPSILON);
        let last = expansion.frames.last().unwrap();
        assert!((last.zoom - expansion.viewport.zoom).abs() < f64::EPSILON);
        assert!(expansion.natural_duration_ms > 0.0);
    }

    #[test]
    fn expanding_a_hidden_cluster_fails() {
        let mut view = view_with_points();
        let before = view.viewport().clone();
        assert!(expand_in(&mut view, ClusterId::from_value(0), 5.0, WORLD).is_err());
        assert_eq!(view.viewport(), &before);
    }

    #[test]
    fn leaf_rows_show_category() {
        let marker = Marker::Crime {
            crime_id: 7,
            category: "drugs".to_string(),
            latitude: 52.63,
            longitude: -1.13,
        };
        let row = format_marker(&marker);
        assert!(row.starts_with("crime"));
        assert!(row.ends_with("drugs"));
    }
}
