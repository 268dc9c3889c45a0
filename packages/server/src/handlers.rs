//! HTTP handler functions for the crime cluster map API.

use actix_web::{HttpResponse, web};
use crime_cluster_crime_models::CrimePoint;
use crime_cluster_map::{MAX_ZOOM, MapError, Viewport, ViewportSize};
use crime_cluster_server_models::{
    ApiExpansionZoom, ApiFeedStatus, ApiHealth, ApiMapConfig, ApiMarker, ApiMarkers,
    ClusterQueryParams, ExpandClusterRequest, LeavesQueryParams,
};
use crime_cluster_spatial::{BoundingBox, ClusterFeature, ClusterId, SpatialError};
use geojson::FeatureCollection;

use crate::AppState;

const DEFAULT_LEAVES_LIMIT: usize = 10;

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `GET /api/config`
pub async fn map_config(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(ApiMapConfig {
        access_token: state.access_token.clone(),
        max_zoom: MAX_ZOOM,
        initial_viewport: Viewport::default(),
    })
}

/// `GET /api/feed`
///
/// Reports the resolution state of the feed request.
pub async fn feed_status(state: web::Data<AppState>) -> HttpResponse {
    let fetch = state.cache.get(&state.feed.request_url()).await;
    let point_count = state.view.read().await.point_count();

    let fetched_at = match &fetch {
        crime_cluster_source::cache::FetchState::Loaded { fetched_at, .. } => Some(*fetched_at),
        _ => None,
    };

    HttpResponse::Ok().json(ApiFeedStatus {
        feed_id: state.feed.id.clone(),
        state: fetch.name().to_string(),
        error: fetch.is_error(),
        record_count: fetch.data().map_or(0, |crimes| crimes.len()),
        point_count,
        fetched_at,
    })
}

/// `POST /api/feed/refresh`
///
/// Starts a revalidation in the background.
pub async fn refresh(state: web::Data<AppState>) -> HttpResponse {
    crate::spawn_refresh(state);
    HttpResponse::Accepted().json(serde_json::json!({ "refreshing": true }))
}

/// `GET /api/viewport`
pub async fn get_viewport(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.view.read().await.viewport())
}

/// `PUT /api/viewport`
///
/// Applies a pan or zoom reported by the map and returns the stored
/// viewport.
pub async fn put_viewport(
    state: web::Data<AppState>,
    body: web::Json<Viewport>,
) -> HttpResponse {
    let mut view = state.view.write().await;
    view.set_viewport(body.into_inner());
    HttpResponse::Ok().json(view.viewport())
}

/// `PUT /api/viewport/size`
///
/// Records the rendered map size and returns the resulting bounds.
pub async fn put_size(
    state: web::Data<AppState>,
    body: web::Json<ViewportSize>,
) -> HttpResponse {
    let size = body.into_inner();
    let positive = size.width > 0.0 && size.height > 0.0;
    if !positive {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "Map size must be positive"
        }));
    }

    let mut view = state.view.write().await;
    view.set_size(size);
    HttpResponse::Ok().json(serde_json::json!({ "bounds": view.bounds() }))
}

/// `GET /api/markers`
///
/// Cluster and crime markers for the current viewport.
pub async fn markers(state: web::Data<AppState>) -> HttpResponse {
    let view = state.view.read().await;
    HttpResponse::Ok().json(ApiMarkers {
        viewport: view.viewport().clone(),
        total_points: view.point_count(),
        markers: view.markers().into_iter().map(ApiMarker::from).collect(),
    })
}

/// `GET /api/clusters`
///
/// Clusters and points inside a bounding box at a zoom, as a `GeoJSON`
/// `FeatureCollection`.
pub async fn clusters(
    state: web::Data<AppState>,
    params: web::Query<ClusterQueryParams>,
) -> HttpResponse {
    let Some(bbox) = BoundingBox::parse(&params.bbox) else {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "Invalid bbox, expected west,south,east,north"
        }));
    };
    if !params.zoom.is_finite() {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "Invalid zoom"
        }));
    }

    let view = state.view.read().await;
    let features = view.index().get_clusters(bbox, params.zoom);
    feature_collection_response(&features)
}

/// `GET /api/clusters/{id}/expansion-zoom`
pub async fn expansion_zoom(state: web::Data<AppState>, path: web::Path<u64>) -> HttpResponse {
    let cluster_id = ClusterId::from_value(path.into_inner());

    match state.view.read().await.expansion_zoom(cluster_id) {
        Ok(expansion_zoom) => HttpResponse::Ok().json(ApiExpansionZoom {
            cluster_id,
            expansion_zoom,
        }),
        Err(MapError::Spatial(e)) => spatial_error_response(&e),
    }
}

/// `GET /api/clusters/{id}/children`
pub async fn children(state: web::Data<AppState>, path: web::Path<u64>) -> HttpResponse {
    let cluster_id = ClusterId::from_value(path.into_inner());
    let view = state.view.read().await;

    match view.index().get_children(cluster_id) {
        Ok(features) => feature_collection_response(&features),
        Err(e) => spatial_error_response(&e),
    }
}

/// `GET /api/clusters/{id}/leaves`
///
/// Original crimes under a cluster, paginated with `limit` (default 10,
/// also used for `limit=0`) and `offset`.
pub async fn leaves(
    state: web::Data<AppState>,
    path: web::Path<u64>,
    params: web::Query<LeavesQueryParams>,
) -> HttpResponse {
    let cluster_id = ClusterId::from_value(path.into_inner());
    let limit = match params.limit {
        None | Some(0) => DEFAULT_LEAVES_LIMIT,
        Some(limit) => limit,
    };
    let offset = params.offset.unwrap_or(0);
    let view = state.view.read().await;

    match view.index().get_leaves(cluster_id, limit, offset) {
        Ok(features) => feature_collection_response(&features),
        Err(e) => spatial_error_response(&e),
    }
}

/// `POST /api/clusters/{id}/expand`
///
/// Handles a click on a cluster marker: flies the viewport to the cluster
/// at its expansion zoom and returns the new viewport.
pub async fn expand(
    state: web::Data<AppState>,
    path: web::Path<u64>,
    body: web::Json<ExpandClusterRequest>,
) -> HttpResponse {
    let cluster_id = ClusterId::from_value(path.into_inner());
    let mut view = state.view.write().await;

    match view.expand_cluster(cluster_id, body.latitude, body.longitude) {
        Ok(viewport) => HttpResponse::Ok().json(viewport),
        Err(MapError::Spatial(e)) => spatial_error_response(&e),
    }
}

fn feature_collection_response(features: &[ClusterFeature<'_, CrimePoint>]) -> HttpResponse {
    match features
        .iter()
        .map(ClusterFeature::to_geojson)
        .collect::<Result<Vec<_>, _>>()
    {
        Ok(features) => HttpResponse::Ok().json(FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        }),
        Err(e) => spatial_error_response(&e),
    }
}

fn spatial_error_response(e: &SpatialError) -> HttpResponse {
    match e {
        SpatialError::ClusterNotFound(_) => HttpResponse::NotFound().json(serde_json::json!({
            "error": e.to_string()
        })),
        SpatialError::Serialize(_) => {
            log::error!("Failed to render features: {e}");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Failed to render features"
            }))
        }
    }
}
