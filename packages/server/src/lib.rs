#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for the crime cluster map.
//!
//! Holds a single [`MapView`] in memory. On startup the configured
//! police.uk feed is fetched in the background; once it resolves the
//! records are loaded into the view's cluster index. The REST API exposes
//! the viewport, the markers for the current view, raw cluster queries as
//! `GeoJSON`, and cluster expansion. The frontend's static files are
//! served from `app/dist`.

pub mod config;
mod handlers;
pub mod interactive;

use std::sync::Arc;

use actix_cors::Cors;
use actix_files::Files;
use actix_web::{App, HttpServer, middleware, web};
use crime_cluster_map::MapView;
use crime_cluster_source::cache::FeedCache;
use crime_cluster_source::feed_def::FeedDefinition;
use crime_cluster_source::police_uk::PoliceUkSource;
use crime_cluster_source::registry::feed_by_id;
use crime_cluster_source::CrimeSource;
use tokio::sync::RwLock;

pub use config::ServerConfig;

/// Shared application state.
pub struct AppState {
    /// The single map view.
    pub view: RwLock<MapView>,
    /// Results of feed fetches, keyed by request URL.
    pub cache: FeedCache,
    /// Provider the feed is fetched from.
    pub source: Arc<dyn CrimeSource>,
    /// The feed shown on the map.
    pub feed: FeedDefinition,
    /// Map tile provider token handed to the client.
    pub access_token: String,
}

impl AppState {
    /// Creates state with an empty view.
    #[must_use]
    pub fn new(feed: FeedDefinition, source: Arc<dyn CrimeSource>, access_token: String) -> Self {
        Self {
            view: RwLock::new(MapView::new()),
            cache: FeedCache::new(),
            source,
            feed,
            access_token,
        }
    }
}

/// Revalidates the feed and loads the usable records into the view.
///
/// A failed fetch leaves the view with no points. Returns the number of
/// points loaded.
pub async fn refresh_feed(state: &AppState) -> usize {
    let fetch = state
        .cache
        .revalidate(state.source.as_ref(), &state.feed)
        .await;

    if let crime_cluster_source::cache::FetchState::Failed { error, .. } = &fetch {
        log::error!("[{}] Feed fetch failed: {error}", state.feed.id);
    }

    let crimes = fetch.usable_crimes(state.feed.max_records);
    let loaded = state.view.write().await.set_crimes(crimes);

    log::info!(
        "[{}] Loaded {loaded} points ({})",
        state.feed.id,
        fetch.name()
    );

    loaded
}

/// Starts a background refresh without waiting for it.
pub fn spawn_refresh(state: web::Data<AppState>) {
    actix_web::rt::spawn(async move {
        refresh_feed(&state).await;
    });
}

/// Registers the `/api` routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .route("/config", web::get().to(handlers::map_config))
            .route("/feed", web::get().to(handlers::feed_status))
            .route("/feed/refresh", web::post().to(handlers::refresh))
            .route("/viewport", web::get().to(handlers::get_viewport))
            .route("/viewport", web::put().to(handlers::put_viewport))
            .route("/viewport/size", web::put().to(handlers::put_size))
            .route("/markers", web::get().to(handlers::markers))
            .route("/clusters", web::get().to(handlers::clusters))
            .route(
                "/clusters/{id}/expansion-zoom",
                web::get().to(handlers::expansion_zoom),
            )
            .route(
                "/clusters/{id}/children",
                web::get().to(handlers::children),
            )
            .route("/clusters/{id}/leaves", web::get().to(handlers::leaves))
            .route("/clusters/{id}/expand", web::post().to(handlers::expand)),
    );
}

/// Starts the server with settings from the environment.
///
/// # Errors
///
/// See [`run_server_with`].
#[allow(clippy::future_not_send)]
pub async fn run_server() -> std::io::Result<()> {
    run_server_with(ServerConfig::from_env()).await
}

/// Starts the crime cluster map API server.
///
/// Looks up the configured feed, kicks off its first fetch in the
/// background and starts the Actix-Web HTTP server. The caller provides
/// the async runtime (e.g. via `#[actix_web::main]`) and initializes
/// logging.
///
/// # Errors
///
/// Returns an `std::io::Result` error if the feed is unknown, or if the
/// HTTP server fails to bind or encounters a runtime error.
#[allow(clippy::future_not_send)]
pub async fn run_server_with(config: ServerConfig) -> std::io::Result<()> {
    let feed = feed_by_id(&config.feed_id).ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("Unknown feed: {}", config.feed_id),
        )
    })?;
    feed.validate()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))?;

    if config.access_token.is_empty() {
        log::warn!("MAPBOX_TOKEN is not set; the map will render without base tiles");
    }

    log::info!("Loading feed {} ({})", feed.id, feed.request_url());

    let state = web::Data::new(AppState::new(
        feed,
        Arc::new(PoliceUkSource::new()),
        config.access_token,
    ));

    spawn_refresh(state.clone());

    log::info!("Starting server on {}:{}", config.bind_addr, config.port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
            // Serve frontend static files (production)
            .service(Files::new("/", "app/dist").index_file("index.html"))
    })
    .bind((config.bind_addr, config.port))?
    .run()
    .await
}
