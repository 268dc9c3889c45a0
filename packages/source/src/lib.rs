#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! police.uk street crime feeds.
//!
//! A feed is one configured `crimes-street` request (location, month and
//! category), described by a [`feed_def::FeedDefinition`] embedded from
//! TOML. Implementations of [`CrimeSource`] fetch a feed, and
//! [`cache::FeedCache`] keeps the last resolved result per request URL with
//! stale-while-revalidate semantics.

pub mod cache;
pub mod feed_def;
pub mod police_uk;
pub mod registry;
pub mod retry;

use async_trait::async_trait;
use crime_cluster_crime_models::StreetCrime;

use crate::feed_def::FeedDefinition;

/// Errors that can occur while fetching a feed.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status {
        /// Response status code.
        status: u16,
        /// Requested URL.
        url: String,
    },

    /// A feed definition is invalid.
    #[error("Invalid feed definition: {message}")]
    Config {
        /// Description of what went wrong.
        message: String,
    },
}

/// Trait that all crime feed providers implement.
#[async_trait]
pub trait CrimeSource: Send + Sync {
    /// Returns a unique identifier for this provider (e.g., `"police_uk"`).
    fn id(&self) -> &str;

    /// Fetches every record the feed's request returns, verbatim.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the request fails or the body is not a
    /// JSON array of street crimes.
    async fn fetch(&self, feed: &FeedDefinition) -> Result<Vec<StreetCrime>, SourceError>;
}
