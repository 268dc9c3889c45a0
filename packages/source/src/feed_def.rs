//! Config-driven feed definition.
//!
//! [`FeedDefinition`] captures one `crimes-street` request in a serializable
//! config struct. Definitions are embedded from TOML by
//! [`crate::registry`].

use chrono::NaiveDate;
use crime_cluster_crime_models::CrimeCategory;
use serde::{Deserialize, Serialize};

use crate::SourceError;

const fn default_max_records() -> usize {
    2000
}

const fn default_dedupe_interval_ms() -> u64 {
    2000
}

/// A street crime request against the police.uk API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedDefinition {
    /// Unique identifier (e.g., `"leicester"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// API base URL, without the trailing path.
    pub api_url: String,
    /// Category filter for the request path.
    #[serde(default)]
    pub category: CrimeCategory,
    /// Latitude of the request centre.
    pub latitude: f64,
    /// Longitude of the request centre.
    pub longitude: f64,
    /// Month to request, `YYYY-MM`.
    pub month: String,
    /// Number of leading records the map uses.
    #[serde(default = "default_max_records")]
    pub max_records: usize,
    /// Window in which repeated revalidations reuse the cached result.
    #[serde(default = "default_dedupe_interval_ms")]
    pub dedupe_interval_ms: u64,
    /// Retries for transient failures. Zero means a single attempt.
    #[serde(default)]
    pub max_retries: u32,
}

impl FeedDefinition {
    /// Renders the full request URL. Also used as the cache key.
    #[must_use]
    pub fn request_url(&self) -> String {
        format!(
            "{}/crimes-street/{}?lat={}&lng={}&date={}",
            self.api_url.trim_end_matches('/'),
            self.category,
            self.latitude,
            self.longitude,
            self.month,
        )
    }

    /// Checks the fields that the API would otherwise reject.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Config`] if the month is not `YYYY-MM` or the
    /// centre lies outside valid coordinate ranges.
    pub fn validate(&self) -> Result<(), SourceError> {
        if NaiveDate::parse_from_str(&format!("{}-01", self.month), "%Y-%m-%d").is_err() {
            return Err(SourceError::Config {
                message: format!("{}: month {:?} is not YYYY-MM", self.id, self.month),
            });
        }
        if !(-90.0..=90.0).contains(&self.latitude) || !(-180.0..=180.0).contains(&self.longitude)
        {
            return Err(SourceError::Config {
                message: format!(
                    "{}: centre ({}, {}) is out of range",
                    self.id, self.latitude, self.longitude
                ),
            });
        }
        Ok(())
    }
}

/// Parses a TOML string into a [`FeedDefinition`].
///
/// # Errors
///
/// Returns an error string if the TOML is malformed or missing required
/// fields.
pub fn parse_feed_toml(toml_str: &str) -> Result<FeedDefinition, String> {
    toml::de::from_str(toml_str).map_err(|e| e.to_string())
}
