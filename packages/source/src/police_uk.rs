//! police.uk `crimes-street` client.

use async_trait::async_trait;
use crime_cluster_crime_models::StreetCrime;

use crate::feed_def::FeedDefinition;
use crate::{CrimeSource, SourceError, retry};

/// [`CrimeSource`] backed by the public police.uk data API.
///
/// No authentication, no pagination: the API returns the whole month for
/// the requested location in one JSON array.
pub struct PoliceUkSource {
    client: reqwest::Client,
}

impl PoliceUkSource {
    /// Creates a source with a default `reqwest` client.
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for PoliceUkSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CrimeSource for PoliceUkSource {
    fn id(&self) -> &str {
        "police_uk"
    }

    async fn fetch(&self, feed: &FeedDefinition) -> Result<Vec<StreetCrime>, SourceError> {
        feed.validate()?;

        let url = feed.request_url();
        log::info!("[{}] Fetching {url}", feed.id);

        let crimes: Vec<StreetCrime> =
            retry::send_json(|| self.client.get(&url), feed.max_retries).await?;

        log::info!("[{}] Received {} crimes", feed.id, crimes.len());

        Ok(crimes)
    }
}
