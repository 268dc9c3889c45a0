//! Server settings read from the environment.

use crime_cluster_source::registry::DEFAULT_FEED_ID;

/// Runtime settings for [`crate::run_server_with`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to bind (`BIND_ADDR`, default `127.0.0.1`).
    pub bind_addr: String,
    /// Port to listen on (`PORT`, default `8080`).
    pub port: u16,
    /// Map tile provider token handed to the client (`MAPBOX_TOKEN`,
    /// default empty).
    pub access_token: String,
    /// Feed to load (`CRIME_FEED`, default `leicester`).
    pub feed_id: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".to_string(),
            port: 8080,
            access_token: String::new(),
            feed_id: DEFAULT_FEED_ID.to_string(),
        }
    }
}

impl ServerConfig {
    /// Reads the settings from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the settings through `lookup`, falling back to defaults for
    /// missing or unparseable values.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: lookup("BIND_ADDR").unwrap_or(defaults.bind_addr),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            access_token: lookup("MAPBOX_TOKEN").unwrap_or(defaults.access_token),
            feed_id: lookup("CRIME_FEED")
                .filter(|id| !id.is_empty())
                .unwrap_or(defaults.feed_id),
        }
    }
}
