//! Feed registry: loads all feed definitions from embedded TOML configs.
//!
//! Each `.toml` file in `packages/source/feeds/` is baked into the binary
//! at compile time via [`include_str!`].

use crate::feed_def::{FeedDefinition, parse_feed_toml};

/// TOML configs embedded at compile time.
const FEED_TOMLS: &[(&str, &str)] = &[
    ("leicester", include_str!("../feeds/leicester.toml")),
    ("nottingham", include_str!("../feeds/nottingham.toml")),
];

/// Feed used when none is configured.
pub const DEFAULT_FEED_ID: &str = "leicester";

/// Returns all configured feed definitions, parsed from embedded TOML.
///
/// # Panics
///
/// Panics if any TOML config is malformed (this is a compile-time guarantee
/// since the configs are embedded).
#[must_use]
pub fn all_feeds() -> Vec<FeedDefinition> {
    FEED_TOMLS
        .iter()
        .map(|(name, toml)| {
            parse_feed_toml(toml).unwrap_or_else(|e| panic!("Failed to parse {name}.toml: {e}"))
        })
        .collect()
}

/// Looks up a feed by id.
#[must_use]
pub fn feed_by_id(id: &str) -> Option<FeedDefinition> {
    all_feeds().into_iter().find(|f| f.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_all_feeds() {
        assert_eq!(all_feeds().len(), FEED_TOMLS.len());
    }

    #[test]
    fn feed_ids_match_file_names() {
        for ((name, _), feed) in FEED_TOMLS.iter().zip(all_feeds()) {
            assert_eq!(*name, feed.id);
        }
    }

    #[test]
    fn all_feeds_validate() {
        for feed in all_feeds() {
            feed.validate().unwrap();
        }
    }

    #[test]
    fn default_feed_is_leicester_october_2019() {
        let feed = feed_by_id(DEFAULT_FEED_ID).unwrap();
        assert_eq!(
            feed.request_url(),
            "https://data.police.uk/api/crimes-street/all-crime?lat=52.629729&lng=-1.131592&date=2019-10"
        );
        assert_eq!(feed.max_records, 2000);
        assert_eq!(feed.max_retries, 0);
    }

    #[test]
    fn unknown_feed_is_none() {
        assert!(feed_by_id("atlantis").is_none());
    }
}
