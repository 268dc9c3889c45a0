//! Interactive mode for the server.
//!
//! Prompts for the feed, bind address and port before starting the server.

use crime_cluster_source::registry::all_feeds;
use dialoguer::{Confirm, Input, Select};

use crate::ServerConfig;

/// Runs the server in interactive mode, prompting for configuration.
///
/// Defaults come from the environment (see [`ServerConfig::from_env`]);
/// the answers override them before delegating to
/// [`super::run_server_with`].
///
/// # Errors
///
/// Returns an `std::io::Result` error if the underlying server fails to
/// start.
#[allow(clippy::future_not_send)]
pub async fn run() -> std::io::Result<()> {
    println!("Crime Cluster Map Server");
    println!();

    let mut config = ServerConfig::from_env();

    let feeds = all_feeds();
    let labels: Vec<String> = feeds
        .iter()
        .map(|f| format!("{} ({})", f.name, f.id))
        .collect();
    let default_feed = feeds
        .iter()
        .position(|f| f.id == config.feed_id)
        .unwrap_or(0);

    if let Ok(selection) = Select::new()
        .with_prompt("Crime feed")
        .items(&labels)
        .default(default_feed)
        .interact()
        && let Some(feed) = feeds.get(selection)
    {
        config.feed_id.clone_from(&feed.id);
    }

    config.bind_addr = Input::new()
        .with_prompt("Bind address")
        .default(config.bind_addr.clone())
        .interact_text()
        .unwrap_or(config.bind_addr);

    config.port = Input::new()
        .with_prompt("Port")
        .default(config.port)
        .interact_text()
        .unwrap_or(config.port);

    if !Confirm::new()
        .with_prompt(format!(
            "Start server for {} on {}:{}?",
            config.feed_id, config.bind_addr, config.port
        ))
        .default(true)
        .interact()
        .unwrap_or(true)
    {
        println!("Cancelled.");
        return Ok(());
    }

    super::run_server_with(config).await
}
