#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line entry point for the crime cluster map.
//!
//! Starts the map server, or fetches a feed once and prints its clusters.
//! Run without a subcommand for an interactive menu.

mod explore;

use clap::{Parser, Subcommand};
use crime_cluster_server::ServerConfig;
use crime_cluster_source::registry::all_feeds;
use crime_cluster_spatial::{BoundingBox, ClusterId};
use dialoguer::{Input, Select};

use crate::explore::{WORLD, parse_bbox};

#[derive(Parser)]
#[command(name = "crime_cluster_cli", about = "Crime cluster map toolchain")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the map server
    Serve {
        /// Address to bind (overrides `BIND_ADDR`)
        #[arg(long)]
        bind: Option<String>,

        /// Port to listen on (overrides `PORT`)
        #[arg(long)]
        port: Option<u16>,

        /// Feed to load (overrides `CRIME_FEED`)
        #[arg(long)]
        feed: Option<String>,
    },
    /// Fetch a feed once and print its clusters
    Clusters {
        /// Feed identifier (e.g., "leicester")
        #[arg(long)]
        feed: Option<String>,

        /// Zoom level to cluster at
        #[arg(long, default_value = "12")]
        zoom: f64,

        /// Bounding box as `west,south,east,north`. Defaults to the whole world.
        #[arg(long, value_parser = parse_bbox, allow_hyphen_values = true)]
        bbox: Option<BoundingBox>,
    },
    /// Click a cluster and print where the map flies to
    Expand {
        /// Cluster identifier, as printed by `clusters`
        cluster_id: u64,

        /// Feed identifier (e.g., "leicester")
        #[arg(long)]
        feed: Option<String>,

        /// Zoom level the cluster is shown at
        #[arg(long, default_value = "12")]
        zoom: f64,

        /// Bounding box as `west,south,east,north`. Defaults to the whole world.
        #[arg(long, value_parser = parse_bbox, allow_hyphen_values = true)]
        bbox: Option<BoundingBox>,
    },
    /// List bundled crime feeds
    Feeds,
}

/// Top-level menu for interactive mode.
enum Tool {
    Server,
    Clusters,
    Feeds,
}

impl Tool {
    const ALL: &[Self] = &[Self::Server, Self::Clusters, Self::Feeds];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::Server => "Start server",
            Self::Clusters => "Print clusters for a feed",
            Self::Feeds => "List feeds",
        }
    }
}

/// Runs the server on its own actix system.
///
/// The server uses actix-web's runtime, so it runs in a blocking task to
/// avoid nesting tokio runtimes.
async fn serve(config: Option<ServerConfig>) -> Result<(), Box<dyn std::error::Error>> {
    tokio::task::spawn_blocking(move || {
        actix_web::rt::System::new().block_on(async move {
            match config {
                Some(config) => crime_cluster_server::run_server_with(config).await,
                None => crime_cluster_server::interactive::run().await,
            }
        })
    })
    .await??;

    Ok(())
}

async fn interactive() -> Result<(), Box<dyn std::error::Error>> {
    println!("Crime Cluster Map");
    println!();

    let labels: Vec<&str> = Tool::ALL.iter().map(Tool::label).collect();

    let idx = Select::new()
        .with_prompt("What would you like to do?")
        .items(&labels)
        .default(0)
        .interact()?;

    match Tool::ALL[idx] {
        Tool::Server => serve(None).await?,
        Tool::Clusters => {
            let feeds = all_feeds();
            let feed_labels: Vec<String> = feeds
                .iter()
                .map(|f| format!("{} ({})", f.name, f.id))
                .collect();
            let feed_idx = Select::new()
                .with_prompt("Feed")
                .items(&feed_labels)
                .default(0)
                .interact()?;

            let zoom: f64 = Input::new()
                .with_prompt("Zoom")
                .default(12.0)
                .interact_text()?;

            explore::print_clusters(&feeds[feed_idx].id, zoom, WORLD).await?;
        }
        Tool::Feeds => explore::print_feeds(),
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    let cli = Cli::parse();

    let Some(command) = cli.command else {
        return interactive().await;
    };

    let default_feed = ServerConfig::from_env().feed_id;

    match command {
        Commands::Serve { bind, port, feed } => {
            let mut config = ServerConfig::from_env();
            if let Some(bind) = bind {
                config.bind_addr = bind;
            }
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(feed) = feed {
                config.feed_id = feed;
            }
            serve(Some(config)).await?;
        }
        Commands::Clusters { feed, zoom, bbox } => {
            let feed = feed.unwrap_or(default_feed);
            explore::print_clusters(&feed, zoom, bbox.unwrap_or(WORLD)).await?;
        }
        Commands::Expand {
            cluster_id,
            feed,
            zoom,
            bbox,
        } => {
            let feed = feed.unwrap_or(default_feed);
            explore::print_expansion(
                &feed,
                ClusterId::from_value(cluster_id),
                zoom,
                bbox.unwrap_or(WORLD),
            )
            .await?;
        }
        Commands::Feeds => explore::print_feeds(),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_is_interactive() {
        let cli = Cli::try_parse_from(["crime_cluster_cli"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn parses_clusters_flags() {
        let cli = Cli::try_parse_from([
            "crime_cluster_cli",
            "clusters",
            "--feed",
            "nottingham",
            "--zoom",
            "10",
            "--bbox",
            "-1.3,52.9,-1.0,53.0",
        ])
        .unwrap();
        let Some(Commands::Clusters { feed, zoom, bbox }) = cli.command else {
            panic!("expected clusters");
        };
        assert_eq!(feed.as_deref(), Some("nottingham"));
        assert!((zoom - 10.0).abs() < f64::EPSILON);
        assert_eq!(bbox, Some(BoundingBox::new(-1.3, 52.9, -1.0, 53.0)));
    }

    #[test]
    fn rejects_bad_bbox() {
        assert!(
            Cli::try_parse_from(["crime_cluster_cli", "clusters", "--bbox", "1,2"]).is_err()
        );
    }

    #[test]
    fn parses_expand() {
        let cli = Cli::try_parse_from(["crime_cluster_cli", "expand", "197"]).unwrap();
        let Some(Commands::Expand {
            cluster_id, zoom, ..
        }) = cli.command
        else {
            panic!("expected expand");
        };
        assert_eq!(cluster_id, 197);
        assert!((zoom - 12.0).abs() < f64::EPSILON);
    }
}
