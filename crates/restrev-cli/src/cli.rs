use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use restrev_core::models::ALL;
use restrev_core::{DrainPolicy, RestaurantId};

#[derive(Parser)]
#[command(name = "restrev")]
#[command(about = "Browse restaurants and their reviews, online or offline")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Optional path to a JSON config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Backend base URL
    #[arg(long, global = true, value_name = "URL")]
    pub api_url: Option<String>,

    /// What `sync` does after a failed replay (stop-on-failure, best-effort)
    #[arg(long, global = true, value_name = "POLICY", value_parser = parse_drain_policy)]
    pub drain_policy: Option<DrainPolicy>,
}

fn parse_drain_policy(raw: &str) -> Result<DrainPolicy, String> {
    raw.parse().map_err(|error: restrev_core::Error| error.to_string())
}

#[derive(Subcommand)]
pub enum Commands {
    /// List restaurants, optionally filtered
    #[command(alias = "ls")]
    Restaurants {
        /// Cuisine filter ("all" for any)
        #[arg(long, default_value = ALL)]
        cuisine: String,
        /// Neighborhood filter ("all" for any)
        #[arg(long, default_value = ALL)]
        neighborhood: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one restaurant with its reviews
    Show {
        /// Restaurant id or a restaurant page URL (`...?id=3`)
        target: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List neighborhoods
    Neighborhoods {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List cuisines
    Cuisines {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List cached favourite restaurants
    Favourites {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Mark (or unmark) a restaurant as favourite
    Favourite {
        /// Restaurant id
        id: RestaurantId,
        /// Remove from favourites instead
        #[arg(long)]
        remove: bool,
    },
    /// Read and write reviews
    #[command(subcommand)]
    Reviews(ReviewCommands),
    /// Show mutations waiting to be sent
    Queue {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Replay queued mutations against the backend
    Sync {
        /// Keep syncing every SECS seconds
        #[arg(long, value_name = "SECS")]
        watch: Option<u64>,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum ReviewCommands {
    /// List reviews of a restaurant
    List {
        /// Restaurant id
        restaurant_id: RestaurantId,
        /// Read the local cache only (includes unsent reviews)
        #[arg(long)]
        cached: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Post a review
    #[command(alias = "new")]
    Add {
        /// Restaurant id
        restaurant_id: RestaurantId,
        /// Reviewer name
        #[arg(long)]
        name: String,
        /// Rating from 1 to 5
        #[arg(long)]
        rating: u8,
        /// Review text
        #[arg(required = true)]
        comments: Vec<String>,
    },
    /// Edit a review; omitted fields keep their cached value
    Edit {
        /// Review key (server id or local-... key)
        key: String,
        /// Reviewer name
        #[arg(long)]
        name: Option<String>,
        /// Rating from 1 to 5
        #[arg(long)]
        rating: Option<u8>,
        /// Review text
        comments: Vec<String>,
    },
    /// Delete a review
    Delete {
        /// Review key (server id or local-... key)
        key: String,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
