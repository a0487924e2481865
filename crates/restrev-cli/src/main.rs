//! restrev CLI - browse restaurants and reviews from the command line
//!
//! Restaurant listings fall back to the local cache when the backend is
//! unreachable, and `show` answers from the cache once a restaurant has been
//! seen. Neighborhood and cuisine lists always need the backend. Review and
//! favourite writes made while offline are queued and replayed by
//! `restrev sync`.

mod cli;
mod commands;
mod error;


use clap::Parser;

use crate::cli::{Cli, Commands, ReviewCommands};
use crate::commands::common::{load_config, open_service, resolve_config_path, resolve_db_path};
use crate::commands::completions::run_completions;
use crate::commands::restaurants::{
    run_cuisines, run_favourite, run_favourites, run_neighborhoods, run_restaurants, run_show,
};
use crate::commands::reviews::{run_add, run_delete, run_edit, run_list};
use crate::commands::sync::{run_queue, run_sync};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(log_directive("restrev=info")?)
                .add_directive(log_directive("restrev_core=info")?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Completions { shell, output } = &cli.command {
        return run_completions(*shell, output.as_deref());
    }

    let config_path = resolve_config_path(cli.config);
    let config = load_config(
        config_path.as_deref(),
        cli.api_url.as_deref(),
        cli.drain_policy,
    )?;
    let db_path = resolve_db_path(cli.db_path);
    let service = open_service(config, &db_path).await?;

    match cli.command {
        Commands::Restaurants {
            cuisine,
            neighborhood,
            json,
        } => run_restaurants(&service, &cuisine, &neighborhood, json).await?,
        Commands::Show { target, json } => run_show(&service, &target, json).await?,
        Commands::Neighborhoods { json } => run_neighborhoods(&service, json).await?,
        Commands::Cuisines { json } => run_cuisines(&service, json).await?,
        Commands::Favourites { json } => run_favourites(&service, json).await?,
        Commands::Favourite { id, remove } => run_favourite(&service, id, remove).await?,
        Commands::Reviews(command) => match command {
            ReviewCommands::List {
                restaurant_id,
                cached,
                json,
            } => run_list(&service, restaurant_id, cached, json).await?,
            ReviewCommands::Add {
                restaurant_id,
                name,
                rating,
                comments,
            } => run_add(&service, restaurant_id, &name, rating, &comments).await?,
            ReviewCommands::Edit {
                key,
                name,
                rating,
                comments,
            } => run_edit(&service, &key, name.as_deref(), rating, &comments).await?,
            ReviewCommands::Delete { key } => run_delete(&service, &key).await?,
        },
        Commands::Queue { json } => run_queue(&service, json).await?,
        Commands::Sync { watch } => run_sync(&service, watch).await?,
        Commands::Completions { shell, output } => run_completions(shell, output.as_deref())?,
    }

    Ok(())
}

fn log_directive(raw: &str) -> Result<tracing_subscriber::filter::Directive, CliError> {
    raw.parse::<tracing_subscriber::filter::Directive>()
        .map_err(|error| CliError::Config(format!("invalid log directive '{raw}': {error}")))
}
