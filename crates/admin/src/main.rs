//! Followable admin entry point.

mod cli;
mod commands;

use std::sync::Arc;

use clap::Parser;
use followable_common::Config;
use followable_core::{DatabaseStore, TypeRegistry};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands};
use crate::commands::Context;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Logs go to stderr so command output stays pipeable.
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "followable=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let config = Config::load()?;

    let db = followable_db::init(&config).await?;
    info!("Connected to database");

    if matches!(cli.command, Commands::Migrate) {
        info!("Running database migrations...");
        followable_db::migrate(&db).await?;
        info!("Migrations completed");
        return Ok(());
    }

    let registry = TypeRegistry::from_names(&config.follow.types)?;
    if registry.is_empty() {
        warn!("No followable types configured (follow.types); every mutation will be rejected");
    }

    let context = Context::new(
        Arc::new(DatabaseStore::new(Arc::new(db))),
        registry,
        config.follow.resolution_policy,
        cli.output,
    );

    let mut stdout = std::io::stdout().lock();
    if let Err(e) = context.execute(cli.command, &mut stdout).await {
        e.log();
        return Err(e.into());
    }

    Ok(())
}
