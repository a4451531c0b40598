use std::sync::Arc;
use std::time::Duration;

use fleet::config::FleetConfig;
use fleet::resource_manager::ResourceManager;
use timetable::store::sqlite_store::SqliteFleetStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    common::logger::init_logger("fleet");

    let config = FleetConfig::from_env();
    tracing::info!(?config, "starting fleet");

    let store = Arc::new(SqliteFleetStore::new(&config.database_url).await?);

    let (manager, bidders) = ResourceManager::setup(&config, store.clone(), store.clone()).await?;

    for bidder in bidders {
        tokio::spawn(bidder.run());
    }
    tokio::spawn(manager.run(Duration::from_millis(500)));

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");

    Ok(())
}
