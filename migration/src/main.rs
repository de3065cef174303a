use crate::{
    domain::migration::Migration,
    infrastructure::{persistence::PersistenceAdapter, settings::Settings},
};
use editorial_common::database;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod domain;
pub mod infrastructure;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::from_env()?;

    let database = database::connect(&settings.database).await?;
    tracing::info!(schema = database.database_schema(), "connected to database");
    let persistence = PersistenceAdapter::new(database);

    // create the editorial tables that do not exist yet
    let migration = Migration::new(persistence);
    migration.migrate().await?;
    tracing::info!("editorial schema migrated");

    Ok(())
}
