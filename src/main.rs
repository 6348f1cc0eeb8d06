use dotenvy::dotenv;
use handoff_ledger::{
    config::{database, settings},
    core::{product, profile},
    errors::Result,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();

    // 3. Load config.toml (or CONFIG_PATH)
    let app_config = settings::load_default_config()
        .inspect_err(|e| error!("Failed to load configuration: {}", e))?;
    info!(
        "Loaded configuration: {} admins, {} products, checkup reward {}, history window {} days",
        app_config.admins.len(),
        app_config.products.len(),
        app_config.ledger.checkup_reward,
        app_config.ledger.history_window_days
    );

    // 4. Connect and create tables
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db)
        .await
        .inspect(|()| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to create tables: {}", e))?;

    // 5. Bootstrap admins and seed the catalog
    for admin_id in &app_config.admins {
        profile::ensure_admin(&db, admin_id).await?;
    }
    let seeded = product::seed_products(&db, &app_config.products)
        .await
        .inspect_err(|e| error!("Failed to seed products: {}", e))?;

    let catalog = product::list_products(&db).await?;
    info!(
        "Ready: {} products in catalog ({} newly seeded), {} profiles awaiting approval",
        catalog.len(),
        seeded,
        profile::list_pending_approvals(&db).await?.len()
    );

    Ok(())
}
