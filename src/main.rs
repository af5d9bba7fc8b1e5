use dotenvy::dotenv;
use pos_buddy::{
    config::{self, database},
    core::{
        catalog,
        report::{self, Period},
    },
    errors::Result,
    register::Register,
};
use std::env;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file (non-fatal, env vars can be set externally)
    dotenv().ok();

    // 3. Load settings
    let settings = config::load_default_settings()
        .inspect_err(|e| error!("Failed to load configuration: {e}"))?;
    info!(store = %settings.store.name, "Configuration loaded");

    // 4. Connect and make sure the schema exists
    let database_url = database::get_database_url(&settings);
    let db = database::create_connection(&database_url)
        .await
        .inspect_err(|e| error!("Failed to connect to database: {e}"))?;
    database::create_tables(&db)
        .await
        .inspect(|_| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to create tables: {e}"))?;

    // 5. Seed an empty catalog from config.toml
    catalog::seed_catalog(&db, &settings)
        .await
        .inspect_err(|e| error!("Failed to seed catalog: {e}"))?;

    // 6. Open the register
    let mut register = Register::open(db, settings).await?;
    if let Some(notice) = register.take_notice() {
        warn!("{notice}");
    }

    let currency = register.settings().store.currency.clone();
    let today = register.report(&Period::Today);
    info!(
        transactions = today.totals.transaction_count,
        revenue = %report::format_amount(today.totals.total_revenue, &currency),
        average = %report::format_amount(today.totals.average_transaction, &currency),
        best_seller = %today.totals.best_seller,
        "Today's sales"
    );
    for share in &today.payment_breakdown {
        info!(
            method = share.method.label(),
            count = share.count,
            percentage = %share.percentage.round_dp(1),
            "Payment share"
        );
    }
    for product in register.low_stock() {
        warn!(product = %product.name, stock = product.stock, "Low stock");
    }

    // 7. Optional export: `pos-buddy <path.csv>`
    if let Some(path) = env::args().nth(1) {
        let rows = register.export(&Period::All, &path)?;
        info!("Exported {rows} transactions to {path}");
    }

    Ok(())
}
