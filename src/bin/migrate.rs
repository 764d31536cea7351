//! Standalone migration runner: `cargo run --bin migrate`.

use batch_inventory_api as api;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let db_url = std::env::var("APP__DATABASE_URL")
        .unwrap_or_else(|_| "sqlite://batch_inventory.db?mode=rwc".to_string());

    api::migrator::run_migration(&db_url).await
}
