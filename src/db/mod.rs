pub mod memory;
pub mod models;
pub mod postgres;
pub mod queries;

use crate::config::Config;
use sqlx::postgres::PgPoolOptions;

pub async fn create_pool(config: &Config) -> anyhow::Result<sqlx::PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;
    Ok(pool)
}
