use axum::http::HeaderValue;
use clap::Parser;
use sqlx::migrate::Migrator;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;

use lumenpay_core::cli::{Cli, Commands};
use lumenpay_core::config::Config;
use lumenpay_core::db::postgres::PgStore;
use lumenpay_core::domain::fees::FeePolicy;
use lumenpay_core::services::{PaymentHandshake, PgNotifier, TracingMailer, WithdrawalWorkflow};
use lumenpay_core::stellar::HorizonClient;

/// OpenAPI Schema for the Lumenpay Core API
#[derive(OpenApi)]
#[openapi(
    paths(
        lumenpay_core::handlers::health,
    ),
    components(
        schemas(
            lumenpay_core::health::HealthResponse,
            lumenpay_core::health::DependencyStatus,
        )
    ),
    info(
        title = "Lumenpay Core API",
        version = "0.1.0",
        description = "Merchant payment processing and ledger reconciliation API for Stellar-compatible networks",
        contact(name = "Lumenpay Team")
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
    )
)]
pub struct ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config_info = Config::from_env()?;
    let config = config_info.config;

    // Setup logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        None | Some(Commands::Serve) => serve(config).await,
        Some(Commands::Sync {
            account,
            cursor,
            format,
        }) => lumenpay_core::cli::handle_sync(&config, &account, cursor, &format).await,
        Some(Commands::Withdrawal(command)) => {
            lumenpay_core::cli::handle_withdrawal(&config, &command).await
        }
        Some(Commands::Db(lumenpay_core::cli::DbCommands::Migrate)) => {
            lumenpay_core::cli::handle_db_migrate(&config).await
        }
        Some(Commands::Config) => {
            println!("Profile: {}", config_info.profile.as_str());
            println!("Server port: {}", config.server_port);
            println!("Horizon URL: {}", config.horizon_url);
            println!("Asset code: {}", config.asset_code);
            println!("Payment fee rate: {}", config.payment_fee_rate);
            println!("Withdrawal fee rate: {}", config.withdrawal_fee_rate);
            if config_info.overrides.is_empty() {
                println!("No environment overrides");
            } else {
                println!(
                    "Environment overrides: {}",
                    config_info.overrides.join(", ")
                );
            }
            Ok(())
        }
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    // Database pool
    let pool = lumenpay_core::db::create_pool(&config).await?;

    // Run migrations
    let migrator = Migrator::new(Path::new("./migrations")).await?;
    migrator.run(&pool).await?;
    tracing::info!("Database migrations completed");

    let horizon_client = HorizonClient::new(
        config.horizon_url.clone(),
        Duration::from_secs(config.horizon_timeout_secs),
    );

    let store = Arc::new(PgStore::new(pool.clone()));
    let notifier = Arc::new(PgNotifier::new(pool.clone()));
    let mailer = Arc::new(TracingMailer);

    let handshake = Arc::new(PaymentHandshake::new(
        store.clone(),
        horizon_client.clone(),
        FeePolicy::FlatPercent(config.payment_fee_rate.clone()),
        config.asset_code.clone(),
    ));
    let withdrawals = Arc::new(WithdrawalWorkflow::new(
        store,
        notifier,
        mailer,
        config.withdrawal_fee_rate.clone(),
    ));

    let app_state = lumenpay_core::AppState {
        db: pool,
        horizon_client,
        handshake,
        withdrawals,
        sync_config: lumenpay_core::cli::build_sync_config(&config),
        start_time: std::time::Instant::now(),
    };

    let cors = match &config.cors_allowed_origins {
        Some(origins) => {
            let list: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|origin| origin.trim().parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(list))
                .allow_methods(Any)
                .allow_headers(Any)
        }
        None => CorsLayer::permissive(),
    };

    let app = lumenpay_core::create_app(app_state).layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}
