use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::config::Config;
use crate::db::postgres::PgStore;
use crate::services::ledger_sync::{LedgerSyncEngine, SyncConfig};
use crate::services::{PgNotifier, TracingMailer, WithdrawalWorkflow};
use crate::stellar::HorizonClient;

#[derive(Parser)]
#[command(name = "lumenpay-core")]
#[command(about = "Lumenpay Core - Merchant payments and ledger reconciliation", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Run a ledger reconciliation sync for an account
    Sync {
        /// Ledger account to sync
        #[arg(value_name = "ACCOUNT")]
        account: String,

        /// Resume from a raw paging token
        #[arg(long)]
        cursor: Option<String>,

        /// Output format (json or text)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Withdrawal management commands
    #[command(subcommand)]
    Withdrawal(WithdrawalCommands),

    /// Database management commands
    #[command(subcommand)]
    Db(DbCommands),

    /// Configuration validation
    Config,
}

#[derive(Subcommand)]
pub enum WithdrawalCommands {
    /// Approve a pending withdrawal
    Approve {
        /// Withdrawal UUID
        #[arg(value_name = "WITHDRAWAL_ID")]
        withdrawal_id: Uuid,

        /// External transaction reference for the payout
        #[arg(long)]
        tx_ref: Option<String>,
    },

    /// Reject a pending withdrawal
    Reject {
        /// Withdrawal UUID
        #[arg(value_name = "WITHDRAWAL_ID")]
        withdrawal_id: Uuid,
    },
}

#[derive(Subcommand)]
pub enum DbCommands {
    /// Run database migrations
    Migrate,
}

pub fn build_sync_config(config: &Config) -> SyncConfig {
    SyncConfig {
        page_size: config.sync_page_size,
        page_delay: Duration::from_millis(config.sync_page_delay_ms),
        max_pages: config.sync_max_pages,
    }
}

pub async fn handle_sync(
    config: &Config,
    account: &str,
    cursor: Option<String>,
    format: &str,
) -> anyhow::Result<()> {
    let horizon = HorizonClient::new(
        config.horizon_url.clone(),
        Duration::from_secs(config.horizon_timeout_secs),
    );
    let engine = LedgerSyncEngine::new(horizon, build_sync_config(config));
    let report = engine.sync_operations(account, cursor).await;

    match format {
        "json" => {
            let response = crate::schemas::OperationListResponse {
                account: account.to_string(),
                operations: report.operations.into_iter().map(Into::into).collect(),
                next_cursor: report
                    .last_cursor
                    .as_deref()
                    .map(|token| crate::utils::cursor::encode(account, token)),
                pages_fetched: report.pages_fetched,
                partial: report.error.is_some(),
                error: report.error.as_ref().map(|e| e.to_string()),
                error_kind: report.error.as_ref().map(|e| e.kind().to_string()),
            };
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        _ => {
            println!(
                "Synced {} operation(s) across {} page(s) for {}",
                report.operations.len(),
                report.pages_fetched,
                account
            );
            for op in &report.operations {
                println!(
                    "  {}  {}  {}  {}  {}",
                    op.ledger_time.to_rfc3339(),
                    op.kind,
                    op.amount
                        .as_ref()
                        .map(|a| a.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                    op.asset_code,
                    op.tx_hash
                );
            }
            if let Some(cursor) = &report.last_cursor {
                println!("Last cursor: {}", cursor);
            }
            if let Some(err) = &report.error {
                println!("⚠ Partial result: {}", err);
            }
        }
    }

    if let Some(err) = report.error {
        anyhow::bail!("sync run ended early: {}", err);
    }
    Ok(())
}

pub async fn handle_withdrawal(
    config: &Config,
    command: &WithdrawalCommands,
) -> anyhow::Result<()> {
    let pool = crate::db::create_pool(config).await?;
    let store = Arc::new(PgStore::new(pool.clone()));
    let notifier = Arc::new(PgNotifier::new(pool));
    let mailer = Arc::new(TracingMailer);
    let workflow = WithdrawalWorkflow::new(
        store,
        notifier,
        mailer,
        config.withdrawal_fee_rate.clone(),
    );

    match command {
        WithdrawalCommands::Approve {
            withdrawal_id,
            tx_ref,
        } => {
            let approval = workflow
                .approve(*withdrawal_id, tx_ref.clone())
                .await
                .map_err(|e| anyhow::anyhow!("{}", e))?;
            println!(
                "✓ Withdrawal {} approved: gross {}, fee {}, net {} to {}",
                approval.withdrawal.id,
                approval.withdrawal.amount,
                approval.fee_amount,
                approval.net_amount,
                approval.withdrawal.destination
            );
        }
        WithdrawalCommands::Reject { withdrawal_id } => {
            let rejection = workflow
                .reject(*withdrawal_id)
                .await
                .map_err(|e| anyhow::anyhow!("{}", e))?;
            println!("✓ Withdrawal {} rejected", rejection.withdrawal.id);
        }
    }
    Ok(())
}

pub async fn handle_db_migrate(config: &Config) -> anyhow::Result<()> {
    use sqlx::migrate::Migrator;
    use std::path::Path;

    let pool = crate::db::create_pool(config).await?;
    let migrator = Migrator::new(Path::new("./migrations")).await?;

    tracing::info!("Running database migrations...");
    migrator.run(&pool).await?;

    tracing::info!("Database migrations completed");
    println!("✓ Database migrations completed");

    Ok(())
}
