pub mod profiles;

use bigdecimal::BigDecimal;
use dotenvy::dotenv;
use profiles::{Profile, ProfileDefaults};
use serde::Deserialize;
use std::env;
use std::str::FromStr;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: String,
    pub database_max_connections: u32,
    pub horizon_url: String,
    /// Per-request timeout against the ledger API, seconds.
    pub horizon_timeout_secs: u64,
    pub sync_page_size: u32,
    /// Inter-page delay honouring upstream rate limits, milliseconds.
    pub sync_page_delay_ms: u64,
    pub sync_max_pages: u32,
    /// Fee rate added on top of incoming payments, e.g. 0.02.
    pub payment_fee_rate: BigDecimal,
    /// Fee rate withheld from withdrawals, e.g. 0.02.
    pub withdrawal_fee_rate: BigDecimal,
    pub asset_code: String,
    pub cors_allowed_origins: Option<String>,
}

pub struct ConfigInfo {
    pub config: Config,
    pub profile: Profile,
    pub overrides: Vec<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<ConfigInfo> {
        dotenv().ok();

        let profile = Profile::from_env();
        let defaults = ProfileDefaults::for_profile(profile);
        let mut overrides = Vec::new();

        let server_port = env::var("SERVER_PORT")
            .ok()
            .and_then(|v| {
                overrides.push("SERVER_PORT".to_string());
                v.parse().ok()
            })
            .unwrap_or(defaults.server_port);

        let database_url = env::var("DATABASE_URL").or_else(|_| {
            defaults
                .database_url
                .ok_or_else(|| anyhow::anyhow!("DATABASE_URL must be set"))
        })?;
        if env::var("DATABASE_URL").is_ok() {
            overrides.push("DATABASE_URL".to_string());
        }

        let database_max_connections =
            parse_env("DATABASE_MAX_CONNECTIONS", 10, &mut overrides)?;

        let horizon_url = env::var("HORIZON_URL")
            .ok()
            .map(|v| {
                overrides.push("HORIZON_URL".to_string());
                v
            })
            .unwrap_or(defaults.horizon_url);

        let horizon_timeout_secs = parse_env("HORIZON_TIMEOUT_SECS", 10, &mut overrides)?;
        let sync_page_size = parse_env("SYNC_PAGE_SIZE", 50, &mut overrides)?;
        let sync_page_delay_ms = parse_env("SYNC_PAGE_DELAY_MS", 100, &mut overrides)?;
        let sync_max_pages = parse_env("SYNC_MAX_PAGES", 200, &mut overrides)?;

        let payment_fee_rate = parse_rate("PAYMENT_FEE_RATE", "0.02", &mut overrides)?;
        let withdrawal_fee_rate = parse_rate("WITHDRAWAL_FEE_RATE", "0.02", &mut overrides)?;

        let asset_code = env::var("ASSET_CODE")
            .ok()
            .map(|v| {
                overrides.push("ASSET_CODE".to_string());
                v
            })
            .unwrap_or_else(|| "native".to_string());

        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .ok()
            .map(|v| {
                overrides.push("CORS_ALLOWED_ORIGINS".to_string());
                Some(v)
            })
            .unwrap_or(defaults.cors_allowed_origins);

        Ok(ConfigInfo {
            config: Config {
                server_port,
                database_url,
                database_max_connections,
                horizon_url,
                horizon_timeout_secs,
                sync_page_size,
                sync_page_delay_ms,
                sync_max_pages,
                payment_fee_rate,
                withdrawal_fee_rate,
                asset_code,
                cors_allowed_origins,
            },
            profile,
            overrides,
        })
    }
}

fn parse_env<T: FromStr>(
    name: &'static str,
    default: T,
    overrides: &mut Vec<String>,
) -> anyhow::Result<T> {
    match env::var(name) {
        Ok(raw) => {
            overrides.push(name.to_string());
            raw.parse()
                .map_err(|_| anyhow::anyhow!("{} must be a number, got {:?}", name, raw))
        }
        Err(_) => Ok(default),
    }
}

fn parse_rate(
    name: &'static str,
    default: &str,
    overrides: &mut Vec<String>,
) -> anyhow::Result<BigDecimal> {
    let raw = match env::var(name) {
        Ok(raw) => {
            overrides.push(name.to_string());
            raw
        }
        Err(_) => default.to_string(),
    };
    let rate = BigDecimal::from_str(&raw)
        .map_err(|e| anyhow::anyhow!("{} must be a decimal rate: {}", name, e))?;
    if rate < BigDecimal::from(0) || rate >= BigDecimal::from(1) {
        anyhow::bail!("{} must be within [0, 1), got {}", name, rate);
    }
    Ok(rate)
}
