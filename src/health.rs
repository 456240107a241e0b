use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub dependencies: HashMap<String, DependencyStatus>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DependencyStatus {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[async_trait]
pub trait DependencyChecker: Send + Sync {
    async fn check(&self) -> DependencyStatus;
    fn name(&self) -> &'static str;
}

pub struct PostgresChecker {
    pool: sqlx::PgPool,
}

impl PostgresChecker {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DependencyChecker for PostgresChecker {
    async fn check(&self) -> DependencyStatus {
        let start = Instant::now();
        match sqlx::query("SELECT 1").execute(&self.pool).await {
            Ok(_) => DependencyStatus {
                status: "healthy".to_string(),
                latency_ms: Some(start.elapsed().as_millis() as u64),
                error: None,
            },
            Err(e) => DependencyStatus {
                status: "unhealthy".to_string(),
                latency_ms: None,
                error: Some(e.to_string()),
            },
        }
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}

pub struct HorizonChecker {
    client: crate::stellar::HorizonClient,
}

impl HorizonChecker {
    pub fn new(client: crate::stellar::HorizonClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DependencyChecker for HorizonChecker {
    async fn check(&self) -> DependencyStatus {
        let start = Instant::now();
        match self.client.ping().await {
            Ok(_) => DependencyStatus {
                status: "healthy".to_string(),
                latency_ms: Some(start.elapsed().as_millis() as u64),
                error: None,
            },
            Err(e) => DependencyStatus {
                status: "unhealthy".to_string(),
                latency_ms: None,
                error: Some(e.to_string()),
            },
        }
    }

    fn name(&self) -> &'static str {
        "horizon"
    }
}

pub async fn check_health(
    postgres: PostgresChecker,
    horizon: HorizonChecker,
    start_time: Instant,
) -> HealthResponse {
    let check_timeout = Duration::from_secs(5);
    let checkers: Vec<Box<dyn DependencyChecker>> = vec![Box::new(postgres), Box::new(horizon)];

    let futures = checkers.iter().map(|checker| {
        let name = checker.name().to_string();
        async move {
            match timeout(check_timeout, checker.check()).await {
                Ok(status) => (name, status),
                Err(_) => (
                    name,
                    DependencyStatus {
                        status: "unhealthy".to_string(),
                        latency_ms: None,
                        error: Some("timeout".to_string()),
                    },
                ),
            }
        }
    });

    let results = futures::future::join_all(futures).await;
    let mut dependencies = HashMap::new();
    let mut healthy_count = 0;
    let mut total_count = 0;

    for (name, status) in results {
        if status.status == "healthy" {
            healthy_count += 1;
        }
        total_count += 1;
        dependencies.insert(name, status);
    }

    let overall_status = if healthy_count == total_count {
        "healthy"
    } else if healthy_count > 0 {
        "degraded"
    } else {
        "unhealthy"
    };

    HealthResponse {
        status: overall_status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: start_time.elapsed().as_secs(),
        dependencies,
    }
}
