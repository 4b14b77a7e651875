use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::time::Duration;

/// Health status of a service or dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, HealthStatus::Degraded)
    }

    pub fn is_unhealthy(&self) -> bool {
        matches!(self, HealthStatus::Unhealthy)
    }
}

/// Health status of a single dependency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyHealth {
    pub name: String,
    pub status: HealthStatus,
    pub latency_ms: Option<f64>,
    pub message: Option<String>,
}

impl DependencyHealth {
    pub fn healthy(name: impl Into<String>, latency_ms: f64) -> Self {
        Self {
            name: name.into(),
            status: HealthStatus::Healthy,
            latency_ms: Some(latency_ms),
            message: None,
        }
    }

    pub fn degraded(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: HealthStatus::Degraded,
            latency_ms: None,
            message: Some(message.into()),
        }
    }

    pub fn unhealthy(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: HealthStatus::Unhealthy,
            latency_ms: None,
            message: Some(message.into()),
        }
    }
}

/// Aggregated health check result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedHealth {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub dependencies: Vec<DependencyHealth>,
}

impl AggregatedHealth {
    pub fn new(version: String, uptime_seconds: u64, dependencies: Vec<DependencyHealth>) -> Self {
        let status = Self::aggregate_status(&dependencies);
        Self {
            status,
            version,
            uptime_seconds,
            dependencies,
        }
    }

    fn aggregate_status(dependencies: &[DependencyHealth]) -> HealthStatus {
        let has_unhealthy = dependencies.iter().any(|d| d.status.is_unhealthy());
        let has_degraded = dependencies.iter().any(|d| d.status.is_degraded());

        if has_unhealthy {
            HealthStatus::Unhealthy
        } else if has_degraded {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }
}

/// Health checker for the database and Redis.
pub struct HealthChecker {
    pool: PgPool,
    redis_client: redis::Client,
    start_time: std::time::Instant,
}

impl HealthChecker {
    pub fn new(pool: PgPool, redis_client: redis::Client) -> Self {
        Self {
            pool,
            redis_client,
            start_time: std::time::Instant::now(),
        }
    }

    /// Performs a full health check of all dependencies.
    pub async fn check_all(&self) -> AggregatedHealth {
        let dependencies = vec![self.check_database().await, self.check_redis().await];

        AggregatedHealth::new(
            env!("CARGO_PKG_VERSION").to_string(),
            self.start_time.elapsed().as_secs(),
            dependencies,
        )
    }

    /// Checks database connectivity.
    pub async fn check_database(&self) -> DependencyHealth {
        let start = std::time::Instant::now();

        match tokio::time::timeout(
            Duration::from_secs(5),
            sqlx::query("SELECT 1").fetch_one(&self.pool),
        )
        .await
        {
            Ok(Ok(_)) => {
                let latency = start.elapsed().as_secs_f64() * 1000.0;
                if latency > 100.0 {
                    DependencyHealth {
                        name: "database".to_string(),
                        status: HealthStatus::Degraded,
                        latency_ms: Some(latency),
                        message: Some("High latency detected".to_string()),
                    }
                } else {
                    DependencyHealth::healthy("database", latency)
                }
            }
            Ok(Err(e)) => DependencyHealth::unhealthy("database", format!("Query failed: {}", e)),
            Err(_) => DependencyHealth::unhealthy("database", "Connection timeout"),
        }
    }

    /// Checks Redis connectivity.
    pub async fn check_redis(&self) -> DependencyHealth {
        let start = std::time::Instant::now();

        match self.redis_client.get_multiplexed_async_connection().await {
            Ok(mut conn) => {
                match tokio::time::timeout(
                    Duration::from_secs(5),
                    redis::cmd("PING").query_async::<_, ()>(&mut conn),
                )
                .await
                {
                    Ok(Ok(_)) => {
                        let latency = start.elapsed().as_secs_f64() * 1000.0;
                        if latency > 50.0 {
                            DependencyHealth {
                                name: "redis".to_string(),
                                status: HealthStatus::Degraded,
                                latency_ms: Some(latency),
                                message: Some("High latency detected".to_string()),
                            }
                        } else {
                            DependencyHealth::healthy("redis", latency)
                        }
                    }
                    Ok(Err(e)) => DependencyHealth::unhealthy("redis", format!("PING failed: {}", e)),
                    Err(_) => DependencyHealth::unhealthy("redis", "PING timeout"),
                }
            }
            Err(e) => DependencyHealth::unhealthy("redis", format!("Connection failed: {}", e)),
        }
    }

    /// Liveness check.
    pub fn is_alive(&self) -> bool {
        true
    }

    /// Readiness check. The cache is optional, so degraded Redis still
    /// counts as ready.
    pub async fn is_ready(&self) -> bool {
        let db_health = self.check_database().await;
        let redis_health = self.check_redis().await;

        db_health.status.is_healthy()
            && (redis_health.status.is_healthy() || redis_health.status.is_degraded())
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
