//! Database pool metrics sampling.
//!
//! A background task samples the connection pool on an interval and records gauges, so pool
//! exhaustion during a burst of analytics recomputes shows up on `/internal/metrics`.

use std::time::Duration;

use metrics::gauge;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Configuration for pool metrics sampling
#[derive(Debug, Clone)]
pub struct PoolMetricsConfig {
    /// How often to sample pool metrics
    pub sample_interval: Duration,
}

impl Default for PoolMetricsConfig {
    fn default() -> Self {
        Self {
            sample_interval: Duration::from_secs(5),
        }
    }
}

impl From<&crate::Config> for PoolMetricsConfig {
    fn from(config: &crate::Config) -> Self {
        Self {
            sample_interval: config.pool_metrics_sample_interval,
        }
    }
}

/// Run the pool metrics sampler until `shutdown` is cancelled.
///
/// Records, labeled with `pool`:
/// - `fincare_db_pool_connections_total` - Total connections in the pool
/// - `fincare_db_pool_connections_idle` - Idle connections available
/// - `fincare_db_pool_connections_in_use` - Connections currently in use
/// - `fincare_db_pool_connections_max` - Maximum configured connections
pub async fn run_pool_metrics_sampler(
    name: &'static str,
    pool: PgPool,
    config: PoolMetricsConfig,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    info!(
        pool = name,
        "Starting pool metrics sampler with {:?} interval", config.sample_interval
    );

    // Max connections is fixed for the pool's lifetime
    let max = pool.options().get_max_connections();
    gauge!("fincare_db_pool_connections_max", "pool" => name).set(max as f64);

    let mut interval = tokio::time::interval(config.sample_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Pool metrics sampler shutting down");
                break;
            }
            _ = interval.tick() => {
                let size = pool.size();
                let idle = pool.num_idle();
                let in_use = (size as usize).saturating_sub(idle);

                gauge!("fincare_db_pool_connections_total", "pool" => name).set(size as f64);
                gauge!("fincare_db_pool_connections_idle", "pool" => name).set(idle as f64);
                gauge!("fincare_db_pool_connections_in_use", "pool" => name).set(in_use as f64);

                debug!(pool = name, size, idle, in_use, "Sampled pool metrics");
            }
        }
    }

    Ok(())
}
