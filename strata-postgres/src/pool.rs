//! Connection pool shared by the catalog reader and the executor.

use std::sync::Arc;
use std::time::Duration;

use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod, Runtime};
use tokio_postgres::NoTls;
use tracing::{debug, info};

use crate::config::PgConfig;
use crate::error::{PgError, PgResult};

/// A pooled connection. Statements prepared through
/// [`prepare_cached`](deadpool_postgres::ClientWrapper::prepare_cached) stay
/// cached on it, so each batch shape is planned once per connection.
pub type PgConnection = Object;

/// Pool sizing and timeouts.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of connections.
    pub max_connections: usize,
    /// How long to wait for a free connection, and to open a new one.
    pub wait_timeout: Option<Duration>,
    /// How long recycling an idle connection may take.
    pub recycle_timeout: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            wait_timeout: Some(Duration::from_secs(30)),
            recycle_timeout: Some(Duration::from_secs(5)),
        }
    }
}

impl PoolConfig {
    /// Set the maximum number of connections.
    pub fn with_max_connections(mut self, n: usize) -> Self {
        self.max_connections = n;
        self
    }

    /// Set the wait timeout.
    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = Some(timeout);
        self
    }
}

/// Pool occupancy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStatus {
    /// Idle connections.
    pub available: usize,
    /// Open connections.
    pub size: usize,
    /// Upper bound on open connections.
    pub max_size: usize,
    /// Tasks waiting for a connection.
    pub waiting: usize,
}

/// A PostgreSQL connection pool. Cheap to clone.
#[derive(Clone)]
pub struct PgPool {
    inner: Pool,
    config: Arc<PgConfig>,
}

impl std::fmt::Debug for PgPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgPool")
            .field("endpoint", &self.config.endpoint)
            .field("status", &self.status())
            .finish()
    }
}

impl PgPool {
    /// Create a pool. Connections open lazily, so no server is contacted here.
    pub fn new(config: PgConfig, pool: PoolConfig) -> PgResult<Self> {
        let manager = Manager::from_config(
            config.to_pg_config(),
            NoTls,
            ManagerConfig {
                recycling_method: RecyclingMethod::Fast,
            },
        );
        let inner = Pool::builder(manager)
            .max_size(pool.max_connections)
            .runtime(Runtime::Tokio1)
            .wait_timeout(pool.wait_timeout)
            .create_timeout(pool.wait_timeout)
            .recycle_timeout(pool.recycle_timeout)
            .build()
            .map_err(|e| PgError::config(format!("failed to create pool: {}", e)))?;

        info!(
            endpoint = %config.endpoint,
            max_connections = pool.max_connections,
            "Created connection pool"
        );
        Ok(Self {
            inner,
            config: Arc::new(config),
        })
    }

    /// Create a pool with default sizing from a database URL.
    pub fn connect(url: &str) -> PgResult<Self> {
        Self::new(PgConfig::from_url(url)?, PoolConfig::default())
    }

    /// Check out a connection.
    pub async fn get(&self) -> PgResult<PgConnection> {
        let conn = self.inner.get().await?;
        debug!(available = self.inner.status().available, "Checked out connection");
        Ok(conn)
    }

    /// Current occupancy.
    pub fn status(&self) -> PoolStatus {
        let status = self.inner.status();
        PoolStatus {
            available: status.available as usize,
            size: status.size as usize,
            max_size: status.max_size as usize,
            waiting: status.waiting,
        }
    }

    /// The connection settings.
    pub fn config(&self) -> &PgConfig {
        &self.config
    }

    /// Round-trip a trivial statement.
    pub async fn ping(&self) -> PgResult<()> {
        self.get().await?.simple_query("SELECT 1").await?;
        Ok(())
    }

    /// Close the pool. Checked-out connections close when returned.
    pub fn close(&self) {
        self.inner.close();
        info!(endpoint = %self.config.endpoint, "Closed connection pool");
    }
}
