//! Process-wide connection cache. Concurrent opens of the same target share one attempt.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::sync::OnceCell;

use super::postgres::PgDriver;
use super::{Connection, Connector, Driver};
use crate::config::{ConnectorConfig, PoolConfig};
use crate::error::{ConfigError, ConnectorError};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct PoolKey {
    driver: String,
    dsn: String,
    pool: PoolConfig,
}

type Slot = Arc<OnceCell<Arc<dyn Connection>>>;

#[derive(Default)]
struct Inner {
    drivers: RwLock<HashMap<String, Arc<dyn Driver>>>,
    slots: Mutex<HashMap<PoolKey, Slot>>,
}

#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    inner: Arc<Inner>,
}

impl ConnectionRegistry {
    /// Registry with the built-in `postgres` driver.
    pub fn new() -> Self {
        let registry = Self::default();
        registry.register("postgres", Arc::new(PgDriver));
        registry
    }

    /// Registers `driver` under `name`, replacing any earlier one.
    /// A poisoned driver map is recovered; entries are single inserts.
    pub fn register(&self, name: &str, driver: Arc<dyn Driver>) {
        let mut drivers = self.inner.drivers.write().unwrap_or_else(|poisoned| {
            tracing::warn!(driver = %name, "driver map was poisoned, recovering");
            poisoned.into_inner()
        });
        drivers.insert(name.to_string(), driver);
    }

    fn driver(&self, name: &str) -> Result<Arc<dyn Driver>, ConnectorError> {
        let drivers = self.inner.drivers.read().unwrap_or_else(PoisonError::into_inner);
        drivers
            .get(name)
            .cloned()
            .ok_or_else(|| ConnectorError::UnknownDriver(name.to_string()))
    }

    /// Validates an inline connector definition and returns a live connector for it.
    pub async fn connect(&self, config: &ConnectorConfig) -> Result<Connector, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidConnector {
            name: config.name.clone(),
            reason,
        };
        if config.driver.is_empty() {
            return Err(invalid("driver was empty".into()));
        }
        if config.dsn.is_empty() {
            return Err(invalid("dsn was empty".into()));
        }
        let driver = self.driver(&config.driver).map_err(|e| invalid(e.to_string()))?;
        let connection = self
            .open(&driver, config)
            .await
            .map_err(|e| invalid(e.to_string()))?;
        Ok(Connector::new(
            config.name.clone(),
            config.driver.clone(),
            config.dsn.clone(),
            driver.placeholder(),
            connection,
        ))
    }

    async fn open(
        &self,
        driver: &Arc<dyn Driver>,
        config: &ConnectorConfig,
    ) -> Result<Arc<dyn Connection>, ConnectorError> {
        let key = PoolKey {
            driver: config.driver.clone(),
            dsn: config.dsn.clone(),
            pool: config.pool.clone(),
        };
        let slot = {
            let mut slots = self
                .inner
                .slots
                .lock()
                .map_err(|_| ConnectorError::Other("connection registry poisoned".into()))?;
            Arc::clone(slots.entry(key).or_default())
        };
        let connection = slot
            .get_or_try_init(|| async {
                tracing::info!(driver = %config.driver, connector = %config.name, "opening connection pool");
                driver.open(&config.dsn, &config.pool).await
            })
            .await?;
        Ok(Arc::clone(connection))
    }
}
