//! Database access seam: drivers open connections, connections describe and stream rows.

#[cfg(test)]
pub(crate) mod memory;
pub mod postgres;
mod registry;

pub use registry::ConnectionRegistry;

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use crate::config::PoolConfig;
use crate::error::{CollectorError, ConnectorError};
use crate::value::Value;

/// A result column as reported by the driver.
#[derive(Clone, Debug, PartialEq)]
pub struct ColumnMeta {
    pub name: String,
    pub type_name: String,
    /// `None` when the driver cannot tell.
    pub nullable: Option<bool>,
}

impl ColumnMeta {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>, nullable: Option<bool>) -> Self {
        ColumnMeta {
            name: name.into(),
            type_name: type_name.into(),
            nullable,
        }
    }
}

/// Receives scanned rows: one `new_item`, a `slot` per column, then `item_done`.
pub trait RowSink: Send {
    fn new_item(&mut self) -> Result<(), CollectorError>;
    fn slot(&mut self, column: &str) -> &mut Value;
    fn item_done(&mut self) -> Result<(), CollectorError>;
}

#[async_trait]
pub trait Connection: Send + Sync {
    /// Column metadata of a statement without reading rows.
    async fn columns(&self, sql: &str, args: &[Value]) -> Result<Vec<ColumnMeta>, ConnectorError>;

    /// Runs a statement and streams every row into `sink`.
    async fn query(
        &self,
        sql: &str,
        args: &[Value],
        sink: &mut (dyn RowSink + Send),
    ) -> Result<(), ConnectorError>;
}

#[async_trait]
pub trait Driver: Send + Sync {
    fn placeholder(&self) -> Placeholder;

    async fn open(&self, dsn: &str, pool: &PoolConfig) -> Result<Arc<dyn Connection>, ConnectorError>;
}

/// Bind-parameter syntax of a driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Placeholder {
    /// `$1`, `$2`, ...
    Dollar,
    /// `?`
    Question,
}

impl Placeholder {
    pub fn render(self, position: usize) -> String {
        match self {
            Placeholder::Dollar => format!("${}", position),
            Placeholder::Question => "?".to_string(),
        }
    }
}

/// A resolved connector: its identity plus a shared live connection.
#[derive(Clone)]
pub struct Connector {
    pub name: String,
    pub driver: String,
    pub dsn: String,
    placeholder: Placeholder,
    connection: Arc<dyn Connection>,
}

impl Connector {
    pub(crate) fn new(
        name: String,
        driver: String,
        dsn: String,
        placeholder: Placeholder,
        connection: Arc<dyn Connection>,
    ) -> Self {
        Connector {
            name,
            driver,
            dsn,
            placeholder,
            connection,
        }
    }

    pub fn placeholder(&self) -> Placeholder {
        self.placeholder
    }

    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }
}

impl fmt::Debug for Connector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connector")
            .field("name", &self.name)
            .field("driver", &self.driver)
            .finish_non_exhaustive()
    }
}
