//! In-memory connection for tests. Statements are routed to the table whose
//! name appears in the SQL; a trailing `col IN (...)` predicate filters rows.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use super::{ColumnMeta, Connection, Driver, Placeholder, RowSink};
use crate::config::{
    Cardinality, ConnectorConfig, ConstraintsConfig, LocationConfig, LocationKind, MatchStrategy,
    ParameterConfig, PoolConfig, RelationConfig, RelationTargetConfig, ResourceConfig, SchemaConfig,
    TemplateConfig, ViewConfig,
};
use crate::error::ConnectorError;
use crate::value::{Key, Value};
use crate::view::Environment;

struct Table {
    source: String,
    columns: Vec<ColumnMeta>,
    rows: Vec<Vec<Value>>,
    failure: Option<String>,
    stalled: bool,
}

#[derive(Default)]
pub(crate) struct MemoryConnection {
    tables: Vec<Table>,
    statements: Mutex<Vec<String>>,
    entered: Notify,
}

impl MemoryConnection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(mut self, source: &str, columns: Vec<ColumnMeta>, rows: Vec<Vec<Value>>) -> Self {
        self.tables.push(Table {
            source: source.to_string(),
            columns,
            rows,
            failure: None,
            stalled: false,
        });
        self
    }

    /// A table whose queries fail with `message`.
    pub fn failing(mut self, source: &str, columns: Vec<ColumnMeta>, message: &str) -> Self {
        self.tables.push(Table {
            source: source.to_string(),
            columns,
            rows: Vec::new(),
            failure: Some(message.to_string()),
            stalled: false,
        });
        self
    }

    /// A table whose queries never complete.
    pub fn stalled(mut self, source: &str, columns: Vec<ColumnMeta>) -> Self {
        self.tables.push(Table {
            source: source.to_string(),
            columns,
            rows: Vec::new(),
            failure: None,
            stalled: true,
        });
        self
    }

    /// Resolves once a query has reached a stalled table.
    pub async fn entered(&self) {
        self.entered.notified().await
    }

    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().map(|s| s.clone()).unwrap_or_default()
    }

    fn route(&self, sql: &str) -> Result<&Table, ConnectorError> {
        self.tables
            .iter()
            .filter(|t| contains_word(sql, &t.source))
            .max_by_key(|t| t.source.len())
            .ok_or_else(|| ConnectorError::Other(format!("no table for {}", sql)))
    }

    fn record(&self, sql: &str) {
        if let Ok(mut statements) = self.statements.lock() {
            statements.push(sql.to_string());
        }
    }
}

fn contains_word(text: &str, word: &str) -> bool {
    let is_ident = |c: char| c.is_alphanumeric() || c == '_';
    text.match_indices(word).any(|(start, _)| {
        let before = text[..start].chars().next_back();
        let after = text[start + word.len()..].chars().next();
        !before.is_some_and(is_ident) && !after.is_some_and(is_ident)
    })
}

/// Column named by a `col IN (` predicate, if any.
fn in_column(sql: &str) -> Option<&str> {
    let at = sql.rfind(" IN (")?;
    let head = sql[..at].trim_end();
    let start = head
        .rfind(|c: char| !(c.is_alphanumeric() || c == '_' || c == '.'))
        .map(|i| i + 1)
        .unwrap_or(0);
    let column = &head[start..];
    Some(column.rsplit('.').next().unwrap_or(column))
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn columns(&self, sql: &str, _args: &[Value]) -> Result<Vec<ColumnMeta>, ConnectorError> {
        self.record(sql);
        Ok(self.route(sql)?.columns.clone())
    }

    async fn query(
        &self,
        sql: &str,
        args: &[Value],
        sink: &mut (dyn RowSink + Send),
    ) -> Result<(), ConnectorError> {
        self.record(sql);
        let table = self.route(sql)?;
        if let Some(message) = &table.failure {
            return Err(ConnectorError::Other(message.clone()));
        }
        if table.stalled {
            self.entered.notify_one();
            std::future::pending::<()>().await;
        }
        let filter = match in_column(sql) {
            Some(column) if !args.is_empty() => table
                .columns
                .iter()
                .position(|c| c.name == column)
                .map(|index| (index, args.iter().filter_map(Key::from_value).collect::<Vec<_>>())),
            _ => None,
        };
        for row in &table.rows {
            if let Some((index, keys)) = &filter {
                match Key::from_value(&row[*index]) {
                    Some(key) if keys.contains(&key) => {}
                    _ => continue,
                }
            }
            sink.new_item()?;
            for (meta, value) in table.columns.iter().zip(row) {
                *sink.slot(&meta.name) = value.clone();
            }
            sink.item_done()?;
        }
        Ok(())
    }
}

pub(crate) struct MemoryDriver {
    connection: Arc<MemoryConnection>,
    opened: AtomicUsize,
}

impl MemoryDriver {
    pub fn new(connection: Arc<MemoryConnection>) -> Self {
        MemoryDriver {
            connection,
            opened: AtomicUsize::new(0),
        }
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Driver for MemoryDriver {
    fn placeholder(&self) -> Placeholder {
        Placeholder::Question
    }

    async fn open(&self, _dsn: &str, _pool: &PoolConfig) -> Result<Arc<dyn Connection>, ConnectorError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        Ok(self.connection.clone())
    }
}

/// Environment whose `memory` driver serves `connection`.
pub fn environment(connection: Arc<MemoryConnection>) -> Environment {
    let env = Environment::default();
    env.connections
        .register("memory", Arc::new(MemoryDriver::new(connection)));
    env
}

pub fn connector_config() -> ConnectorConfig {
    ConnectorConfig {
        name: "shop".into(),
        driver: "memory".into(),
        dsn: "memory://shop".into(),
        ..Default::default()
    }
}

/// Orders with line items (many) and a user (one).
pub fn shop() -> MemoryConnection {
    let int = |name: &str, nullable| ColumnMeta::new(name, "INT8", Some(nullable));
    let text = |name: &str| ColumnMeta::new(name, "TEXT", Some(true));
    MemoryConnection::new()
        .table(
            "orders",
            vec![int("id", false), int("user_id", true), text("status")],
            vec![
                vec![Value::Int(1), Value::Int(7), "OPEN".into()],
                vec![Value::Int(2), Value::Int(7), "CLOSED".into()],
                vec![Value::Int(3), Value::Int(8), "OPEN".into()],
            ],
        )
        .table(
            "line_items",
            vec![int("id", false), int("order_id", false), text("sku")],
            vec![
                vec![Value::Int(10), Value::Int(1), "A".into()],
                vec![Value::Int(11), Value::Int(1), "B".into()],
                vec![Value::Int(12), Value::Int(2), "C".into()],
                vec![Value::Int(13), Value::Int(99), "Z".into()],
            ],
        )
        .table(
            "users",
            vec![int("id", false), text("name")],
            vec![
                vec![Value::Int(7), "ann".into()],
                vec![Value::Int(8), "bob".into()],
            ],
        )
}

pub fn shop_environment() -> (Environment, Arc<MemoryConnection>) {
    let connection = Arc::new(shop());
    (environment(Arc::clone(&connection)), connection)
}

/// `orders` view over the shop tables; both relations use `strategy`.
pub fn shop_config(strategy: MatchStrategy) -> ResourceConfig {
    let child = |name: &str, table: &str| ViewConfig {
        name: name.into(),
        table: Some(table.into()),
        ..Default::default()
    };
    let orders = ViewConfig {
        name: "orders".into(),
        table: Some("orders".into()),
        connector: Some(ConnectorConfig {
            reference: Some("shop".into()),
            ..Default::default()
        }),
        constraints: Some(ConstraintsConfig {
            criteria: true,
            order_by: true,
            limit: true,
            offset: true,
            page: true,
            filterable_columns: vec!["status".into()],
        }),
        template: Some(TemplateConfig {
            source: None,
            parameters: vec![ParameterConfig {
                name: "user_id".into(),
                location: Some(LocationConfig {
                    kind: LocationKind::Query,
                    name: "user_id".into(),
                }),
                schema: Some(SchemaConfig {
                    data_type: Some("int".into()),
                    ..Default::default()
                }),
                ..Default::default()
            }],
        }),
        criteria: Some("#if($Has.user_id)user_id = $user_id#end".into()),
        with: vec![
            RelationConfig {
                name: "items".into(),
                holder: "Items".into(),
                cardinality: Cardinality::Many,
                column: "id".into(),
                match_strategy: Some(strategy),
                of: RelationTargetConfig {
                    view: child("", "line_items"),
                    column: "order_id".into(),
                },
                ..Default::default()
            },
            RelationConfig {
                name: "user".into(),
                holder: "User".into(),
                cardinality: Cardinality::One,
                column: "user_id".into(),
                match_strategy: Some(strategy),
                of: RelationTargetConfig {
                    view: child("", "users"),
                    column: "id".into(),
                },
                ..Default::default()
            },
        ],
        ..Default::default()
    };
    ResourceConfig {
        connectors: vec![connector_config()],
        views: vec![orders],
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_by_whole_word() {
        assert!(contains_word("SELECT t.* FROM orders t", "orders"));
        assert!(!contains_word("SELECT t.* FROM orders_archive t", "orders"));
        assert_eq!(in_column("SELECT * FROM x t WHERE order_id IN (?, ?)"), Some("order_id"));
        assert_eq!(in_column("SELECT * FROM x t WHERE t.order_id IN (?)"), Some("order_id"));
    }
}
