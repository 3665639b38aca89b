//! Views: named, connector-bound data sources with columns, a template,
//! a synthesized record type and relations to child views.

mod column;
mod parameter;
mod relation;
mod resource;
mod schema;

pub use column::{Column, Columns};
pub use parameter::{Location, Parameter};
pub use relation::Relation;
pub use resource::{Environment, Resource};

use std::sync::Arc;

use crate::case::CaseFormat;
use crate::config::{ConstraintsConfig, MatchStrategy, SelectorConfig, ViewConfig};
use crate::connector::Connector;
use crate::template::Template;
use crate::value::RecordType;

pub const DEFAULT_ALIAS: &str = "t";

#[derive(Debug)]
pub struct View {
    pub name: String,
    pub alias: String,
    pub table: Option<String>,
    pub from: Option<String>,
    pub columns: Vec<Column>,
    columns_index: Columns,
    pub case_format: Option<CaseFormat>,
    pub selector: SelectorConfig,
    pub constraints: ConstraintsConfig,
    pub template: Template,
    pub schema: Arc<RecordType>,
    pub relations: Vec<Relation>,
    pub match_strategy: MatchStrategy,
    pub connector: Arc<Connector>,
    /// Maximum number of parent keys per batched child query.
    pub batch_size: usize,
    pub cache: bool,
    config: ViewConfig,
}

impl View {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns_index.lookup(name).map(|i| &self.columns[i])
    }

    pub fn config(&self) -> &ViewConfig {
        &self.config
    }

    /// Prefix of the request selector keys addressed to this view.
    pub fn namespace(&self) -> Option<&str> {
        self.selector.namespace.as_deref().filter(|ns| !ns.is_empty())
    }

    /// Columns always selected: parent-side join columns of the relations.
    pub fn key_columns(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = Vec::new();
        for rel in &self.relations {
            if !keys.contains(&rel.column.as_str()) {
                keys.push(&rel.column);
            }
        }
        keys
    }

    /// This view followed by every view reachable through relations.
    pub fn tree(self: &Arc<Self>) -> Vec<Arc<View>> {
        let mut out = vec![Arc::clone(self)];
        let mut i = 0;
        while i < out.len() {
            let children: Vec<Arc<View>> = out[i].relations.iter().map(|r| Arc::clone(&r.view)).collect();
            for child in children {
                if !out.iter().any(|v| Arc::ptr_eq(v, &child)) {
                    out.push(child);
                }
            }
            i += 1;
        }
        out
    }
}
