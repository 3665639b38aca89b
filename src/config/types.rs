//! Raw resource config types matching the JSON resource document.

use serde::{Deserialize, Serialize};

use crate::case::CaseFormat;

/// A whole resource document: connectors, views, shared parameters and named types.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceConfig {
    pub connectors: Vec<ConnectorConfig>,
    pub views: Vec<ViewConfig>,
    pub parameters: Vec<ParameterConfig>,
    pub types: Vec<TypeDefinition>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectorConfig {
    pub name: String,
    /// Name of a resource-level connector to use instead of the inline fields.
    #[serde(rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    pub driver: String,
    pub dsn: String,
    pub pool: PoolConfig,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub max_connections: Option<u32>,
    pub min_connections: Option<u32>,
    pub idle_timeout_ms: Option<u64>,
    pub max_lifetime_ms: Option<u64>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    pub name: String,
    /// Base view whose configuration fills every field left unset here.
    #[serde(rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    pub connector: Option<ConnectorConfig>,
    pub alias: Option<String>,
    pub table: Option<String>,
    pub from: Option<String>,
    pub columns: Vec<ColumnConfig>,
    pub exclude: Vec<String>,
    pub case_format: Option<CaseFormat>,
    pub criteria: Option<String>,
    pub selector: Option<SelectorConfig>,
    pub constraints: Option<ConstraintsConfig>,
    pub template: Option<TemplateConfig>,
    pub schema: Option<SchemaConfig>,
    pub with: Vec<RelationConfig>,
    pub match_strategy: Option<MatchStrategy>,
    pub batch: Option<BatchConfig>,
    pub cache: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnConfig {
    pub name: String,
    pub data_type: Option<String>,
    pub nullable: Option<bool>,
    pub codec: Option<String>,
    pub format: Option<String>,
    pub default: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Prefix of the `_fields`, `_limit`, ... request keys addressed to this view.
    pub namespace: Option<String>,
    pub order_by: Option<String>,
    pub limit: Option<usize>,
}

/// Which request-driven selector adjustments a view accepts.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstraintsConfig {
    pub criteria: bool,
    pub order_by: bool,
    pub limit: bool,
    pub offset: bool,
    pub page: bool,
    /// Columns usable in `_fields` and `_criteria`; `*` means all.
    pub filterable_columns: Vec<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    pub source: Option<String>,
    pub parameters: Vec<ParameterConfig>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// Named type from the resource `types` registry.
    pub name: Option<String>,
    pub data_type: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cardinality {
    #[default]
    One,
    Many,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    /// Read after the parent, filtered by the parent's key values.
    #[default]
    #[serde(alias = "sequential")]
    ReadMatched,
    /// Read concurrently with the parent; matched after both finish.
    #[serde(alias = "parallel")]
    ReadAll,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Maximum number of parent keys per child query.
    pub parent: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        BatchConfig { parent: 10_000 }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationConfig {
    pub name: String,
    /// Field on the parent record that receives the matched child rows.
    pub holder: String,
    pub cardinality: Cardinality,
    /// Parent-side join column.
    pub column: String,
    /// Keep the join column as a field when the child is a One relation.
    pub include_column: bool,
    pub match_strategy: Option<MatchStrategy>,
    pub of: RelationTargetConfig,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationTargetConfig {
    #[serde(flatten)]
    pub view: ViewConfig,
    /// Child-side join column.
    pub column: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterConfig {
    pub name: String,
    /// Resource-level parameter this one inherits from.
    #[serde(rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    pub presence_name: Option<String>,
    #[serde(rename = "in")]
    pub location: Option<LocationConfig>,
    pub required: Option<bool>,
    pub schema: Option<SchemaConfig>,
    pub codec: Option<String>,
    pub format: Option<String>,
    pub description: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationConfig {
    pub kind: LocationKind,
    #[serde(default)]
    pub name: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationKind {
    Query,
    Path,
    Header,
    Cookie,
    #[serde(alias = "request_body")]
    Body,
    #[serde(alias = "dataview")]
    DataView,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeDefinition {
    pub name: String,
    pub fields: Vec<TypeField>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeField {
    pub name: String,
    pub column: Option<String>,
    pub data_type: String,
    pub nullable: bool,
}
