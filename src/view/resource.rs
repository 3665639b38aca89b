//! Resource initialization: ref inheritance, connector resolution, column
//! detection, schema synthesis and relation wiring for every view.

use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::Arc;

use super::schema::{self, HolderSpec};
use super::{Column, Columns, Location, Parameter, Relation, View, DEFAULT_ALIAS};
use crate::codec::{CodecRef, CodecRegistry};
use crate::config::{
    validate, BatchConfig, ColumnConfig, LocationKind, ParameterConfig, ResourceConfig, ViewConfig,
};
use crate::connector::{ConnectionRegistry, Connector};
use crate::error::{ConfigError, Error};
use crate::sql;
use crate::template::Template;
use crate::value::{DataType, FieldType, RecordType};

/// Services shared by every resource of a process.
#[derive(Clone)]
pub struct Environment {
    pub connections: ConnectionRegistry,
    pub codecs: CodecRegistry,
}

impl Default for Environment {
    fn default() -> Self {
        Environment {
            connections: ConnectionRegistry::new(),
            codecs: CodecRegistry::new(),
        }
    }
}

/// A set of initialized views.
#[derive(Debug)]
pub struct Resource {
    views: HashMap<String, Arc<View>>,
    order: Vec<String>,
}

impl Resource {
    pub async fn init(config: &ResourceConfig, env: &Environment) -> Result<Resource, ConfigError> {
        validate(config)?;
        let mut types = HashMap::with_capacity(config.types.len());
        for def in &config.types {
            types.insert(def.name.clone(), Arc::new(schema::named_type(def)?));
        }
        let mut init = Initializer {
            config,
            env,
            types,
            states: HashMap::new(),
        };
        let mut views = HashMap::with_capacity(config.views.len());
        for view in &config.views {
            let initialized = init.named(&view.name).await?;
            views.insert(view.name.clone(), initialized);
        }
        tracing::info!(views = views.len(), "resource initialized");
        Ok(Resource {
            views,
            order: config.views.iter().map(|v| v.name.clone()).collect(),
        })
    }

    pub fn view(&self, name: &str) -> Result<&Arc<View>, Error> {
        self.views
            .get(name)
            .ok_or_else(|| Error::NotFound(format!("view {}", name)))
    }

    /// Views in declaration order.
    pub fn views(&self) -> impl Iterator<Item = &Arc<View>> {
        self.order.iter().filter_map(|name| self.views.get(name))
    }
}

enum State {
    Initializing,
    Initialized(Arc<View>),
}

struct Initializer<'a> {
    config: &'a ResourceConfig,
    env: &'a Environment,
    types: HashMap<String, Arc<RecordType>>,
    states: HashMap<String, State>,
}

impl<'a> Initializer<'a> {
    /// Initializes a top-level view once; reaching a view that is still initializing is a cycle.
    fn named<'s>(&'s mut self, name: &'s str) -> BoxFuture<'s, Result<Arc<View>, ConfigError>> {
        Box::pin(async move {
            match self.states.get(name) {
                Some(State::Initialized(view)) => return Ok(Arc::clone(view)),
                Some(State::Initializing) => return Err(ConfigError::CyclicReference(name.to_string())),
                None => {}
            }
            let config = self
                .config
                .views
                .iter()
                .find(|v| v.name == name)
                .cloned()
                .ok_or_else(|| ConfigError::MissingReference {
                    kind: "view",
                    id: name.to_string(),
                })?;
            self.states.insert(name.to_string(), State::Initializing);
            let view = self.view(config, None).await?;
            self.states
                .insert(name.to_string(), State::Initialized(Arc::clone(&view)));
            Ok(view)
        })
    }

    fn view(
        &mut self,
        config: ViewConfig,
        parent_connector: Option<Arc<Connector>>,
    ) -> BoxFuture<'_, Result<Arc<View>, ConfigError>> {
        Box::pin(async move {
            let mut config = config;
            if config.name.is_empty() {
                return Err(ConfigError::Validation("view name was empty".into()));
            }
            let mut base_connector = None;
            if let Some(base_name) = config.reference.clone() {
                let base = self.named(&base_name).await?;
                config = inherit(config, &base);
                base_connector = Some(Arc::clone(&base.connector));
            }
            let connector = self
                .connector(&config, base_connector.or(parent_connector))
                .await?;

            let mut children = Vec::with_capacity(config.with.len());
            for rel in &config.with {
                let mut child = rel.of.view.clone();
                if child.name.is_empty() {
                    child.name = format!("{}#rel:{}", config.name, rel.name);
                }
                children.push(self.view(child, Some(Arc::clone(&connector))).await?);
            }

            let mut parameters = Vec::new();
            if let Some(template) = &config.template {
                for param in &template.parameters {
                    parameters.push(self.parameter(param).await?);
                }
            }
            let source = source_of(&config)?;
            let template = Template::new(&config.name, &source, config.criteria.as_deref(), parameters)
                .map_err(|source| ConfigError::Template {
                    view: config.name.clone(),
                    source,
                })?;

            let mut columns = if config.columns.is_empty() {
                detect_columns(&config, &template, &connector).await?
            } else {
                self.declared_columns(&config)?
            };
            columns.retain(|c| !config.exclude.iter().any(|e| e.eq_ignore_ascii_case(&c.name)));
            let columns_index = Columns::index(&columns);
            let constraints = config.constraints.clone().unwrap_or_default();
            for name in &constraints.filterable_columns {
                if name == "*" {
                    columns.iter_mut().for_each(|c| c.filterable = true);
                    continue;
                }
                let position = columns_index.lookup(name).ok_or_else(|| ConfigError::ColumnNotFound {
                    view: config.name.clone(),
                    column: name.clone(),
                })?;
                columns[position].filterable = true;
            }

            let mut joins = Vec::with_capacity(children.len());
            for (rel, child) in config.with.iter().zip(&children) {
                let column = columns_index
                    .lookup(&rel.column)
                    .map(|i| columns[i].name.clone())
                    .ok_or_else(|| ConfigError::ColumnNotFound {
                        view: config.name.clone(),
                        column: rel.column.clone(),
                    })?;
                let of_column = child
                    .column(&rel.of.column)
                    .map(|c| c.name.clone())
                    .ok_or_else(|| ConfigError::ColumnNotFound {
                        view: child.name.clone(),
                        column: rel.of.column.clone(),
                    })?;
                joins.push((column, of_column));
            }

            let schema = match config.schema.as_ref().and_then(|s| s.name.as_ref()) {
                Some(type_name) => self.types.get(type_name).cloned().ok_or_else(|| {
                    ConfigError::MissingReference {
                        kind: "type",
                        id: type_name.clone(),
                    }
                })?,
                None => {
                    let holders: Vec<HolderSpec<'_>> = config
                        .with
                        .iter()
                        .zip(&children)
                        .zip(&joins)
                        .map(|((rel, child), (column, _))| HolderSpec {
                            holder: &rel.holder,
                            cardinality: rel.cardinality,
                            column,
                            include_column: rel.include_column,
                            child: &child.schema,
                        })
                        .collect();
                    Arc::new(schema::synthesize(&config.name, &columns, &holders, config.case_format)?)
                }
            };

            let mut relations = Vec::with_capacity(children.len());
            for ((rel, child), (column, of_column)) in config.with.iter().zip(children).zip(joins) {
                let holder_index = schema.index_of(&rel.holder).ok_or_else(|| ConfigError::MissingReference {
                    kind: "holder",
                    id: format!("{}.{}", config.name, rel.holder),
                })?;
                relations.push(Relation {
                    name: rel.name.clone(),
                    holder: rel.holder.clone(),
                    cardinality: rel.cardinality,
                    column,
                    of_column,
                    include_column: rel.include_column,
                    match_strategy: rel.match_strategy.unwrap_or(child.match_strategy),
                    view: child,
                    holder_index,
                });
            }

            let batch_size = config
                .batch
                .as_ref()
                .map(|b| b.parent)
                .filter(|n| *n > 0)
                .unwrap_or_else(|| BatchConfig::default().parent);
            let view = View {
                name: config.name.clone(),
                alias: config.alias.clone().unwrap_or_else(|| DEFAULT_ALIAS.to_string()),
                table: config.table.clone(),
                from: config.from.clone(),
                columns,
                columns_index,
                case_format: config.case_format,
                selector: config.selector.clone().unwrap_or_default(),
                constraints,
                template,
                schema,
                relations,
                match_strategy: config.match_strategy.unwrap_or_default(),
                connector,
                batch_size,
                cache: config.cache,
                config,
            };
            check_body_types(&view)?;
            tracing::debug!(view = %view.name, columns = view.columns.len(), relations = view.relations.len(), "view initialized");
            Ok(Arc::new(view))
        })
    }

    /// Explicit connector, then the base or structural parent's, then the
    /// connector of any view whose relations reference this one.
    async fn connector(
        &self,
        config: &ViewConfig,
        inherited: Option<Arc<Connector>>,
    ) -> Result<Arc<Connector>, ConfigError> {
        if let Some(connector) = &config.connector {
            return self.connect(connector).await;
        }
        if let Some(connector) = inherited {
            return Ok(connector);
        }
        let referrer = self.config.views.iter().find(|v| {
            v.connector.is_some()
                && v.with
                    .iter()
                    .any(|rel| rel.of.view.reference.as_deref() == Some(config.name.as_str()))
        });
        match referrer.and_then(|v| v.connector.as_ref()) {
            Some(connector) => self.connect(connector).await,
            None => Err(ConfigError::InvalidConnector {
                name: config.name.clone(),
                reason: "no connector defined or inherited".into(),
            }),
        }
    }

    async fn connect(&self, connector: &crate::config::ConnectorConfig) -> Result<Arc<Connector>, ConfigError> {
        let resolved = match &connector.reference {
            Some(name) => self
                .config
                .connectors
                .iter()
                .find(|c| &c.name == name)
                .ok_or_else(|| ConfigError::MissingReference {
                    kind: "connector",
                    id: name.clone(),
                })?,
            None => connector,
        };
        Ok(Arc::new(self.env.connections.connect(resolved).await?))
    }

    fn codec(&self, name: &str) -> Result<CodecRef, ConfigError> {
        self.env.codecs.lookup(name).ok_or_else(|| ConfigError::MissingReference {
            kind: "codec",
            id: name.to_string(),
        })
    }

    fn declared_columns(&self, config: &ViewConfig) -> Result<Vec<Column>, ConfigError> {
        config
            .columns
            .iter()
            .map(|c| {
                let type_name = c.data_type.clone().unwrap_or_default();
                let mut column = Column::new(&c.name, &type_name, c.nullable != Some(false));
                if !type_name.is_empty() && column.data_type.is_none() {
                    return Err(ConfigError::Validation(format!(
                        "view {}: column {} has unknown data type {}",
                        config.name, c.name, type_name
                    )));
                }
                column.codec = c.codec.as_deref().map(|name| self.codec(name)).transpose()?;
                column.format = c.format.clone();
                column.default = c.default.clone();
                Ok(column)
            })
            .collect()
    }

    fn parameter<'s>(&'s mut self, config: &'s ParameterConfig) -> BoxFuture<'s, Result<Parameter, ConfigError>> {
        Box::pin(async move {
            let config = self.inherit_parameter(config)?;
            let location = config.location.clone().ok_or_else(|| {
                ConfigError::Validation(format!("parameter {}: location was empty", config.name))
            })?;
            let view = match location.kind {
                LocationKind::DataView => Some(self.named(&location.name).await?),
                _ => None,
            };
            let schema = config.schema.clone().unwrap_or_default();
            let ty = if let Some(type_name) = &schema.name {
                let ty = self.types.get(type_name).cloned().ok_or_else(|| ConfigError::MissingReference {
                    kind: "type",
                    id: type_name.clone(),
                })?;
                FieldType::One(ty)
            } else if let Some(data_type) = &schema.data_type {
                let data_type = DataType::parse(data_type).ok_or_else(|| {
                    ConfigError::Validation(format!(
                        "parameter {}: unknown data type {}",
                        config.name, data_type
                    ))
                })?;
                FieldType::scalar(data_type)
            } else if let Some(view) = &view {
                FieldType::One(Arc::clone(&view.schema))
            } else {
                return Err(ConfigError::Validation(format!(
                    "parameter {}: schema was empty",
                    config.name
                )));
            };
            let mut parameter = Parameter::new(&config.name, Location::new(location.kind, &location.name), ty)
                .required(config.required.unwrap_or(false));
            if let Some(presence) = config.presence_name.as_ref().filter(|p| !p.is_empty()) {
                parameter.presence_name = presence.clone();
            }
            parameter.format = config.format.clone();
            parameter.codec = config.codec.as_deref().map(|name| self.codec(name)).transpose()?;
            parameter.view = view;
            parameter.description = config.description.clone();
            Ok(parameter)
        })
    }

    /// Follows the `ref` chain of a parameter, filling unset fields from each base.
    fn inherit_parameter(&self, config: &ParameterConfig) -> Result<ParameterConfig, ConfigError> {
        let mut merged = config.clone();
        let mut seen = vec![merged.name.clone()];
        while let Some(base_name) = merged.reference.take() {
            if seen.contains(&base_name) {
                return Err(ConfigError::CyclicReference(format!("parameter {}", base_name)));
            }
            let base = self
                .config
                .parameters
                .iter()
                .find(|p| p.name == base_name)
                .ok_or_else(|| ConfigError::MissingReference {
                    kind: "parameter",
                    id: base_name.clone(),
                })?;
            seen.push(base_name);
            if merged.name.is_empty() {
                merged.name = base.name.clone();
            }
            merged.reference = base.reference.clone();
            merged.presence_name = merged.presence_name.or_else(|| base.presence_name.clone());
            merged.location = merged.location.or_else(|| base.location.clone());
            merged.required = merged.required.or(base.required);
            merged.schema = merged.schema.or_else(|| base.schema.clone());
            merged.codec = merged.codec.or_else(|| base.codec.clone());
            merged.format = merged.format.or_else(|| base.format.clone());
            merged.description = merged.description.or_else(|| base.description.clone());
        }
        if merged.name.is_empty() {
            return Err(ConfigError::Validation("parameter name was empty".into()));
        }
        Ok(merged)
    }
}

/// Fills every field the view leaves unset from its base view.
fn inherit(mut config: ViewConfig, base: &View) -> ViewConfig {
    let from = base.config();
    config.alias = config.alias.or_else(|| from.alias.clone());
    config.table = config.table.or_else(|| from.table.clone());
    config.from = config.from.or_else(|| from.from.clone());
    config.case_format = config.case_format.or(from.case_format);
    config.criteria = config.criteria.or_else(|| from.criteria.clone());
    config.selector = config.selector.or_else(|| from.selector.clone());
    config.constraints = config.constraints.or_else(|| from.constraints.clone());
    config.template = config.template.or_else(|| from.template.clone());
    config.schema = config.schema.or_else(|| from.schema.clone());
    config.match_strategy = config.match_strategy.or(from.match_strategy);
    config.batch = config.batch.or_else(|| from.batch.clone());
    config.cache = config.cache || from.cache;
    if config.columns.is_empty() {
        config.columns = base.columns.iter().map(Column::to_config).collect::<Vec<ColumnConfig>>();
    }
    if config.exclude.is_empty() {
        config.exclude = from.exclude.clone();
    }
    if config.with.is_empty() {
        config.with = from.with.clone();
    }
    config
}

/// SQL source of a view: the template source, the `from` query, or the table.
fn source_of(config: &ViewConfig) -> Result<String, ConfigError> {
    if let Some(source) = config.template.as_ref().and_then(|t| t.source.as_ref()) {
        return Ok(format!("({})", source.trim()));
    }
    if let Some(from) = &config.from {
        return Ok(format!("({})", from.trim()));
    }
    if let Some(table) = &config.table {
        return Ok(table.clone());
    }
    Err(ConfigError::Validation(format!(
        "view {}: table or from is required",
        config.name
    )))
}

/// Probes the view source for its columns. When both `from` and `table` are set,
/// `from` decides the column set and the table fills nullability and unknown types.
async fn detect_columns(
    config: &ViewConfig,
    template: &Template,
    connector: &Connector,
) -> Result<Vec<Column>, ConfigError> {
    let source = template.probe_source().map_err(|source| ConfigError::Template {
        view: config.name.clone(),
        source,
    })?;
    let probe = |source: &str| sql::probe(source);
    let probe_error = |source| ConfigError::Probe {
        view: config.name.clone(),
        source,
    };
    let metas = connector
        .connection()
        .columns(&probe(&source), &[])
        .await
        .map_err(probe_error)?;
    let mut columns: Vec<Column> = metas.into_iter().map(Column::from_meta).collect();

    if let (Some(_), Some(table)) = (&config.from, &config.table) {
        let table_metas = connector
            .connection()
            .columns(&probe(table), &[])
            .await
            .map_err(probe_error)?;
        for column in &mut columns {
            let Some(meta) = table_metas.iter().find(|m| m.name.eq_ignore_ascii_case(&column.name)) else {
                continue;
            };
            if let Some(nullable) = meta.nullable {
                column.nullable = nullable;
            }
            if column.data_type.is_none() {
                column.data_type = DataType::parse(&meta.type_name);
                column.type_name = meta.type_name.clone();
            }
        }
    }
    tracing::debug!(view = %config.name, columns = columns.len(), "detected columns");
    Ok(columns)
}

/// Body-bound parameters anywhere in a view tree must agree on one type.
fn check_body_types(view: &View) -> Result<(), ConfigError> {
    let mut found: Option<&FieldType> = None;
    let mut stack = vec![view];
    while let Some(current) = stack.pop() {
        for param in current.template.parameters() {
            if param.location.kind != LocationKind::Body || !param.location.name.is_empty() {
                continue;
            }
            match found {
                Some(first) if *first != param.ty => {
                    return Err(ConfigError::BodyTypeMismatch {
                        view: view.name.clone(),
                        first: first.to_string(),
                        second: param.ty.to_string(),
                    })
                }
                Some(_) => {}
                None => found = Some(&param.ty),
            }
        }
        stack.extend(current.relations.iter().map(|r| r.view.as_ref()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConstraintsConfig, MatchStrategy, SchemaConfig, TemplateConfig};
    use crate::connector::memory::{self, MemoryConnection};
    use crate::value::Value;

    #[tokio::test]
    async fn initializes_views_with_relations() {
        let (env, _) = memory::shop_environment();
        let resource = Resource::init(&memory::shop_config(MatchStrategy::ReadMatched), &env)
            .await
            .unwrap();
        let orders = resource.view("orders").unwrap();
        assert_eq!(orders.columns.len(), 3);
        assert_eq!(orders.relations.len(), 2);
        let names: Vec<&str> = orders.schema.fields().iter().map(|f| f.name.as_str()).collect();
        // One relation hides user_id
        assert_eq!(names, vec!["Id", "Status", "Items", "User"]);
        let items = &orders.relations[0];
        assert_eq!(items.view.name, "orders#rel:items");
        assert_eq!(items.of_column, "order_id");
        assert_eq!(items.holder_index(), 2);
        assert!(Arc::ptr_eq(&items.view.connector, &orders.connector));
        assert!(orders.column("STATUS").unwrap().filterable);
        assert_eq!(orders.template.parameters().len(), 1);
        assert!(resource.view("nope").is_err());
    }

    #[tokio::test]
    async fn relations_fall_back_to_the_child_strategy() {
        let (env, _) = memory::shop_environment();
        let mut config = memory::shop_config(MatchStrategy::ReadMatched);
        let items = &mut config.views[0].with[0];
        items.match_strategy = None;
        items.of.view.match_strategy = Some(MatchStrategy::ReadAll);
        let resource = Resource::init(&config, &env).await.unwrap();
        let orders = resource.view("orders").unwrap();
        assert_eq!(orders.relations[0].view.match_strategy, MatchStrategy::ReadAll);
        assert_eq!(orders.relations[0].match_strategy, MatchStrategy::ReadAll);
        assert_eq!(orders.relations[1].match_strategy, MatchStrategy::ReadMatched);
    }

    #[tokio::test]
    async fn ref_views_inherit_from_base() {
        let (env, _) = memory::shop_environment();
        let mut config = memory::shop_config(MatchStrategy::ReadMatched);
        config.views.push(ViewConfig {
            name: "open_orders".into(),
            reference: Some("orders".into()),
            criteria: Some("status = 'OPEN'".into()),
            ..Default::default()
        });
        let resource = Resource::init(&config, &env).await.unwrap();
        let open = resource.view("open_orders").unwrap();
        assert_eq!(open.table.as_deref(), Some("orders"));
        assert_eq!(open.columns.len(), 3);
        assert_eq!(open.relations.len(), 2);
        assert_eq!(open.config().criteria.as_deref(), Some("status = 'OPEN'"));
    }

    #[tokio::test]
    async fn data_view_cycles_are_rejected() {
        let (env, _) = memory::shop_environment();
        let mut config = memory::shop_config(MatchStrategy::ReadMatched);
        let orders = &mut config.views[0];
        orders.template = Some(TemplateConfig {
            source: None,
            parameters: vec![ParameterConfig {
                name: "me".into(),
                location: Some(crate::config::LocationConfig {
                    kind: LocationKind::DataView,
                    name: "orders".into(),
                }),
                ..Default::default()
            }],
        });
        let err = Resource::init(&config, &env).await.unwrap_err();
        assert!(matches!(err, ConfigError::CyclicReference(name) if name == "orders"));
    }

    #[tokio::test]
    async fn from_with_table_takes_nullability_from_table() {
        let connection = MemoryConnection::new()
            .table(
                "report",
                vec![
                    crate::connector::ColumnMeta::new("id", "INT8", None),
                    crate::connector::ColumnMeta::new("label", "UNKNOWN", None),
                ],
                vec![],
            )
            .table(
                "items",
                vec![
                    crate::connector::ColumnMeta::new("id", "INT8", Some(false)),
                    crate::connector::ColumnMeta::new("label", "TEXT", Some(true)),
                ],
                vec![],
            );
        let env = memory::environment(Arc::new(connection));
        let config = ResourceConfig {
            connectors: vec![memory::connector_config()],
            views: vec![ViewConfig {
                name: "report".into(),
                connector: Some(crate::config::ConnectorConfig {
                    reference: Some("shop".into()),
                    ..Default::default()
                }),
                from: Some("SELECT id, label FROM report".into()),
                table: Some("items".into()),
                ..Default::default()
            }],
            ..Default::default()
        };
        let resource = Resource::init(&config, &env).await.unwrap();
        let report = resource.view("report").unwrap();
        let id = report.column("id").unwrap();
        assert!(!id.nullable);
        let label = report.column("label").unwrap();
        assert_eq!(label.data_type, Some(DataType::String));
    }

    #[tokio::test]
    async fn undefined_filterable_column_fails() {
        let (env, _) = memory::shop_environment();
        let mut config = memory::shop_config(MatchStrategy::ReadMatched);
        config.views[0].constraints = Some(ConstraintsConfig {
            filterable_columns: vec!["nope".into()],
            ..Default::default()
        });
        let err = Resource::init(&config, &env).await.unwrap_err();
        assert!(matches!(err, ConfigError::ColumnNotFound { .. }));
    }

    #[tokio::test]
    async fn body_parameters_must_agree() {
        let (env, _) = memory::shop_environment();
        let mut config = memory::shop_config(MatchStrategy::ReadMatched);
        let body = |data_type: &str| ParameterConfig {
            name: format!("body_{}", data_type),
            location: Some(crate::config::LocationConfig {
                kind: LocationKind::Body,
                name: String::new(),
            }),
            schema: Some(SchemaConfig {
                data_type: Some(data_type.into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        config.views[0].template = Some(TemplateConfig {
            source: None,
            parameters: vec![body("int")],
        });
        config.views[0].with[0].of.view.template = Some(TemplateConfig {
            source: None,
            parameters: vec![body("string")],
        });
        let err = Resource::init(&config, &env).await.unwrap_err();
        assert!(matches!(err, ConfigError::BodyTypeMismatch { .. }));
    }

    #[tokio::test]
    async fn declared_columns_skip_probing() {
        let (env, connection) = memory::shop_environment();
        let config = ResourceConfig {
            connectors: vec![memory::connector_config()],
            views: vec![ViewConfig {
                name: "users".into(),
                table: Some("users".into()),
                connector: Some(crate::config::ConnectorConfig {
                    reference: Some("shop".into()),
                    ..Default::default()
                }),
                columns: vec![ColumnConfig {
                    name: "id".into(),
                    data_type: Some("int".into()),
                    nullable: Some(false),
                    ..Default::default()
                }],
                ..Default::default()
            }],
            ..Default::default()
        };
        let resource = Resource::init(&config, &env).await.unwrap();
        let users = resource.view("users").unwrap();
        assert_eq!(users.schema.new_record().get("Id"), Some(&Value::Int(0)));
        assert!(connection.statements().is_empty());
        assert_eq!(users.relations.len(), 0);
    }
}
