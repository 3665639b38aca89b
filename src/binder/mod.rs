//! Parameter binding: resolves every template parameter of a view tree from
//! the request and fills the per-view selectors.

mod convert;
mod request;

pub use convert::convert;
pub use request::RequestParams;

use futures::future::BoxFuture;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::codec::CodecContext;
use crate::config::LocationKind;
use crate::error::{BindError, BindErrors};
use crate::reader::Reader;
use crate::selector::{Selector, Selectors};
use crate::value::{FieldType, Record, RecordType, Value};
use crate::view::{Parameter, View};

#[derive(Clone, Default)]
pub struct Binder {
    reader: Reader,
}

impl Binder {
    /// Data-view parameters are read through `reader`.
    pub fn new(reader: Reader) -> Self {
        Binder { reader }
    }

    /// Builds the selectors of `view` and every view below it. Views with
    /// parameters are bound in their own task; all failures are collected.
    pub fn selectors(
        &self,
        view: &Arc<View>,
        request: Arc<RequestParams>,
        cancel: CancellationToken,
    ) -> BoxFuture<'static, Result<Selectors, BindErrors>> {
        self.bind_tree(view, request, cancel, true)
    }

    /// Un-namespaced selector keys only address the view a request was made for,
    /// never a view read for a data-view parameter.
    fn bind_tree(
        &self,
        view: &Arc<View>,
        request: Arc<RequestParams>,
        cancel: CancellationToken,
        top: bool,
    ) -> BoxFuture<'static, Result<Selectors, BindErrors>> {
        let binder = self.clone();
        let view = Arc::clone(view);
        Box::pin(async move {
            let mut selectors = Selectors::new();
            let mut errors = Vec::new();
            let mut tasks = JoinSet::new();
            for (position, view) in view.tree().into_iter().enumerate() {
                let mut selector = Selector::new(&view);
                if view.namespace().is_some() || (top && position == 0) {
                    if let Err(e) = selector.apply(&view, &request) {
                        errors.push(e);
                    }
                }
                if view.template.parameters().is_empty() {
                    selectors.insert(view.name.clone(), selector);
                    continue;
                }
                let binder = binder.clone();
                let request = Arc::clone(&request);
                let cancel = cancel.clone();
                tasks.spawn(async move {
                    let result = binder.bind_view(&view, &mut selector, &request, &cancel).await;
                    (view.name.clone(), selector, result)
                });
            }
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((name, selector, Ok(()))) => selectors.insert(name, selector),
                    Ok((_, _, Err(mut failed))) => errors.append(&mut failed),
                    Err(e) => errors.push(BindError::Task(e.to_string())),
                }
            }
            if errors.is_empty() {
                Ok(selectors)
            } else {
                tracing::debug!(view = %view.name, errors = errors.len(), "binding failed");
                Err(BindErrors(errors))
            }
        })
    }

    async fn bind_view(
        &self,
        view: &View,
        selector: &mut Selector,
        request: &Arc<RequestParams>,
        cancel: &CancellationToken,
    ) -> Result<(), Vec<BindError>> {
        let mut errors = Vec::new();
        for (index, param) in view.template.parameters().iter().enumerate() {
            match self.bind_parameter(view, param, request, cancel).await {
                Ok(Some(value)) => selector.parameters.set_at(index, value),
                Ok(None) => {}
                Err(e) => errors.push(e),
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    async fn bind_parameter(
        &self,
        view: &View,
        param: &Parameter,
        request: &Arc<RequestParams>,
        cancel: &CancellationToken,
    ) -> Result<Option<Value>, BindError> {
        let name = || param.name.clone();
        let location = if param.location.name.is_empty() {
            param.name.as_str()
        } else {
            param.location.name.as_str()
        };
        let value = match param.location.kind {
            LocationKind::Body => {
                let json = request.body().and_then(|body| {
                    if param.location.name.is_empty() {
                        Some(body)
                    } else if location.starts_with('/') {
                        body.pointer(location)
                    } else {
                        body.get(location)
                    }
                });
                match json {
                    None => None,
                    Some(json) if param.codec.is_some() => Some(Value::Json(json.clone())),
                    Some(json) => Some(
                        Value::from_json(json, &param.ty)
                            .map_err(|reason| BindError::Body { name: name(), reason })?,
                    ),
                }
            }
            LocationKind::DataView => self.nested(param, request, cancel).await?,
            kind => match request.raw(kind, location).filter(|raw| !raw.is_empty()) {
                None => None,
                Some(raw) if param.codec.is_some() => Some(Value::String(raw)),
                Some(raw) => Some(convert(&raw, &param.ty, param.format.as_deref()).map_err(|reason| {
                    BindError::Conversion {
                        name: name(),
                        value: raw.clone(),
                        data_type: param.ty.to_string(),
                        reason,
                    }
                })?),
            },
        };
        let Some(value) = value else {
            return if param.required {
                Err(BindError::Required { name: name() })
            } else {
                Ok(None)
            };
        };
        let value = match &param.codec {
            Some(codec) => {
                let ctx = CodecContext {
                    view: &view.name,
                    name: &param.name,
                };
                codec.decode(&ctx, &value).map_err(|e| BindError::Decode {
                    name: name(),
                    reason: e.to_string(),
                })?
            }
            None => value,
        };
        if !param.ty.accepts(&value) {
            return Err(BindError::Decode {
                name: name(),
                reason: format!("{} is not assignable to {}", value.type_name(), param.ty),
            });
        }
        Ok(Some(value))
    }

    /// Reads the parameter's view, which must return at most one row.
    async fn nested(
        &self,
        param: &Parameter,
        request: &Arc<RequestParams>,
        cancel: &CancellationToken,
    ) -> Result<Option<Value>, BindError> {
        let Some(view) = &param.view else {
            return Ok(None);
        };
        let name = || param.name.clone();
        let selectors = self
            .bind_tree(view, Arc::clone(request), cancel.clone(), false)
            .await
            .map_err(|source| BindError::Nested { name: name(), source })?;
        let mut records = self
            .reader
            .read(view, selectors, cancel)
            .await
            .map_err(|e| BindError::Read {
                name: name(),
                source: Box::new(e),
            })?;
        if records.is_empty() {
            return if param.required {
                Err(BindError::NoData { name: name() })
            } else {
                Ok(None)
            };
        }
        if records.len() > 1 {
            return Err(BindError::Cardinality { name: name() });
        }
        match &param.ty {
            FieldType::One(ty) => Ok(records.pop().map(|r| Value::Record(reshape(&r, ty)))),
            _ => Ok(records.pop().map(single_value)),
        }
    }
}

/// A one-field record stands for its only value.
fn single_value(record: Record) -> Value {
    match record.record_type().len() {
        1 => record.get_at(0).cloned().unwrap_or_default(),
        _ => Value::Record(record),
    }
}

/// Copies `record` into `ty` by field name, then by column.
fn reshape(record: &Record, ty: &Arc<RecordType>) -> Record {
    if Arc::ptr_eq(record.record_type(), ty) {
        return record.clone();
    }
    let mut out = ty.new_record();
    for (index, field) in ty.fields().iter().enumerate() {
        let value = record
            .get(&field.name)
            .or_else(|| field.column.as_deref().and_then(|c| record.column(c)));
        if let Some(value) = value {
            out.set_at(index, value.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        ColumnConfig, ConnectorConfig, LocationConfig, MatchStrategy, ParameterConfig, ResourceConfig,
        SchemaConfig, ViewConfig,
    };
    use crate::connector::memory::{self, MemoryConnection};
    use crate::connector::ColumnMeta;
    use crate::view::Resource;

    fn param(name: &str, kind: LocationKind, location: &str, data_type: &str) -> ParameterConfig {
        ParameterConfig {
            name: name.into(),
            location: Some(LocationConfig {
                kind,
                name: location.into(),
            }),
            schema: Some(SchemaConfig {
                data_type: Some(data_type.into()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    async fn bind(
        config: &ResourceConfig,
        connection: MemoryConnection,
        request: RequestParams,
    ) -> Result<Selectors, BindErrors> {
        let env = memory::environment(Arc::new(connection));
        let resource = Resource::init(config, &env).await.unwrap();
        let view = resource.view("orders").unwrap();
        Binder::default()
            .selectors(view, Arc::new(request), CancellationToken::new())
            .await
    }

    #[tokio::test]
    async fn binds_query_parameters() {
        let config = memory::shop_config(MatchStrategy::ReadMatched);
        let request = RequestParams::new().with_query("user_id", "7");
        let selectors = bind(&config, memory::shop(), request).await.unwrap();
        let orders = selectors.get("orders").unwrap();
        assert_eq!(orders.parameters.values.get("user_id"), Some(&Value::Int(7)));
        assert!(orders.parameters.is_set(0));
        assert_eq!(selectors.len(), 3);
    }

    #[tokio::test]
    async fn empty_raw_values_are_absent() {
        let config = memory::shop_config(MatchStrategy::ReadMatched);
        let request = RequestParams::from_query_string("user_id=");
        let selectors = bind(&config, memory::shop(), request).await.unwrap();
        let orders = selectors.get("orders").unwrap();
        assert!(!orders.parameters.is_set(0));
        assert_eq!(orders.parameters.values.get("user_id"), Some(&Value::Int(0)));

        let mut config = memory::shop_config(MatchStrategy::ReadMatched);
        config.views[0].template.as_mut().unwrap().parameters[0].required = Some(true);
        let request = RequestParams::from_query_string("user_id=");
        let errors = bind(&config, memory::shop(), request).await.unwrap_err();
        assert!(matches!(&errors.0[..], [BindError::Required { name }] if name == "user_id"));
    }

    #[tokio::test]
    async fn reports_every_failure() {
        let mut config = memory::shop_config(MatchStrategy::ReadMatched);
        let template = config.views[0].template.as_mut().unwrap();
        template.parameters[0].required = Some(true);
        template
            .parameters
            .push(param("since", LocationKind::Query, "since", "time"));
        config.views[0].with[0].of.view.template = Some(crate::config::TemplateConfig {
            source: None,
            parameters: vec![param("tenant", LocationKind::Header, "X-Tenant", "uuid")],
        });
        let request = RequestParams::new()
            .with_query("since", "yesterday")
            .with_header("X-Tenant", "not-a-uuid")
            .with_query("_limit", "x");
        let errors = bind(&config, memory::shop(), request).await.unwrap_err();
        assert_eq!(errors.0.len(), 4, "{}", errors);
        assert!(errors.iter().any(|e| matches!(e, BindError::Required { name } if name == "user_id")));
        assert_eq!(
            errors
                .iter()
                .filter(|e| matches!(e, BindError::Conversion { .. }))
                .count(),
            2
        );
        assert!(errors.iter().any(|e| matches!(e, BindError::Selector(_))));
    }

    fn with_me_view(config: &mut ResourceConfig) {
        config.views.push(ViewConfig {
            name: "me".into(),
            table: Some("me".into()),
            connector: Some(ConnectorConfig {
                reference: Some("shop".into()),
                ..Default::default()
            }),
            columns: vec![ColumnConfig {
                name: "id".into(),
                data_type: Some("int".into()),
                ..Default::default()
            }],
            ..Default::default()
        });
        let template = config.views[0].template.as_mut().unwrap();
        template.parameters[0] = param("user_id", LocationKind::DataView, "me", "int");
    }

    fn me_table(rows: Vec<Vec<Value>>) -> MemoryConnection {
        memory::shop().table(
            "me",
            vec![
                ColumnMeta::new("id", "INT8", Some(false)),
                ColumnMeta::new("name", "TEXT", Some(true)),
            ],
            rows,
        )
    }

    #[tokio::test]
    async fn data_view_parameters_read_one_row() {
        let mut config = memory::shop_config(MatchStrategy::ReadMatched);
        with_me_view(&mut config);
        let connection = me_table(vec![vec![Value::Int(7), "ann".into()]]);
        let selectors = bind(&config, connection, RequestParams::new()).await.unwrap();
        let orders = selectors.get("orders").unwrap();
        assert_eq!(orders.parameters.values.get("user_id"), Some(&Value::Int(7)));
    }

    #[tokio::test]
    async fn data_view_parameters_reject_many_rows() {
        let mut config = memory::shop_config(MatchStrategy::ReadMatched);
        with_me_view(&mut config);
        let connection = me_table(vec![
            vec![Value::Int(7), "ann".into()],
            vec![Value::Int(8), "bob".into()],
        ]);
        let errors = bind(&config, connection, RequestParams::new()).await.unwrap_err();
        assert!(matches!(&errors.0[..], [BindError::Cardinality { name }] if name == "user_id"));
        assert!(errors.to_string().contains("returns more than one value"));
    }

    #[tokio::test]
    async fn empty_data_view_is_absent_unless_required() {
        let mut config = memory::shop_config(MatchStrategy::ReadMatched);
        with_me_view(&mut config);
        let selectors = bind(&config, me_table(vec![]), RequestParams::new()).await.unwrap();
        assert!(!selectors.get("orders").unwrap().parameters.is_set(0));

        config.views[0].template.as_mut().unwrap().parameters[0].required = Some(true);
        let errors = bind(&config, me_table(vec![]), RequestParams::new()).await.unwrap_err();
        assert!(matches!(&errors.0[..], [BindError::NoData { .. }]));
    }

    #[tokio::test]
    async fn body_parameters_take_fields() {
        let mut config = memory::shop_config(MatchStrategy::ReadMatched);
        config.views[0]
            .template
            .as_mut()
            .unwrap()
            .parameters
            .push(param("status", LocationKind::Body, "status", "string"));
        let request = RequestParams::new().with_body(serde_json::json!({"status": "OPEN"}));
        let selectors = bind(&config, memory::shop(), request).await.unwrap();
        let orders = selectors.get("orders").unwrap();
        assert_eq!(orders.parameters.values.get("status"), Some(&Value::from("OPEN")));

        let request = RequestParams::new().with_body(serde_json::json!({"status": 5}));
        let errors = bind(&config, memory::shop(), request).await.unwrap_err();
        assert!(matches!(&errors.0[..], [BindError::Body { .. }]));
    }
}
