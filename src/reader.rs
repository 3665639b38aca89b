//! Read sessions: builds each view's statement, streams rows into collectors
//! and assembles the relation tree.

use futures::future::{join_all, BoxFuture};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::cache::ResultCache;
use crate::collector::Collector;
use crate::error::{ConnectorError, ReadError};
use crate::selector::Selectors;
use crate::sql::{self, BatchFilter, QueryBuf, Select};
use crate::value::{Key, Record};
use crate::view::View;

/// One read of a view tree with the request's selectors.
pub struct Session {
    view: Arc<View>,
    selectors: Selectors,
    prefetched: HashMap<String, Vec<Record>>,
}

impl Session {
    pub fn new(view: Arc<View>, selectors: Selectors) -> Self {
        Session {
            view,
            selectors,
            prefetched: HashMap::new(),
        }
    }

    pub fn view(&self) -> &Arc<View> {
        &self.view
    }

    /// Uses `records` instead of querying `view`. They must be structurally
    /// assignable to the view schema.
    pub fn prefetch(mut self, view: &View, records: Vec<Record>) -> Result<Self, ReadError> {
        if records.iter().any(|r| **r.record_type() != *view.schema) {
            return Err(ReadError::Incompatible {
                view: view.name.clone(),
            });
        }
        self.prefetched.insert(view.name.clone(), records);
        Ok(self)
    }
}

/// How a view of the tree is read relative to its parent.
enum Edge<'a> {
    Root,
    /// Read-all child: read without the parent's keys, matched afterwards.
    Unfiltered { column: &'a str },
    /// Read-matched child: restricted to the parent's keys, matched per row.
    Matched {
        parent: &'a Collector,
        relation: usize,
        column: &'a str,
        keys: Vec<Key>,
    },
}

#[derive(Clone, Default)]
pub struct Reader {
    cache: Option<Arc<dyn ResultCache>>,
}

impl Reader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache(cache: Arc<dyn ResultCache>) -> Self {
        Reader { cache: Some(cache) }
    }

    pub async fn read(
        &self,
        view: &Arc<View>,
        selectors: Selectors,
        cancel: &CancellationToken,
    ) -> Result<Vec<Record>, ReadError> {
        self.read_session(&Session::new(Arc::clone(view), selectors), cancel)
            .await
    }

    pub async fn read_session(
        &self,
        session: &Session,
        cancel: &CancellationToken,
    ) -> Result<Vec<Record>, ReadError> {
        if cancel.is_cancelled() {
            return Err(ReadError::Cancelled);
        }
        let collector = self
            .read_tree(session, Arc::clone(&session.view), Edge::Root, cancel)
            .await?;
        tracing::debug!(view = %session.view.name, rows = collector.len(), "read finished");
        Ok(collector.into_records())
    }

    /// Reads `view` and its whole subtree. Read-all children run concurrently
    /// with the view itself; read-matched children start once its keys are sealed.
    /// Every error of a join barrier is reported, and children merge in relation order.
    fn read_tree<'a>(
        &'a self,
        session: &'a Session,
        view: Arc<View>,
        edge: Edge<'a>,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<Collector, ReadError>> {
        Box::pin(async move {
            let mut collector = Collector::new(Arc::clone(&view));
            let (parallel, matched): (Vec<_>, Vec<_>) =
                view.relations.iter().enumerate().partition(|(_, rel)| rel.is_parallel());

            let own = self.fill(session, &view, &edge, &mut collector, cancel);
            let children = join_all(parallel.iter().map(|&(index, rel)| async move {
                let edge = Edge::Unfiltered {
                    column: &rel.of_column,
                };
                (index, self.read_tree(session, Arc::clone(&rel.view), edge, cancel).await)
            }));
            let (own, children) = futures::join!(own, children);

            let mut errors = Vec::new();
            let mut done = Vec::new();
            if let Err(e) = own {
                errors.push(e);
            }
            for (index, result) in children {
                match result {
                    Ok(child) => done.push((index, child)),
                    Err(e) => errors.push(e),
                }
            }
            if let Some(e) = ReadError::combine(errors) {
                return Err(e);
            }
            collector.seal();
            for (index, child) in done.iter_mut() {
                child.match_parent(&collector, *index)?;
            }

            let parent = &collector;
            let results = join_all(matched.iter().map(|&(index, rel)| async move {
                let keys = parent.keys(&rel.column);
                if keys.is_empty() {
                    return (index, Ok(None));
                }
                let edge = Edge::Matched {
                    parent,
                    relation: index,
                    column: &rel.of_column,
                    keys,
                };
                let result = self.read_tree(session, Arc::clone(&rel.view), edge, cancel).await;
                (index, result.map(Some))
            }))
            .await;
            let mut errors = Vec::new();
            for (index, result) in results {
                match result {
                    Ok(Some(child)) => done.push((index, child)),
                    Ok(None) => {}
                    Err(e) => errors.push(e),
                }
            }
            if let Some(e) = ReadError::combine(errors) {
                return Err(e);
            }

            done.sort_by_key(|(index, _)| *index);
            for (index, child) in done {
                collector.merge(index, child)?;
            }
            Ok(collector)
        })
    }

    /// Fills the view's own rows, from prefetched records or its statement(s).
    async fn fill(
        &self,
        session: &Session,
        view: &Arc<View>,
        edge: &Edge<'_>,
        collector: &mut Collector,
        cancel: &CancellationToken,
    ) -> Result<(), ReadError> {
        if let Edge::Matched { parent, relation, .. } = edge {
            collector.attach(parent, *relation)?;
        }
        if let Some(records) = session.prefetched.get(&view.name) {
            for record in records {
                collector.push_record(record.clone())?;
            }
            return Ok(());
        }
        let selector = session.selectors.lookup(view);
        let build = |options: Select<'_>| {
            sql::select(view, &selector, options).map_err(|source| ReadError::Template {
                view: view.name.clone(),
                source,
            })
        };
        match edge {
            Edge::Root => {
                let query = build(Select::default())?;
                self.run(view, &query, collector, cancel).await
            }
            Edge::Unfiltered { column } => {
                let query = build(Select {
                    join_column: Some(*column),
                    batch: None,
                })?;
                self.run(view, &query, collector, cancel).await
            }
            Edge::Matched { column, keys, .. } => {
                for chunk in keys.chunks(view.batch_size.max(1)) {
                    let query = build(Select {
                        join_column: Some(*column),
                        batch: Some(BatchFilter { column: *column, keys: chunk }),
                    })?;
                    self.run(view, &query, collector, cancel).await?;
                }
                Ok(())
            }
        }
    }

    async fn run(
        &self,
        view: &View,
        query: &QueryBuf,
        collector: &mut Collector,
        cancel: &CancellationToken,
    ) -> Result<(), ReadError> {
        let cache = self.cache.as_ref().filter(|_| view.cache);
        let key = format!("{}|{:?}", query.sql, query.params);
        if let Some(cache) = cache {
            if let Some(rows) = cache.lookup(&view.name, &key).await.map_err(ReadError::Cache)? {
                tracing::debug!(view = %view.name, rows = rows.len(), "cache hit");
                for row in rows {
                    collector.push_cached(row)?;
                }
                return Ok(());
            }
        }

        tracing::debug!(view = %view.name, sql = %query.sql, params = ?query.params, "query");
        let start = collector.len();
        let connection = view.connector.connection();
        let result = tokio::select! {
            _ = cancel.cancelled() => return Err(ReadError::Cancelled),
            result = connection.query(&query.sql, &query.params, collector) => result,
        };
        match result {
            Ok(()) => {}
            Err(ConnectorError::Sink(e)) => return Err(ReadError::Assembly(e)),
            Err(source) => {
                return Err(ReadError::Connector {
                    view: view.name.clone(),
                    source,
                })
            }
        }
        if let Some(cache) = cache {
            cache
                .store(&view.name, &key, collector.rows_from(start))
                .await
                .map_err(ReadError::Cache)?;
        }
        Ok(())
    }
}
