//! Service: binds a request against a view tree and reads it.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::binder::{Binder, RequestParams};
use crate::error::Error;
use crate::reader::{Reader, Session};
use crate::value::Record;
use crate::view::Resource;

#[derive(Clone)]
pub struct Service {
    resource: Arc<Resource>,
    reader: Reader,
    binder: Binder,
}

impl Service {
    pub fn new(resource: Arc<Resource>) -> Self {
        Self::with_reader(resource, Reader::new())
    }

    /// Data-view parameters are read with the same reader (and cache) as the views.
    pub fn with_reader(resource: Arc<Resource>, reader: Reader) -> Self {
        Service {
            resource,
            binder: Binder::new(reader.clone()),
            reader,
        }
    }

    pub fn resource(&self) -> &Arc<Resource> {
        &self.resource
    }

    /// Reads the records of `view` for one request.
    pub async fn read(&self, view: &str, request: RequestParams) -> Result<Vec<Record>, Error> {
        self.read_with_cancel(view, request, CancellationToken::new())
            .await
    }

    pub async fn read_with_cancel(
        &self,
        view: &str,
        request: RequestParams,
        cancel: CancellationToken,
    ) -> Result<Vec<Record>, Error> {
        let session = self.session(view, request, cancel.clone()).await?;
        let records = self.reader.read_session(&session, &cancel).await?;
        Ok(records)
    }

    /// Binds `request` without reading, so callers can attach prefetched rows.
    pub async fn session(
        &self,
        view: &str,
        request: RequestParams,
        cancel: CancellationToken,
    ) -> Result<Session, Error> {
        let view = self.resource.view(view)?;
        let selectors = self
            .binder
            .selectors(view, Arc::new(request), cancel)
            .await?;
        tracing::debug!(view = %view.name, selectors = selectors.len(), "request bound");
        Ok(Session::new(Arc::clone(view), selectors))
    }

    pub async fn read_session(
        &self,
        session: &Session,
        cancel: &CancellationToken,
    ) -> Result<Vec<Record>, Error> {
        Ok(self.reader.read_session(session, cancel).await?)
    }

    /// Records of `view` as a JSON array.
    pub async fn read_json(
        &self,
        view: &str,
        request: RequestParams,
    ) -> Result<serde_json::Value, Error> {
        let records = self.read(view, request).await?;
        serde_json::to_value(&records).map_err(|e| Error::Encode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchStrategy;
    use crate::connector::memory;
    use crate::error::BindError;
    use crate::value::Value;

    async fn service(strategy: MatchStrategy) -> (Service, Arc<memory::MemoryConnection>) {
        let (env, connection) = memory::shop_environment();
        let resource = Resource::init(&memory::shop_config(strategy), &env)
            .await
            .unwrap();
        (Service::new(Arc::new(resource)), connection)
    }

    #[tokio::test]
    async fn reads_a_bound_view() {
        let (service, connection) = service(MatchStrategy::ReadMatched).await;
        let request = RequestParams::new()
            .with_query("user_id", "7")
            .with_query("_orderby", "id desc");
        let records = service.read("orders", request).await.unwrap();
        assert_eq!(records.len(), 3);
        assert!(records[0].get("Items").and_then(Value::as_list).is_some());

        let statements = connection.statements();
        let root = statements
            .iter()
            .find(|s| s.contains("FROM orders") && !s.contains("1=0"))
            .unwrap();
        assert!(root.contains("WHERE user_id = 7"), "{}", root);
        assert!(root.ends_with("ORDER BY id DESC"), "{}", root);
    }

    #[tokio::test]
    async fn unknown_views_are_not_found() {
        let (service, _) = service(MatchStrategy::ReadAll).await;
        let err = service
            .read("invoices", RequestParams::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(name) if name == "view invoices"));
    }

    #[tokio::test]
    async fn bind_failures_skip_the_read() {
        let (service, connection) = service(MatchStrategy::ReadAll).await;
        let before = connection.statements().len();
        let request = RequestParams::new().with_query("user_id", "seven");
        let err = service.read("orders", request).await.unwrap_err();
        match err {
            Error::Bind(errors) => {
                assert!(matches!(errors.0[0], BindError::Conversion { .. }));
            }
            other => panic!("unexpected {other}"),
        }
        assert_eq!(connection.statements().len(), before);
    }

    #[tokio::test]
    async fn reads_as_json() {
        let (service, _) = service(MatchStrategy::ReadAll).await;
        let json = service.read_json("orders", RequestParams::new()).await.unwrap();
        let orders = json.as_array().unwrap();
        assert_eq!(orders.len(), 3);
        assert_eq!(orders[0]["Id"], serde_json::json!(1));
        assert_eq!(orders[2]["User"]["Name"], serde_json::json!("bob"));
    }
}
