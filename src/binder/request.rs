//! Raw request inputs for parameter binding.

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Query, RawPathParams},
    http::{header::COOKIE, request::Parts, Uri},
};
use std::collections::HashMap;

use crate::config::LocationKind;

/// Query, path, header and cookie values of one request plus its decoded body.
#[derive(Clone, Debug, Default)]
pub struct RequestParams {
    query: Vec<(String, String)>,
    path: HashMap<String, String>,
    /// Keys are lower case.
    headers: HashMap<String, String>,
    cookies: HashMap<String, String>,
    body: Option<serde_json::Value>,
}

impl RequestParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `a=1&b=2`; undecodable input yields no query values.
    pub fn from_query_string(query: &str) -> Self {
        let mut params = Self::new();
        params.query = parse_query(query);
        params
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn with_path(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path.insert(name.into(), value.into());
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn query(&self, name: &str) -> Option<&str> {
        self.query.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    pub fn query_ignore_case(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn path(&self, name: &str) -> Option<&str> {
        self.path.get(name).map(String::as_str)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn body(&self) -> Option<&serde_json::Value> {
        self.body.as_ref()
    }

    /// Raw text of a string-valued location. Repeated query keys are joined with commas.
    pub fn raw(&self, kind: LocationKind, name: &str) -> Option<String> {
        match kind {
            LocationKind::Query => {
                let values: Vec<&str> = self
                    .query
                    .iter()
                    .filter(|(k, _)| k == name)
                    .map(|(_, v)| v.as_str())
                    .collect();
                (!values.is_empty()).then(|| values.join(","))
            }
            LocationKind::Path => self.path(name).map(str::to_string),
            LocationKind::Header => self.header(name).map(str::to_string),
            LocationKind::Cookie => self.cookie(name).map(str::to_string),
            LocationKind::Body | LocationKind::DataView => None,
        }
    }
}

fn parse_query(query: &str) -> Vec<(String, String)> {
    let uri = match format!("/?{}", query).parse::<Uri>() {
        Ok(uri) => uri,
        Err(e) => {
            tracing::warn!(error = %e, "invalid query string");
            return Vec::new();
        }
    };
    match Query::<Vec<(String, String)>>::try_from_uri(&uri) {
        Ok(Query(pairs)) => pairs,
        Err(e) => {
            tracing::warn!(error = %e, "undecodable query string");
            Vec::new()
        }
    }
}

fn parse_cookies(header: &str) -> impl Iterator<Item = (String, String)> + '_ {
    header.split(';').filter_map(|pair| {
        let (name, value) = pair.split_once('=')?;
        let name = name.trim();
        (!name.is_empty()).then(|| (name.to_string(), value.trim().trim_matches('"').to_string()))
    })
}

/// Extracts everything but the body; attach that with [`RequestParams::with_body`].
#[async_trait]
impl<S> FromRequestParts<S> for RequestParams
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let mut params = RequestParams::new();
        if let Some(query) = parts.uri.query() {
            params.query = parse_query(query);
        }
        if let Ok(path) = RawPathParams::from_request_parts(parts, state).await {
            params.path = path.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        }
        for (name, value) in &parts.headers {
            let Ok(value) = value.to_str() else {
                continue;
            };
            if *name == COOKIE {
                params.cookies.extend(parse_cookies(value));
            }
            params.headers.insert(name.as_str().to_string(), value.to_string());
        }
        Ok(params)
    }
}
