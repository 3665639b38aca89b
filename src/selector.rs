//! Per-request selection state of each view.

use std::borrow::Cow;
use std::collections::HashMap;

use crate::binder::RequestParams;
use crate::error::BindError;
use crate::sql::{sanitize, Criteria};
use crate::value::{Record, Value};
use crate::view::View;

/// Bound parameter values with their presence flags.
#[derive(Clone, Debug)]
pub struct ParamState {
    pub values: Record,
    pub has: Record,
}

impl ParamState {
    pub fn new(view: &View) -> Self {
        ParamState {
            values: view.template.new_values(),
            has: view.template.new_presence(),
        }
    }

    /// Stores `value` for the parameter at `index` and marks it present.
    pub fn set_at(&mut self, index: usize, value: Value) {
        self.values.set_at(index, value);
        self.has.set_at(index, Value::Bool(true));
    }

    pub fn is_set(&self, index: usize) -> bool {
        self.has.get_at(index).is_some_and(Value::is_truthy)
    }
}

#[derive(Clone, Debug)]
pub struct Selector {
    /// Requested columns; empty selects all.
    pub columns: Vec<String>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
    pub page: Option<usize>,
    pub order_by: Option<String>,
    pub criteria: Option<Criteria>,
    pub parameters: ParamState,
}

impl Selector {
    pub fn new(view: &View) -> Self {
        Selector {
            columns: Vec::new(),
            offset: None,
            limit: None,
            page: None,
            order_by: None,
            criteria: None,
            parameters: ParamState::new(view),
        }
    }

    /// Applies the `<ns>_fields`, `_offset`, `_limit`, `_page`, `_orderby` and
    /// `_criteria` request keys, honoring the view constraints.
    pub fn apply(&mut self, view: &View, request: &RequestParams) -> Result<(), BindError> {
        let prefix = view.namespace().map(|ns| format!("{}_", ns)).unwrap_or_else(|| "_".to_string());
        let key = |suffix: &str| request.query_ignore_case(&format!("{}{}", prefix, suffix));
        let denied = |what: &str| BindError::Selector(format!("view {}: {} is not allowed", view.name, what));
        let filterable = |name: &str| view.column(name).filter(|c| c.filterable).map(|c| c.name.clone());
        let constraints = &view.constraints;

        if let Some(fields) = key("fields") {
            for field in fields.split(',').map(str::trim).filter(|f| !f.is_empty()) {
                let column = filterable(field).ok_or_else(|| denied(&format!("field {}", field)))?;
                self.columns.push(column);
            }
        }
        if let Some(raw) = key("limit") {
            if !constraints.limit {
                return Err(denied("limit"));
            }
            self.limit = Some(number(view, "limit", raw)?);
        }
        if let Some(raw) = key("offset") {
            if !constraints.offset {
                return Err(denied("offset"));
            }
            self.offset = Some(number(view, "offset", raw)?);
        }
        if let Some(raw) = key("page") {
            if !constraints.page {
                return Err(denied("page"));
            }
            self.page = Some(number(view, "page", raw)?);
        }
        if let Some(raw) = key("orderby") {
            if !constraints.order_by {
                return Err(denied("orderby"));
            }
            let column = |name: &str| view.column(name).map(|c| c.name.clone());
            let order_by = sanitize::order_by(raw, column)
                .map_err(|e| BindError::Selector(format!("view {}: {}", view.name, e)))?;
            self.order_by = Some(order_by);
        }
        if let Some(raw) = key("criteria") {
            if !constraints.criteria {
                return Err(denied("criteria"));
            }
            let criteria = sanitize::criteria(raw, filterable)
                .map_err(|e| BindError::Selector(format!("view {}: {}", view.name, e)))?;
            if !criteria.sql.trim().is_empty() {
                self.criteria = Some(criteria);
            }
        }
        if let (Some(page), Some(limit)) = (self.page, self.limit.or(view.selector.limit)) {
            if page.saturating_sub(1).checked_mul(limit).is_none() {
                return Err(BindError::Selector(format!("view {}: page {} is out of range", view.name, page)));
            }
        }
        Ok(())
    }
}

fn number(view: &View, key: &str, raw: &str) -> Result<usize, BindError> {
    raw.trim()
        .parse()
        .map_err(|_| BindError::Selector(format!("view {}: invalid {} {:?}", view.name, key, raw)))
}

/// Selectors of one request, keyed by view name.
#[derive(Clone, Debug, Default)]
pub struct Selectors {
    by_view: HashMap<String, Selector>,
}

impl Selectors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, view: &str) -> Option<&Selector> {
        self.by_view.get(view)
    }

    pub fn insert(&mut self, view: impl Into<String>, selector: Selector) {
        self.by_view.insert(view.into(), selector);
    }

    /// The request's selector for `view`, or a fresh one when nothing was bound.
    pub fn lookup(&self, view: &View) -> Cow<'_, Selector> {
        match self.by_view.get(&view.name) {
            Some(selector) => Cow::Borrowed(selector),
            None => Cow::Owned(Selector::new(view)),
        }
    }

    pub fn len(&self) -> usize {
        self.by_view.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_view.is_empty()
    }
}
