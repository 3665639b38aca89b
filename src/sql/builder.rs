//! Builds the outer SELECT of a view read from its rendered source.

use crate::connector::Placeholder;
use crate::error::TemplateError;
use crate::selector::Selector;
use crate::template::{CommonParam, CommonParams};
use crate::value::{Key, Value};
use crate::view::{View, DEFAULT_ALIAS};

use super::sanitize::Criteria;

const ARG: char = '\u{1}';

/// Final SQL text with its bind arguments in placeholder order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Collects arguments while fragments are assembled out of textual order.
/// Each argument is written as an index token and numbered at the end.
#[derive(Default)]
struct Args {
    values: Vec<Value>,
}

impl Args {
    fn push(&mut self, value: Value) -> String {
        self.values.push(value);
        format!("{ARG}{}{ARG}", self.values.len() - 1)
    }

    /// Writes sanitized criteria, replacing each `?` with an argument token.
    fn embed(&mut self, criteria: &Criteria) -> String {
        let mut out = String::with_capacity(criteria.sql.len());
        let mut args = criteria.args.iter();
        for c in criteria.sql.chars() {
            if c == '?' {
                let value = args.next().cloned().unwrap_or_default();
                out.push_str(&self.push(value));
            } else {
                out.push(c);
            }
        }
        out
    }

    fn finish(self, text: &str, placeholder: Placeholder) -> QueryBuf {
        let mut buf = QueryBuf::default();
        let mut parts = text.split(ARG);
        if let Some(head) = parts.next() {
            buf.sql.push_str(head);
        }
        while let Some(index) = parts.next() {
            match index.parse::<usize>().ok().and_then(|i| self.values.get(i)) {
                Some(value) => {
                    buf.params.push(value.clone());
                    buf.sql.push_str(&placeholder.render(buf.params.len()));
                }
                None => buf.sql.push_str(index),
            }
            if let Some(text) = parts.next() {
                buf.sql.push_str(text);
            }
        }
        buf
    }
}

/// Restriction of a relation read to the parent's join keys.
#[derive(Clone, Copy, Debug)]
pub struct BatchFilter<'a> {
    /// Child-side join column.
    pub column: &'a str,
    pub keys: &'a [Key],
}

/// Options of one view read.
#[derive(Clone, Copy, Debug, Default)]
pub struct Select<'a> {
    /// Child-side join column; always selected.
    pub join_column: Option<&'a str>,
    pub batch: Option<BatchFilter<'a>>,
}

impl<'a> Select<'a> {
    fn is_root(&self) -> bool {
        self.join_column.is_none() && self.batch.is_none()
    }
}

/// Builds `SELECT <columns> FROM <source> <alias> [WHERE ...] [ORDER BY ...] [LIMIT ...]`.
///
/// The view criteria, the request criteria and the batch `IN` predicate go to
/// `$CRITERIA` / `$COLUMN_IN` when the source places them, otherwise to the
/// outer WHERE. Pagination only applies to root reads.
pub fn select(view: &View, selector: &Selector, options: Select<'_>) -> Result<QueryBuf, TemplateError> {
    let template = &view.template;
    let state = &selector.parameters;
    let mut args = Args::default();
    let mut common = CommonParams::default();

    let mut predicates = Vec::new();
    let view_criteria = template.evaluate_criteria(&state.values, &state.has)?;
    if !view_criteria.is_empty() {
        predicates.push(view_criteria);
    }
    if let Some(criteria) = &selector.criteria {
        predicates.push(args.embed(criteria));
    }
    if let Some(batch) = options.batch {
        let tokens: Vec<String> = batch.keys.iter().map(|k| args.push(k.to_value())).collect();
        let column_in = format!("{} IN ({})", batch.column, tokens.join(", "));
        if template.uses(CommonParam::ColumnIn) {
            common.column_in = column_in;
        } else {
            predicates.push(column_in);
        }
    }
    let predicate = conjunction(&predicates);
    let outer_where = if template.uses(CommonParam::Criteria) {
        common.criteria = predicate;
        String::new()
    } else {
        predicate
    };

    let pagination = if options.is_root() {
        pagination(view, selector)
    } else {
        String::new()
    };
    let outer_pagination = if template.uses(CommonParam::Pagination) {
        common.pagination = pagination;
        String::new()
    } else {
        pagination
    };

    let source = template.evaluate_source(&state.values, &state.has, &common)?;
    let alias = if view.alias.is_empty() { DEFAULT_ALIAS } else { view.alias.as_str() };
    let mut sql = format!("SELECT {} FROM {} {}", column_list(view, selector, options, alias), source, alias);
    if !outer_where.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&outer_where);
    }
    if let Some(order_by) = selector.order_by.as_ref().or(view.selector.order_by.as_ref()) {
        sql.push_str(" ORDER BY ");
        sql.push_str(order_by);
    }
    if !outer_pagination.is_empty() {
        sql.push(' ');
        sql.push_str(&outer_pagination);
    }
    Ok(args.finish(&sql, view.connector.placeholder()))
}

/// Zero-row query used to detect the columns of `source`.
pub fn probe(source: &str) -> String {
    format!("SELECT {a}.* FROM {} {a} WHERE 1=0", source, a = DEFAULT_ALIAS)
}

fn conjunction(predicates: &[String]) -> String {
    match predicates {
        [] => String::new(),
        [single] => single.clone(),
        many => many
            .iter()
            .map(|p| format!("({})", p))
            .collect::<Vec<_>>()
            .join(" AND "),
    }
}

/// Selected columns in view order; join and key columns are always included.
fn column_list(view: &View, selector: &Selector, options: Select<'_>, alias: &str) -> String {
    let mut required = view.key_columns();
    if let Some(column) = options.join_column {
        required.push(column);
    }
    view.columns
        .iter()
        .filter(|c| {
            selector.columns.is_empty()
                || selector.columns.iter().any(|s| s.eq_ignore_ascii_case(&c.name))
                || required.iter().any(|r| r.eq_ignore_ascii_case(&c.name))
        })
        .map(|c| format!("{}.{}", alias, c.name))
        .collect::<Vec<_>>()
        .join(", ")
}

fn pagination(view: &View, selector: &Selector) -> String {
    let limit = selector.limit.or(view.selector.limit);
    let offset = match (selector.page, selector.offset, limit) {
        (Some(page), _, Some(limit)) if page > 0 => (page - 1).saturating_mul(limit),
        (_, Some(offset), _) => offset,
        _ => 0,
    };
    let mut clause = String::new();
    if let Some(limit) = limit {
        clause.push_str(&format!("LIMIT {}", limit));
    }
    if offset > 0 {
        if !clause.is_empty() {
            clause.push(' ');
        }
        clause.push_str(&format!("OFFSET {}", offset));
    }
    clause
}
