//! Program execution and placement of the built-in fragments.

use std::cmp::Ordering;
use std::fmt::Write;

use super::compile::{CommonParam, Operand, Program};
use super::parser::{BinOp, Expr, Node};
use super::CommonParams;
use crate::error::TemplateError;
use crate::value::{Record, Value};

const MARK: char = '\u{0}';

fn marker(param: CommonParam) -> &'static str {
    match param {
        CommonParam::Criteria => "\u{0}CRITERIA\u{0}",
        CommonParam::Pagination => "\u{0}PAGINATION\u{0}",
        CommonParam::ColumnIn => "\u{0}COLUMN_IN\u{0}",
    }
}

struct Frame {
    item: Value,
    index: usize,
    len: usize,
}

pub(crate) struct Renderer<'a> {
    values: &'a Record,
    presence: &'a Record,
    frames: Vec<Frame>,
    out: String,
}

impl<'a> Renderer<'a> {
    pub fn new(values: &'a Record, presence: &'a Record) -> Self {
        Renderer {
            values,
            presence,
            frames: Vec::new(),
            out: String::new(),
        }
    }

    /// Runs the program. Built-in fragments are left as markers for [`place`].
    pub fn render(mut self, program: &Program) -> Result<String, TemplateError> {
        self.run(program)?;
        Ok(self.out)
    }

    fn run(&mut self, nodes: &[Node<Operand>]) -> Result<(), TemplateError> {
        for node in nodes {
            match node {
                Node::Text(text) => self.out.push_str(text),
                Node::Emit(Operand::Common(param)) => self.out.push_str(marker(*param)),
                Node::Emit(op) => {
                    let value = self.operand(op)?;
                    write!(self.out, "{}", value)
                        .map_err(|_| TemplateError::Binding("failed to render value".into()))?;
                }
                Node::If { branches, otherwise } => {
                    let mut taken = false;
                    for (cond, body) in branches {
                        if self.eval(cond)?.is_truthy() {
                            self.run(body)?;
                            taken = true;
                            break;
                        }
                    }
                    if !taken {
                        self.run(otherwise)?;
                    }
                }
                Node::ForEach { source, body, .. } => {
                    let items = match self.operand(source)? {
                        Value::Null => Vec::new(),
                        Value::Array(items) => items,
                        Value::List(records) => records.into_iter().map(Value::Record).collect(),
                        Value::Json(serde_json::Value::Array(items)) => {
                            items.into_iter().map(Value::Json).collect()
                        }
                        other => vec![other],
                    };
                    let len = items.len();
                    for (index, item) in items.into_iter().enumerate() {
                        self.frames.push(Frame { item, index, len });
                        let result = self.run(body);
                        self.frames.pop();
                        result?;
                    }
                }
            }
        }
        Ok(())
    }

    fn frame(&self, depth: usize) -> Result<&Frame, TemplateError> {
        self.frames
            .get(depth)
            .ok_or_else(|| TemplateError::Binding(format!("loop variable at depth {} is not bound", depth)))
    }

    fn operand(&self, op: &Operand) -> Result<Value, TemplateError> {
        Ok(match op {
            Operand::Value { index, path } => {
                let mut value = self.values.get_at(*index).cloned().unwrap_or_default();
                for position in path {
                    value = match value {
                        Value::Record(r) => r.get_at(*position).cloned().unwrap_or_default(),
                        _ => Value::Null,
                    };
                }
                value
            }
            Operand::Presence(index) => self.presence.get_at(*index).cloned().unwrap_or_default(),
            Operand::Common(_) => Value::Null,
            Operand::Local { depth, path } => {
                let mut value = self.frame(*depth)?.item.clone();
                for name in path {
                    value = match value {
                        Value::Record(r) => r.get(name).cloned().unwrap_or_default(),
                        Value::Json(serde_json::Value::Object(mut map)) => {
                            map.remove(name).map(Value::Json).unwrap_or_default()
                        }
                        _ => Value::Null,
                    };
                }
                value
            }
            Operand::HasNext(depth) => {
                let frame = self.frame(*depth)?;
                Value::Bool(frame.index + 1 < frame.len)
            }
            Operand::Index(depth) => Value::Int(self.frame(*depth)?.index as i64),
        })
    }

    fn eval(&self, expr: &Expr<Operand>) -> Result<Value, TemplateError> {
        Ok(match expr {
            Expr::Leaf(op) => self.operand(op)?,
            Expr::Literal(v) => v.clone(),
            Expr::Not(inner) => Value::Bool(!self.eval(inner)?.is_truthy()),
            Expr::Binary(l, BinOp::And, r) => {
                Value::Bool(self.eval(l)?.is_truthy() && self.eval(r)?.is_truthy())
            }
            Expr::Binary(l, BinOp::Or, r) => {
                Value::Bool(self.eval(l)?.is_truthy() || self.eval(r)?.is_truthy())
            }
            Expr::Binary(l, op, r) => {
                let (l, r) = (self.eval(l)?, self.eval(r)?);
                let ordering = compare(&l, &r);
                Value::Bool(match op {
                    BinOp::Eq => ordering == Some(Ordering::Equal) || l == r,
                    BinOp::Ne => !(ordering == Some(Ordering::Equal) || l == r),
                    BinOp::Lt => ordering == Some(Ordering::Less),
                    BinOp::Le => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
                    BinOp::Gt => ordering == Some(Ordering::Greater),
                    BinOp::Ge => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
                    BinOp::And | BinOp::Or => false,
                })
            }
        })
    }
}

fn compare(l: &Value, r: &Value) -> Option<Ordering> {
    match (l, r) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Time(a), Value::Time(b)) => Some(a.cmp(b)),
        _ => match (l.as_f64(), r.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => None,
        },
    }
}

/// Replaces fragment markers in rendered text. Predicates are prefixed with
/// WHERE, or AND when a WHERE already opened the enclosing statement level.
/// Empty fragments vanish.
pub(crate) fn place(text: &str, common: &CommonParams) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find(MARK) {
        out.push_str(&rest[..start]);
        let after = &rest[start + MARK.len_utf8()..];
        let Some(end) = after.find(MARK) else {
            rest = after;
            break;
        };
        match &after[..end] {
            "CRITERIA" => place_predicate(&mut out, &common.criteria),
            "COLUMN_IN" => place_predicate(&mut out, &common.column_in),
            "PAGINATION" => append_clause(&mut out, &common.pagination),
            _ => {}
        }
        rest = &after[end + MARK.len_utf8()..];
    }
    out.push_str(rest);
    out
}

fn append_clause(out: &mut String, clause: &str) {
    let clause = clause.trim();
    if clause.is_empty() {
        return;
    }
    if !out.is_empty() && !out.ends_with(char::is_whitespace) {
        out.push(' ');
    }
    out.push_str(clause);
}

fn place_predicate(out: &mut String, predicate: &str) {
    let predicate = predicate.trim();
    if predicate.is_empty() {
        return;
    }
    let head = out.trim_end();
    let last_word = head
        .rsplit(|c: char| !(c.is_alphanumeric() || c == '_'))
        .next()
        .unwrap_or_default();
    let joined = head.ends_with('(')
        || ["where", "and", "or", "on", "having"]
            .iter()
            .any(|kw| last_word.eq_ignore_ascii_case(kw));
    if joined {
        append_clause(out, predicate);
    } else if where_opened(out) {
        append_clause(out, &format!("AND {}", predicate));
    } else {
        append_clause(out, &format!("WHERE {}", predicate));
    }
}

/// Whether a WHERE keyword appears at the paren depth where the text ends.
fn where_opened(text: &str) -> bool {
    let mut levels = vec![false];
    let mut word = String::new();
    let mut quoted = false;
    let check = |word: &mut String, levels: &mut Vec<bool>| {
        if word.eq_ignore_ascii_case("where") {
            if let Some(top) = levels.last_mut() {
                *top = true;
            }
        }
        word.clear();
    };
    for c in text.chars() {
        if quoted {
            quoted = c != '\'';
            continue;
        }
        if c.is_alphanumeric() || c == '_' {
            word.push(c);
            continue;
        }
        check(&mut word, &mut levels);
        match c {
            '\'' => quoted = true,
            '(' => levels.push(false),
            ')' if levels.len() > 1 => {
                levels.pop();
            }
            _ => {}
        }
    }
    check(&mut word, &mut levels);
    levels.last().copied().unwrap_or(false)
}
