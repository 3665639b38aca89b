//! Resolves every variable of a parsed template against the parameter record types.

use super::parser::{Expr, Node, Path};
use crate::error::TemplateError;
use crate::value::{FieldType, RecordType};

/// Built-in fragments the query builder supplies at evaluation time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommonParam {
    Criteria,
    Pagination,
    ColumnIn,
}

impl CommonParam {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "CRITERIA" => Some(CommonParam::Criteria),
            "PAGINATION" => Some(CommonParam::Pagination),
            "COLUMN_IN" => Some(CommonParam::ColumnIn),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Operand {
    /// Parameter value, then nested record field positions.
    Value { index: usize, path: Vec<usize> },
    Presence(usize),
    Common(CommonParam),
    /// Loop variable at `depth`, then field names looked up at run time.
    Local { depth: usize, path: Vec<String> },
    HasNext(usize),
    Index(usize),
}

pub(crate) type Program = Vec<Node<Operand>>;

pub(crate) fn compile(
    nodes: Vec<Node<Path>>,
    values: &RecordType,
    presence: &RecordType,
) -> Result<Program, TemplateError> {
    let mut scope = Scope {
        values,
        presence,
        locals: Vec::new(),
    };
    scope.nodes(nodes)
}

/// Which built-in fragments a program references.
pub(crate) fn uses(program: &Program, param: CommonParam) -> bool {
    fn expr_uses(expr: &Expr<Operand>, param: CommonParam) -> bool {
        match expr {
            Expr::Leaf(op) => *op == Operand::Common(param),
            Expr::Literal(_) => false,
            Expr::Not(inner) => expr_uses(inner, param),
            Expr::Binary(l, _, r) => expr_uses(l, param) || expr_uses(r, param),
        }
    }
    program.iter().any(|node| match node {
        Node::Text(_) => false,
        Node::Emit(op) => *op == Operand::Common(param),
        Node::If { branches, otherwise } => {
            branches
                .iter()
                .any(|(cond, body)| expr_uses(cond, param) || uses(body, param))
                || uses(otherwise, param)
        }
        Node::ForEach { source, body, .. } => *source == Operand::Common(param) || uses(body, param),
    })
}

struct Scope<'a> {
    values: &'a RecordType,
    presence: &'a RecordType,
    locals: Vec<String>,
}

impl Scope<'_> {
    fn nodes(&mut self, nodes: Vec<Node<Path>>) -> Result<Program, TemplateError> {
        nodes.into_iter().map(|n| self.node(n)).collect()
    }

    fn node(&mut self, node: Node<Path>) -> Result<Node<Operand>, TemplateError> {
        Ok(match node {
            Node::Text(t) => Node::Text(t),
            Node::Emit(path) => Node::Emit(self.resolve(&path)?),
            Node::If { branches, otherwise } => Node::If {
                branches: branches
                    .into_iter()
                    .map(|(cond, body)| Ok((self.expr(cond)?, self.nodes(body)?)))
                    .collect::<Result<_, TemplateError>>()?,
                otherwise: self.nodes(otherwise)?,
            },
            Node::ForEach { var, source, body } => {
                let source = self.resolve(&source)?;
                self.locals.push(var.clone());
                let body = self.nodes(body);
                self.locals.pop();
                Node::ForEach {
                    var,
                    source,
                    body: body?,
                }
            }
        })
    }

    fn expr(&self, expr: Expr<Path>) -> Result<Expr<Operand>, TemplateError> {
        Ok(match expr {
            Expr::Leaf(path) => Expr::Leaf(self.resolve(&path)?),
            Expr::Literal(v) => Expr::Literal(v),
            Expr::Not(inner) => Expr::Not(Box::new(self.expr(*inner)?)),
            Expr::Binary(l, op, r) => Expr::Binary(Box::new(self.expr(*l)?), op, Box::new(self.expr(*r)?)),
        })
    }

    fn resolve(&self, path: &Path) -> Result<Operand, TemplateError> {
        let undefined = || {
            TemplateError::compile(path.offset, format!("undefined variable ${}", path.segments.join(".")))
        };
        let (head, rest) = path.segments.split_first().ok_or_else(undefined)?;

        if let Some(depth) = self.locals.iter().rposition(|v| v == head) {
            return Ok(Operand::Local {
                depth,
                path: rest.to_vec(),
            });
        }
        match head.as_str() {
            "foreach" if !self.locals.is_empty() => {
                let depth = self.locals.len() - 1;
                match rest {
                    [meta] if meta == "hasNext" => Ok(Operand::HasNext(depth)),
                    [meta] if meta == "index" => Ok(Operand::Index(depth)),
                    _ => Err(undefined()),
                }
            }
            "Has" => match rest {
                [name] => self
                    .presence
                    .index_of(name)
                    .map(Operand::Presence)
                    .ok_or_else(undefined),
                _ => Err(undefined()),
            },
            "Unsafe" => match rest.split_first() {
                Some((name, fields)) => self.value(path, name, fields),
                None => Err(undefined()),
            },
            name if rest.is_empty() && CommonParam::from_name(name).is_some() => {
                CommonParam::from_name(name).map(Operand::Common).ok_or_else(undefined)
            }
            name => self.value(path, name, rest),
        }
    }

    fn value(&self, path: &Path, name: &str, fields: &[String]) -> Result<Operand, TemplateError> {
        let index = self.values.index_of(name).ok_or_else(|| {
            TemplateError::compile(path.offset, format!("undefined variable ${}", path.segments.join(".")))
        })?;
        let mut ty = self.values.field(index).map(|f| &f.ty);
        let mut positions = Vec::with_capacity(fields.len());
        for field in fields {
            let record = match ty {
                Some(FieldType::One(record)) => record,
                _ => {
                    return Err(TemplateError::compile(
                        path.offset,
                        format!("${} has no field {}", path.segments.join("."), field),
                    ))
                }
            };
            let position = record.index_of(field).ok_or_else(|| {
                TemplateError::compile(
                    path.offset,
                    format!("type {} has no field {}", record.name(), field),
                )
            })?;
            positions.push(position);
            ty = record.field(position).map(|f| &f.ty);
        }
        Ok(Operand::Value {
            index,
            path: positions,
        })
    }
}
