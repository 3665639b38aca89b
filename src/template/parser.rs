//! Template text -> syntax tree.
//!
//! Recognised constructs: `$name`, `${name}`, `$a.b.c`, `#if(expr)`,
//! `#elseif(expr)`, `#else`, `#end`, `#foreach($x in $list)`, `##` line
//! comments and `#* ... *#` block comments. Anything else is literal text, so
//! `$1`, `$$` and a lone `#` pass through untouched.

use crate::error::TemplateError;
use crate::value::Value;

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Path {
    pub segments: Vec<String>,
    pub offset: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum BinOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Expr<T> {
    Leaf(T),
    Literal(Value),
    Not(Box<Expr<T>>),
    Binary(Box<Expr<T>>, BinOp, Box<Expr<T>>),
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Node<T> {
    Text(String),
    Emit(T),
    If {
        branches: Vec<(Expr<T>, Vec<Node<T>>)>,
        otherwise: Vec<Node<T>>,
    },
    ForEach {
        var: String,
        source: T,
        body: Vec<Node<T>>,
    },
}

pub(crate) fn parse(src: &str) -> Result<Vec<Node<Path>>, TemplateError> {
    let mut parser = Parser { src, pos: 0 };
    let (nodes, stop) = parser.block()?;
    match stop {
        Stop::Eof => Ok(nodes),
        Stop::End => Err(TemplateError::compile(parser.pos, "unexpected #end")),
        Stop::Else | Stop::ElseIf(_) => Err(TemplateError::compile(parser.pos, "#else without #if")),
    }
}

enum Stop {
    Eof,
    End,
    Else,
    ElseIf(Expr<Path>),
}

enum Directive {
    If(Expr<Path>),
    ElseIf(Expr<Path>),
    Else,
    End,
    ForEach(String, Path),
    Comment,
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn skip_ws(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn eat(&mut self, s: &str) -> bool {
        if self.rest().starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, s: &str) -> Result<(), TemplateError> {
        if self.eat(s) {
            Ok(())
        } else {
            Err(TemplateError::compile(self.pos, format!("expected '{}'", s)))
        }
    }

    fn ident(&mut self) -> Option<&'a str> {
        let rest = self.rest();
        if !rest.starts_with(is_ident_start) {
            return None;
        }
        let len = rest.find(|c: char| !is_ident(c)).unwrap_or(rest.len());
        self.pos += len;
        Some(&rest[..len])
    }

    fn block(&mut self) -> Result<(Vec<Node<Path>>, Stop), TemplateError> {
        let mut nodes = Vec::new();
        let mut text = String::new();
        let flush = |text: &mut String, nodes: &mut Vec<Node<Path>>| {
            if !text.is_empty() {
                nodes.push(Node::Text(std::mem::take(text)));
            }
        };
        while let Some(c) = self.peek() {
            if c == '#' {
                if let Some(directive) = self.directive()? {
                    flush(&mut text, &mut nodes);
                    match directive {
                        Directive::If(cond) => nodes.push(self.if_chain(cond)?),
                        Directive::ForEach(var, source) => {
                            let start = self.pos;
                            let (body, stop) = self.block()?;
                            if !matches!(stop, Stop::End) {
                                return Err(TemplateError::compile(start, "unterminated #foreach"));
                            }
                            nodes.push(Node::ForEach { var, source, body });
                        }
                        Directive::End => return Ok((nodes, Stop::End)),
                        Directive::Else => return Ok((nodes, Stop::Else)),
                        Directive::ElseIf(cond) => return Ok((nodes, Stop::ElseIf(cond))),
                        Directive::Comment => {}
                    }
                    continue;
                }
            } else if c == '$' {
                if let Some(path) = self.reference()? {
                    flush(&mut text, &mut nodes);
                    nodes.push(Node::Emit(path));
                    continue;
                }
            }
            text.push(c);
            self.pos += c.len_utf8();
        }
        flush(&mut text, &mut nodes);
        Ok((nodes, Stop::Eof))
    }

    fn if_chain(&mut self, first: Expr<Path>) -> Result<Node<Path>, TemplateError> {
        let start = self.pos;
        let mut branches = Vec::new();
        let mut cond = first;
        loop {
            let (body, stop) = self.block()?;
            branches.push((cond, body));
            match stop {
                Stop::End => {
                    return Ok(Node::If {
                        branches,
                        otherwise: Vec::new(),
                    })
                }
                Stop::ElseIf(next) => cond = next,
                Stop::Else => {
                    let (otherwise, stop) = self.block()?;
                    if !matches!(stop, Stop::End) {
                        return Err(TemplateError::compile(start, "expected #end after #else"));
                    }
                    return Ok(Node::If { branches, otherwise });
                }
                Stop::Eof => return Err(TemplateError::compile(start, "unterminated #if")),
            }
        }
    }

    fn directive(&mut self) -> Result<Option<Directive>, TemplateError> {
        let start = self.pos;
        if self.eat("##") {
            let rest = self.rest();
            self.pos += rest.find('\n').unwrap_or(rest.len());
            return Ok(Some(Directive::Comment));
        }
        if self.eat("#*") {
            let end = self
                .rest()
                .find("*#")
                .ok_or_else(|| TemplateError::compile(start, "unterminated comment"))?;
            self.pos += end + 2;
            return Ok(Some(Directive::Comment));
        }
        if self.rest().starts_with("#if(") || self.rest().starts_with("#if (") {
            self.pos += 3;
            return self.paren_expr().map(|e| Some(Directive::If(e)));
        }
        if self.rest().starts_with("#elseif(") || self.rest().starts_with("#elseif (") {
            self.pos += 7;
            return self.paren_expr().map(|e| Some(Directive::ElseIf(e)));
        }
        if self.eat("#{else}") || self.eat("#else") {
            return Ok(Some(Directive::Else));
        }
        if self.eat("#{end}") || self.eat("#end") {
            return Ok(Some(Directive::End));
        }
        if self.rest().starts_with("#foreach(") || self.rest().starts_with("#foreach (") {
            self.pos += 8;
            self.skip_ws();
            self.expect("(")?;
            self.skip_ws();
            self.expect("$")?;
            let var = self
                .ident()
                .ok_or_else(|| TemplateError::compile(self.pos, "expected loop variable"))?
                .to_string();
            self.skip_ws();
            if self.ident() != Some("in") {
                return Err(TemplateError::compile(self.pos, "expected 'in'"));
            }
            self.skip_ws();
            let source = self
                .reference()?
                .ok_or_else(|| TemplateError::compile(self.pos, "expected a collection reference"))?;
            self.skip_ws();
            self.expect(")")?;
            return Ok(Some(Directive::ForEach(var, source)));
        }
        Ok(None)
    }

    /// `$a.b`, `${a.b}` or `$!a`; `None` leaves the `$` as text.
    fn reference(&mut self) -> Result<Option<Path>, TemplateError> {
        let start = self.pos;
        let rest = self.rest();
        let mut after = 1;
        if rest[after..].starts_with('!') {
            after += 1;
        }
        if rest[after..].starts_with('{') {
            let close = rest[after..]
                .find('}')
                .ok_or_else(|| TemplateError::compile(start, "unterminated ${"))?;
            let inner = &rest[after + 1..after + close];
            let segments: Vec<String> = inner.split('.').map(|s| s.trim().to_string()).collect();
            if segments
                .iter()
                .any(|s| !s.starts_with(is_ident_start) || !s.chars().all(is_ident))
            {
                return Err(TemplateError::compile(start, format!("invalid reference ${{{}}}", inner)));
            }
            self.pos += after + close + 1;
            return Ok(Some(Path {
                segments,
                offset: start,
            }));
        }
        if !rest[after..].starts_with(is_ident_start) {
            return Ok(None);
        }
        self.pos += after;
        let mut segments = Vec::new();
        while let Some(ident) = self.ident() {
            segments.push(ident.to_string());
            let rest = self.rest();
            if rest.starts_with('.') && rest[1..].starts_with(is_ident_start) {
                self.pos += 1;
            } else {
                break;
            }
        }
        Ok(Some(Path {
            segments,
            offset: start,
        }))
    }

    fn paren_expr(&mut self) -> Result<Expr<Path>, TemplateError> {
        self.skip_ws();
        self.expect("(")?;
        let expr = self.or_expr()?;
        self.skip_ws();
        self.expect(")")?;
        Ok(expr)
    }

    fn keyword(&mut self, words: &[&str], symbols: &[&str]) -> bool {
        self.skip_ws();
        for symbol in symbols {
            if self.eat(symbol) {
                return true;
            }
        }
        let save = self.pos;
        if let Some(word) = self.ident() {
            if words.contains(&word) {
                return true;
            }
        }
        self.pos = save;
        false
    }

    fn or_expr(&mut self) -> Result<Expr<Path>, TemplateError> {
        let mut left = self.and_expr()?;
        while self.keyword(&["or"], &["||"]) {
            let right = self.and_expr()?;
            left = Expr::Binary(Box::new(left), BinOp::Or, Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr<Path>, TemplateError> {
        let mut left = self.comparison()?;
        while self.keyword(&["and"], &["&&"]) {
            let right = self.comparison()?;
            left = Expr::Binary(Box::new(left), BinOp::And, Box::new(right));
        }
        Ok(left)
    }

    fn comparison(&mut self) -> Result<Expr<Path>, TemplateError> {
        let left = self.unary()?;
        let op = [
            (BinOp::Eq, "eq", "=="),
            (BinOp::Ne, "ne", "!="),
            (BinOp::Le, "le", "<="),
            (BinOp::Ge, "ge", ">="),
            (BinOp::Lt, "lt", "<"),
            (BinOp::Gt, "gt", ">"),
        ]
        .into_iter()
        .find(|&(_, word, symbol)| self.keyword(&[word], &[symbol]))
        .map(|(op, _, _)| op);
        match op {
            Some(op) => {
                let right = self.unary()?;
                Ok(Expr::Binary(Box::new(left), op, Box::new(right)))
            }
            None => Ok(left),
        }
    }

    fn unary(&mut self) -> Result<Expr<Path>, TemplateError> {
        self.skip_ws();
        if self.rest().starts_with('!') && !self.rest().starts_with("!=") {
            self.pos += 1;
            return Ok(Expr::Not(Box::new(self.unary()?)));
        }
        if self.keyword(&["not"], &[]) {
            return Ok(Expr::Not(Box::new(self.unary()?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr<Path>, TemplateError> {
        self.skip_ws();
        let start = self.pos;
        match self.peek() {
            Some('(') => {
                self.pos += 1;
                let inner = self.or_expr()?;
                self.skip_ws();
                self.expect(")")?;
                Ok(inner)
            }
            Some('$') => self
                .reference()?
                .map(Expr::Leaf)
                .ok_or_else(|| TemplateError::compile(start, "expected a reference")),
            Some(quote @ ('\'' | '"')) => {
                let body = &self.rest()[1..];
                let end = body
                    .find(quote)
                    .ok_or_else(|| TemplateError::compile(start, "unterminated string"))?;
                let literal = body[..end].to_string();
                self.pos += end + 2;
                Ok(Expr::Literal(Value::String(literal)))
            }
            Some(c) if c.is_ascii_digit() || c == '-' => {
                let rest = self.rest();
                let len = rest[1..]
                    .find(|c: char| !(c.is_ascii_digit() || c == '.'))
                    .map(|i| i + 1)
                    .unwrap_or(rest.len());
                let text = &rest[..len];
                self.pos += len;
                if let Ok(i) = text.parse::<i64>() {
                    Ok(Expr::Literal(Value::Int(i)))
                } else {
                    text.parse::<f64>()
                        .map(|f| Expr::Literal(Value::Float(f)))
                        .map_err(|_| TemplateError::compile(start, format!("invalid number {}", text)))
                }
            }
            _ => match self.ident() {
                Some("true") => Ok(Expr::Literal(Value::Bool(true))),
                Some("false") => Ok(Expr::Literal(Value::Bool(false))),
                Some("null") => Ok(Expr::Literal(Value::Null)),
                _ => Err(TemplateError::compile(start, "expected an expression")),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(segments: &[&str], offset: usize) -> Path {
        Path {
            segments: segments.iter().map(|s| s.to_string()).collect(),
            offset,
        }
    }

    #[test]
    fn keeps_positional_and_double_dollar_literal() {
        let nodes = parse("SELECT $1, $$ FROM t # x").unwrap();
        assert_eq!(nodes, vec![Node::Text("SELECT $1, $$ FROM t # x".into())]);
    }

    #[test]
    fn parses_references() {
        let nodes = parse("a=$Unsafe.id AND ${b}.").unwrap();
        assert_eq!(
            nodes,
            vec![
                Node::Text("a=".into()),
                Node::Emit(path(&["Unsafe", "id"], 2)),
                Node::Text(" AND ".into()),
                Node::Emit(path(&["b"], 17)),
                Node::Text(".".into()),
            ]
        );
    }

    #[test]
    fn parses_if_chains() {
        let nodes = parse("#if($Has.a && $b > 2)A#elseif(!$c)B#{else}C#end").unwrap();
        match &nodes[0] {
            Node::If { branches, otherwise } => {
                assert_eq!(branches.len(), 2);
                assert!(matches!(branches[0].0, Expr::Binary(_, BinOp::And, _)));
                assert!(matches!(branches[1].0, Expr::Not(_)));
                assert_eq!(otherwise, &vec![Node::Text("C".into())]);
            }
            other => panic!("unexpected node {:?}", other),
        }
    }

    #[test]
    fn parses_foreach_and_comments() {
        let nodes = parse("## note\n#foreach($id in $ids)$id#if($foreach.hasNext),#end#end").unwrap();
        match &nodes[1] {
            Node::ForEach { var, source, body } => {
                assert_eq!(var, "id");
                assert_eq!(source.segments, vec!["ids".to_string()]);
                assert_eq!(body.len(), 2);
            }
            other => panic!("unexpected node {:?}", other),
        }
    }

    #[test]
    fn reports_unbalanced_directives() {
        assert!(matches!(parse("#if($a) x"), Err(TemplateError::Compile { .. })));
        assert!(matches!(parse("x #end"), Err(TemplateError::Compile { .. })));
        assert!(matches!(parse("#foreach($a $b)#end"), Err(TemplateError::Compile { .. })));
    }
}
