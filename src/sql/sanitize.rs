//! Request-supplied criteria and ordering. Identifiers must resolve to view
//! columns, literals become bind arguments, anything else is rejected.

use regex::Regex;
use std::sync::OnceLock;

use crate::value::Value;

/// A sanitized predicate; every `?` in `sql` is a bind argument.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Criteria {
    pub sql: String,
    pub args: Vec<Value>,
}

const KEYWORDS: &[&str] = &[
    "AND", "OR", "NOT", "IN", "IS", "NULL", "LIKE", "ILIKE", "BETWEEN", "TRUE", "FALSE",
];

fn tokens() -> Option<&'static Regex> {
    static TOKENS: OnceLock<Option<Regex>> = OnceLock::new();
    TOKENS
        .get_or_init(|| {
            Regex::new(
            r"^(?:(?P<ws>\s+)|(?P<str>'(?:[^']|'')*')|(?P<num>-?\d+(?:\.\d+)?)|(?P<ident>[A-Za-z_][A-Za-z0-9_]*)|(?P<op><>|!=|<=|>=|=|<|>)|(?P<punct>[(),]))",
            )
            .ok()
        })
        .as_ref()
}

/// Rewrites `input` with identifiers resolved through `column` and literals bound.
pub fn criteria(input: &str, column: impl Fn(&str) -> Option<String>) -> Result<Criteria, String> {
    let mut out = Criteria::default();
    let mut rest = input.trim();
    let mut depth = 0i32;
    let tokens = tokens().ok_or_else(|| "criteria tokenizer unavailable".to_string())?;
    while !rest.is_empty() {
        let caps = tokens
            .captures(rest)
            .ok_or_else(|| format!("unexpected input at {:?}", rest.chars().take(10).collect::<String>()))?;
        let whole = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
        if caps.name("ws").is_some() {
            out.sql.push(' ');
        } else if let Some(s) = caps.name("str") {
            let text = s.as_str();
            out.sql.push('?');
            out.args.push(Value::String(text[1..text.len() - 1].replace("''", "'")));
        } else if let Some(n) = caps.name("num") {
            out.sql.push('?');
            let text = n.as_str();
            let value = match text.parse::<i64>() {
                Ok(i) => Value::Int(i),
                Err(_) => text.parse::<f64>().map(Value::Float).map_err(|e| e.to_string())?,
            };
            out.args.push(value);
        } else if let Some(ident) = caps.name("ident") {
            let upper = ident.as_str().to_uppercase();
            if KEYWORDS.contains(&upper.as_str()) {
                out.sql.push_str(&upper);
            } else {
                let name = column(ident.as_str())
                    .ok_or_else(|| format!("column {} is not filterable", ident.as_str()))?;
                out.sql.push_str(&name);
            }
        } else {
            match whole {
                "(" => depth += 1,
                ")" => depth -= 1,
                _ => {}
            }
            if depth < 0 {
                return Err("unbalanced parentheses".into());
            }
            out.sql.push_str(whole);
        }
        rest = &rest[whole.len()..];
    }
    if depth != 0 {
        return Err("unbalanced parentheses".into());
    }
    Ok(out)
}

/// Validates `col [ASC|DESC], ...`.
pub fn order_by(input: &str, column: impl Fn(&str) -> Option<String>) -> Result<String, String> {
    let mut items = Vec::new();
    for item in input.split(',') {
        let mut words = item.split_whitespace();
        let name = words.next().ok_or_else(|| "empty order by item".to_string())?;
        let name = column(name).ok_or_else(|| format!("unknown order by column {}", name))?;
        let item = match words.next().map(|w| w.to_uppercase()) {
            None => name,
            Some(dir) if dir == "ASC" || dir == "DESC" => format!("{} {}", name, dir),
            Some(other) => return Err(format!("invalid order by direction {}", other)),
        };
        if words.next().is_some() {
            return Err(format!("invalid order by item {}", item.trim()));
        }
        items.push(item);
    }
    Ok(items.join(", "))
}
