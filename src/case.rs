//! Identifier case formats: column names -> record field names, plus lookup keys.

use serde::{Deserialize, Serialize};

/// Naming convention of a set of identifiers, e.g. column names of a view.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaseFormat {
    /// order_id
    #[default]
    #[serde(rename = "lu", alias = "lower_underscore")]
    LowerUnderscore,
    /// ORDER_ID
    #[serde(rename = "uu", alias = "upper_underscore")]
    UpperUnderscore,
    /// orderId
    #[serde(rename = "lc", alias = "lower_camel")]
    LowerCamel,
    /// OrderId
    #[serde(rename = "uc", alias = "upper_camel")]
    UpperCamel,
    /// orderid
    #[serde(rename = "l", alias = "lower")]
    Lower,
    /// ORDERID
    #[serde(rename = "u", alias = "upper")]
    Upper,
}

impl CaseFormat {
    /// Guesses the format of a single identifier.
    pub fn detect(s: &str) -> CaseFormat {
        let has_lower = s.chars().any(|c| c.is_lowercase());
        let has_upper = s.chars().any(|c| c.is_uppercase());
        if s.contains('_') {
            return if has_lower {
                CaseFormat::LowerUnderscore
            } else {
                CaseFormat::UpperUnderscore
            };
        }
        match (has_lower, has_upper) {
            (true, true) if s.starts_with(|c: char| c.is_uppercase()) => CaseFormat::UpperCamel,
            (true, true) => CaseFormat::LowerCamel,
            (false, true) => CaseFormat::Upper,
            _ => CaseFormat::Lower,
        }
    }

    /// Splits an identifier written in this format into lowercase words.
    pub fn words(self, s: &str) -> Vec<String> {
        match self {
            CaseFormat::LowerUnderscore | CaseFormat::UpperUnderscore => s
                .split('_')
                .filter(|w| !w.is_empty())
                .map(str::to_lowercase)
                .collect(),
            CaseFormat::LowerCamel | CaseFormat::UpperCamel => split_camel(s),
            CaseFormat::Lower | CaseFormat::Upper => vec![s.to_lowercase()],
        }
    }

    /// Formats lowercase words in this format.
    pub fn join(self, words: &[String]) -> String {
        match self {
            CaseFormat::LowerUnderscore => words.join("_"),
            CaseFormat::UpperUnderscore => words.join("_").to_uppercase(),
            CaseFormat::LowerCamel => {
                let mut out = String::new();
                for (i, w) in words.iter().enumerate() {
                    if i == 0 {
                        out.push_str(w);
                    } else {
                        out.push_str(&capitalize(w));
                    }
                }
                out
            }
            CaseFormat::UpperCamel => words.iter().map(|w| capitalize(w)).collect(),
            CaseFormat::Lower => words.concat(),
            CaseFormat::Upper => words.concat().to_uppercase(),
        }
    }

    /// Converts `s` from this format to `target`.
    pub fn format(self, s: &str, target: CaseFormat) -> String {
        target.join(&self.words(s))
    }
}

fn split_camel(s: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;
    for c in s.chars() {
        if c.is_uppercase() && prev_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        prev_lower = c.is_lowercase() || c.is_ascii_digit();
        current.extend(c.to_lowercase());
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Field name for a column: the column converted to UpperCamel.
/// `format` is the view's configured column format; when absent it is detected per column.
pub fn field_name(column: &str, format: Option<CaseFormat>) -> String {
    let source = format.unwrap_or_else(|| CaseFormat::detect(column));
    let name = source.format(column, CaseFormat::UpperCamel);
    if name.is_empty() {
        column.to_string()
    } else {
        name
    }
}

/// Keys under which a name is registered for case-insensitive lookup.
pub fn lookup_keys(name: &str) -> Vec<String> {
    let mut keys = vec![
        name.to_string(),
        name.to_uppercase(),
        name.to_lowercase(),
        field_name(name, None),
    ];
    keys.dedup();
    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_names_are_upper_camel() {
        assert_eq!(field_name("order_id", None), "OrderId");
        assert_eq!(field_name("ORDER_ID", None), "OrderId");
        assert_eq!(field_name("orderId", None), "OrderId");
        assert_eq!(field_name("id", Some(CaseFormat::LowerUnderscore)), "Id");
        assert_eq!(field_name("ID", None), "Id");
    }

    #[test]
    fn converts_between_formats() {
        let camel = CaseFormat::LowerUnderscore.format("created_at", CaseFormat::LowerCamel);
        assert_eq!(camel, "createdAt");
        let snake = CaseFormat::LowerCamel.format("createdAt", CaseFormat::UpperUnderscore);
        assert_eq!(snake, "CREATED_AT");
    }

    #[test]
    fn detects_formats() {
        assert_eq!(CaseFormat::detect("user_id"), CaseFormat::LowerUnderscore);
        assert_eq!(CaseFormat::detect("USER_ID"), CaseFormat::UpperUnderscore);
        assert_eq!(CaseFormat::detect("userId"), CaseFormat::LowerCamel);
        assert_eq!(CaseFormat::detect("UserId"), CaseFormat::UpperCamel);
        assert_eq!(CaseFormat::detect("NAME"), CaseFormat::Upper);
    }

    #[test]
    fn deserializes_short_names() {
        let format: CaseFormat = serde_json::from_str("\"uu\"").unwrap();
        assert_eq!(format, CaseFormat::UpperUnderscore);
        let format: CaseFormat = serde_json::from_str("\"lower_camel\"").unwrap();
        assert_eq!(format, CaseFormat::LowerCamel);
    }
}
