//! Config validation: unique names, referential integrity and ref cycles.

use crate::config::{LocationKind, ParameterConfig, ResourceConfig, ViewConfig};
use crate::error::ConfigError;
use std::collections::{HashMap, HashSet};

pub fn validate(config: &ResourceConfig) -> Result<(), ConfigError> {
    let connectors = unique_names("connector", config.connectors.iter().map(|c| c.name.as_str()))?;
    let views = unique_names("view", config.views.iter().map(|v| v.name.as_str()))?;
    let parameters = unique_names("parameter", config.parameters.iter().map(|p| p.name.as_str()))?;
    unique_names("type", config.types.iter().map(|t| t.name.as_str()))?;

    let refs = Refs {
        connectors: &connectors,
        views: &views,
        parameters: &parameters,
    };
    for param in &config.parameters {
        refs.check_parameter(param)?;
    }
    for view in &config.views {
        refs.check_view(view)?;
    }

    check_cycles(config)
}

fn unique_names<'a>(
    kind: &'static str,
    names: impl Iterator<Item = &'a str>,
) -> Result<HashSet<&'a str>, ConfigError> {
    let mut seen = HashSet::new();
    for name in names {
        if name.is_empty() {
            return Err(ConfigError::Validation(format!("{} name was empty", kind)));
        }
        if !seen.insert(name) {
            return Err(ConfigError::DuplicateName {
                kind,
                name: name.to_string(),
            });
        }
    }
    Ok(seen)
}

struct Refs<'a> {
    connectors: &'a HashSet<&'a str>,
    views: &'a HashSet<&'a str>,
    parameters: &'a HashSet<&'a str>,
}

impl Refs<'_> {
    fn check_view(&self, view: &ViewConfig) -> Result<(), ConfigError> {
        if let Some(base) = &view.reference {
            if *base == view.name {
                return Err(ConfigError::Validation(format!(
                    "view {}: name and ref cannot be the same",
                    view.name
                )));
            }
            require("view", self.views, base)?;
        }
        if let Some(connector) = &view.connector {
            if let Some(name) = &connector.reference {
                require("connector", self.connectors, name)?;
            }
        }
        if let Some(template) = &view.template {
            for param in &template.parameters {
                self.check_parameter(param)?;
            }
        }
        for rel in &view.with {
            if rel.holder.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "view {}: relation {} has no holder",
                    view.name, rel.name
                )));
            }
            if rel.column.is_empty() || rel.of.column.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "view {}: relation {} needs both join columns",
                    view.name, rel.name
                )));
            }
            self.check_view(&rel.of.view)?;
        }
        Ok(())
    }

    fn check_parameter(&self, param: &ParameterConfig) -> Result<(), ConfigError> {
        if let Some(base) = &param.reference {
            require("parameter", self.parameters, base)?;
        }
        if let Some(location) = &param.location {
            if location.kind == LocationKind::DataView {
                require("view", self.views, &location.name)?;
            }
        }
        Ok(())
    }
}

fn require(kind: &'static str, names: &HashSet<&str>, id: &str) -> Result<(), ConfigError> {
    if names.contains(id) {
        Ok(())
    } else {
        Err(ConfigError::MissingReference {
            kind,
            id: id.to_string(),
        })
    }
}

/// Rejects `ref` chains that loop back on themselves.
fn check_cycles(config: &ResourceConfig) -> Result<(), ConfigError> {
    let bases: HashMap<&str, &str> = config
        .views
        .iter()
        .filter_map(|v| v.reference.as_deref().map(|r| (v.name.as_str(), r)))
        .collect();
    for start in bases.keys() {
        let mut path = vec![*start];
        let mut current = *start;
        while let Some(next) = bases.get(current) {
            if path.contains(next) {
                path.push(next);
                return Err(ConfigError::CyclicReference(path.join(" -> ")));
            }
            path.push(next);
            current = next;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(name: &str, reference: Option<&str>) -> ViewConfig {
        ViewConfig {
            name: name.into(),
            reference: reference.map(Into::into),
            table: Some(name.into()),
            ..Default::default()
        }
    }

    #[test]
    fn accepts_ref_chains() {
        let config = ResourceConfig {
            views: vec![view("a", None), view("b", Some("a")), view("c", Some("b"))],
            ..Default::default()
        };
        validate(&config).unwrap();
    }

    #[test]
    fn detects_cycles() {
        let config = ResourceConfig {
            views: vec![view("a", Some("b")), view("b", Some("a"))],
            ..Default::default()
        };
        assert!(matches!(validate(&config), Err(ConfigError::CyclicReference(_))));
    }

    #[test]
    fn rejects_missing_and_duplicate_names() {
        let config = ResourceConfig {
            views: vec![view("a", Some("missing"))],
            ..Default::default()
        };
        assert!(matches!(
            validate(&config),
            Err(ConfigError::MissingReference { kind: "view", .. })
        ));

        let config = ResourceConfig {
            views: vec![view("a", None), view("a", None)],
            ..Default::default()
        };
        assert!(matches!(
            validate(&config),
            Err(ConfigError::DuplicateName { kind: "view", .. })
        ));
    }
}
