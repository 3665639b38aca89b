//! SQL source templates: compiled once per view, evaluated per request.

mod compile;
mod eval;
mod parser;

pub use compile::CommonParam;

use std::sync::Arc;

use crate::error::{SchemaError, TemplateError};
use crate::value::{DataType, Field, FieldType, Record, RecordType};
use crate::view::Parameter;
use compile::{compile, uses, Program};
use eval::{place, Renderer};

/// Fragments the query builder supplies for `$CRITERIA`, `$PAGINATION` and `$COLUMN_IN`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CommonParams {
    pub criteria: String,
    pub pagination: String,
    pub column_in: String,
}

#[derive(Debug)]
pub struct Template {
    source: String,
    parameters: Vec<Parameter>,
    values_type: Arc<RecordType>,
    presence_type: Arc<RecordType>,
    sql: Program,
    criteria: Option<Program>,
}

impl Template {
    /// Compiles `source` and the optional view `criteria` against `parameters`.
    /// Parameter `i` is field `i` of both the values and the presence records.
    pub fn new(
        view: &str,
        source: &str,
        criteria: Option<&str>,
        parameters: Vec<Parameter>,
    ) -> Result<Self, TemplateError> {
        let duplicate = |name: &str| TemplateError::compile(0, format!("duplicate parameter {}", name));
        let mut values = RecordType::builder(format!("{}Values", view));
        let mut presence = RecordType::builder(format!("{}Has", view));
        for param in &parameters {
            values.push(Field::new(&param.name, param.ty.clone()));
            presence.push(Field::new(&param.presence_name, FieldType::scalar(DataType::Bool)));
        }
        let values_type = Arc::new(values.build().map_err(|SchemaError::DuplicateField(name)| duplicate(&name))?);
        let presence_type = Arc::new(presence.build().map_err(|SchemaError::DuplicateField(name)| duplicate(&name))?);

        let sql = compile(parser::parse(source)?, &values_type, &presence_type)?;
        let criteria = criteria
            .filter(|c| !c.trim().is_empty())
            .map(|c| compile(parser::parse(c)?, &values_type, &presence_type))
            .transpose()?;
        Ok(Template {
            source: source.to_string(),
            parameters,
            values_type,
            presence_type,
            sql,
            criteria,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn values_type(&self) -> &Arc<RecordType> {
        &self.values_type
    }

    pub fn presence_type(&self) -> &Arc<RecordType> {
        &self.presence_type
    }

    pub fn new_values(&self) -> Record {
        self.values_type.new_record()
    }

    pub fn new_presence(&self) -> Record {
        self.presence_type.new_record()
    }

    /// Whether the source places `param` itself instead of leaving it to the outer query.
    pub fn uses(&self, param: CommonParam) -> bool {
        uses(&self.sql, param)
    }

    /// Renders the source for one request.
    pub fn evaluate_source(
        &self,
        values: &Record,
        presence: &Record,
        common: &CommonParams,
    ) -> Result<String, TemplateError> {
        self.check(values, presence)?;
        let text = Renderer::new(values, presence).render(&self.sql)?;
        Ok(place(&text, common))
    }

    /// Renders the view criteria; empty when the view has none.
    pub fn evaluate_criteria(&self, values: &Record, presence: &Record) -> Result<String, TemplateError> {
        let Some(criteria) = &self.criteria else {
            return Ok(String::new());
        };
        self.check(values, presence)?;
        let text = Renderer::new(values, presence).render(criteria)?;
        Ok(place(&text, &CommonParams::default()).trim().to_string())
    }

    /// Renders the source with zero parameters and a false predicate, for column detection.
    pub fn probe_source(&self) -> Result<String, TemplateError> {
        let text = Renderer::new(&self.new_values(), &self.new_presence()).render(&self.sql)?;
        Ok(place(
            &text,
            &CommonParams {
                criteria: "1=0".into(),
                ..Default::default()
            },
        ))
    }

    fn check(&self, values: &Record, presence: &Record) -> Result<(), TemplateError> {
        for (record, expected, what) in [
            (values, &self.values_type, "values"),
            (presence, &self.presence_type, "presence"),
        ] {
            let actual = record.record_type();
            if !Arc::ptr_eq(actual, expected) && **actual != **expected {
                return Err(TemplateError::Binding(format!(
                    "incompatible {} type: wanted {}, got {}",
                    what,
                    expected.name(),
                    actual.name()
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LocationKind;
    use crate::value::Value;
    use crate::view::Location;

    fn param(name: &str, data_type: DataType) -> Parameter {
        Parameter::new(name, Location::new(LocationKind::Query, name), FieldType::scalar(data_type))
    }

    fn orders_template() -> Template {
        Template::new(
            "orders",
            "(SELECT * FROM orders WHERE user_id = $user_id #if($Has.status)AND status = '$status'#end $CRITERIA)",
            Some("total > $min_total"),
            vec![
                param("user_id", DataType::Int),
                param("status", DataType::String),
                param("min_total", DataType::Int),
            ],
        )
        .unwrap()
    }

    #[test]
    fn renders_with_presence() {
        let template = orders_template();
        let mut values = template.new_values();
        let mut has = template.new_presence();
        values.set("user_id", Value::Int(7));
        let sql = template.evaluate_source(&values, &has, &CommonParams::default()).unwrap();
        assert_eq!(sql, "(SELECT * FROM orders WHERE user_id = 7  )");

        values.set("status", "OPEN".into());
        has.set("status", Value::Bool(true));
        let common = CommonParams {
            criteria: "total > 10".into(),
            ..Default::default()
        };
        let sql = template.evaluate_source(&values, &has, &common).unwrap();
        assert_eq!(
            sql,
            "(SELECT * FROM orders WHERE user_id = 7 AND status = 'OPEN' AND total > 10)"
        );
    }

    #[test]
    fn renders_criteria() {
        let template = orders_template();
        let mut values = template.new_values();
        values.set("min_total", Value::Int(50));
        let criteria = template.evaluate_criteria(&values, &template.new_presence()).unwrap();
        assert_eq!(criteria, "total > 50");
        assert!(template.uses(CommonParam::Criteria));
        assert!(!template.uses(CommonParam::Pagination));
    }

    #[test]
    fn probe_uses_false_predicate() {
        let template = orders_template();
        assert_eq!(
            template.probe_source().unwrap(),
            "(SELECT * FROM orders WHERE user_id = 0  AND 1=0)"
        );
    }

    #[test]
    fn rejects_foreign_records() {
        let template = orders_template();
        let other = Template::new("x", "t", None, vec![param("a", DataType::Int)]).unwrap();
        let err = template
            .evaluate_source(&other.new_values(), &template.new_presence(), &CommonParams::default())
            .unwrap_err();
        assert!(matches!(err, TemplateError::Binding(_)));
    }

    #[test]
    fn foreach_renders_lists() {
        let template = Template::new(
            "t",
            "id IN (#foreach($id in $ids)$id#if($foreach.hasNext), #end#end)",
            None,
            vec![param("ids", DataType::Array(Box::new(DataType::Int)))],
        )
        .unwrap();
        let mut values = template.new_values();
        values.set("ids", Value::Array(vec![Value::Int(1), Value::Int(2), Value::Int(3)]));
        let sql = template
            .evaluate_source(&values, &template.new_presence(), &CommonParams::default())
            .unwrap();
        assert_eq!(sql, "id IN (1, 2, 3)");
    }

    #[test]
    fn duplicate_parameters_fail() {
        let err = Template::new("t", "x", None, vec![param("a", DataType::Int), param("a", DataType::Int)])
            .unwrap_err();
        assert!(matches!(err, TemplateError::Compile { .. }));
    }
}
