use std::sync::Arc;

use super::View;
use crate::codec::CodecRef;
use crate::config::LocationKind;
use crate::value::FieldType;

/// Where a parameter value comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Location {
    pub kind: LocationKind,
    pub name: String,
}

impl Location {
    pub fn new(kind: LocationKind, name: impl Into<String>) -> Self {
        Location {
            kind,
            name: name.into(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Parameter {
    pub name: String,
    /// Field name of the parameter in the presence record (`$Has.<presence_name>`).
    pub presence_name: String,
    pub location: Location,
    pub required: bool,
    pub ty: FieldType,
    pub format: Option<String>,
    pub codec: Option<CodecRef>,
    /// Source view of a data-view parameter.
    pub view: Option<Arc<View>>,
    pub description: Option<String>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, location: Location, ty: FieldType) -> Self {
        let name = name.into();
        Parameter {
            presence_name: name.clone(),
            name,
            location,
            required: false,
            ty,
            format: None,
            codec: None,
            view: None,
            description: None,
        }
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }
}
