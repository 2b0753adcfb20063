//! runtime attribute schemas
//!
//! An [AttributeSpec] lists the attributes a block body may contain, whether each one is required and which
//! [ValueType] its evaluated value must have. Specs are plain values: they are built in code with the builder methods
//! or read from a declarative description ([AttributeSpec::from_body]):
//!
//! ```hcl
//! attribute "key" {
//!   type     = "string"
//!   required = true
//! }
//! ```
//!
//! [AttributeSpec::decode] is the generic decoder driven by such a spec.
use crate::body::{NestedBlock, PartialBody};
use crate::diagnostics::{DecodeError, Diagnostics, Origin};
use crate::eval::{EvalError, Evaluator};
use crate::value::Value;
use hcl::Expression;
use indexmap::IndexMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    String,
    Number,
    Bool,
    List,
    Object,
    Any,
}

impl ValueType {
    pub const ALL: [ValueType; 6] = [
        ValueType::String,
        ValueType::Number,
        ValueType::Bool,
        ValueType::List,
        ValueType::Object,
        ValueType::Any,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::String => "string",
            ValueType::Number => "number",
            ValueType::Bool => "bool",
            ValueType::List => "list",
            ValueType::Object => "object",
            ValueType::Any => "any",
        }
    }

    /// `null` is only accepted by [ValueType::Any]
    pub fn accepts(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (ValueType::Any, _)
                | (ValueType::String, Value::String(_))
                | (ValueType::Number, Value::Integer(_) | Value::Decimal(_))
                | (ValueType::Bool, Value::Boolean(_))
                | (ValueType::List, Value::Array(_))
                | (ValueType::Object, Value::Object(_))
        )
    }
}

impl Display for ValueType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValueType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ValueType::ALL
            .into_iter()
            .find(|value_type| value_type.as_str() == s)
            .ok_or_else(|| {
                let known: Vec<_> = ValueType::ALL.iter().map(ValueType::as_str).collect();
                format!("unknown type `{s}`, expected one of: {}", known.join(", "))
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttrSpec {
    pub required: bool,
    pub value_type: ValueType,
}

/// Declared attributes, in declaration order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeSpec {
    attributes: IndexMap<String, AttrSpec>,
}

impl AttributeSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(self, name: impl Into<String>, value_type: ValueType) -> Self {
        self.with(name, true, value_type)
    }

    pub fn optional(self, name: impl Into<String>, value_type: ValueType) -> Self {
        self.with(name, false, value_type)
    }

    fn with(mut self, name: impl Into<String>, required: bool, value_type: ValueType) -> Self {
        self.attributes.insert(
            name.into(),
            AttrSpec {
                required,
                value_type,
            },
        );
        self
    }

    pub fn get(&self, name: &str) -> Option<&AttrSpec> {
        self.attributes.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttrSpec)> {
        self.attributes
            .iter()
            .map(|(name, spec)| (name.as_str(), spec))
    }

    /// Reads `attribute "<name>" { type = "<type>" required = <bool> }` blocks
    ///
    /// `type` defaults to `any`, `required` to `false`. Issues are logged, the attributes that could be read are kept.
    pub fn from_body(mut body: PartialBody, origin: &Origin, diagnostics: &mut Diagnostics) -> Self {
        let mut spec = AttributeSpec::new();

        for block in body.take_blocks("attribute") {
            let Some(NestedBlock {
                label,
                origin: attribute_origin,
                body: mut attribute_body,
            }) = NestedBlock::open(block, 1, origin, diagnostics)
            else {
                continue;
            };
            let name = label.unwrap_or_default();

            if spec.attributes.contains_key(&name) {
                diagnostics.log(
                    &attribute_origin,
                    DecodeError::DuplicateLabel {
                        block: "attribute".into(),
                        label: name,
                    },
                );
                continue;
            }

            let value_type = attribute_body
                .take_string("type", &attribute_origin, diagnostics)
                .map(|value_type| {
                    value_type.parse::<ValueType>().unwrap_or_else(|message| {
                        diagnostics.log(
                            &attribute_origin,
                            DecodeError::InvalidValue {
                                name: "type".into(),
                                message,
                            },
                        );
                        ValueType::Any
                    })
                })
                .unwrap_or(ValueType::Any);

            let required = match attribute_body.take_attribute("required") {
                None => false,
                Some(attribute) => match attribute.expr {
                    Expression::Bool(required) => required,
                    _ => {
                        diagnostics.log(
                            &attribute_origin,
                            DecodeError::InvalidValue {
                                name: "required".into(),
                                message: "expected `true` or `false`".into(),
                            },
                        );
                        false
                    }
                },
            };

            attribute_body.finish(&attribute_origin, diagnostics);
            spec = spec.with(name, required, value_type);
        }

        body.finish(origin, diagnostics);
        spec
    }

    /// Checks the shape of `body` without evaluating anything
    ///
    /// Logs unexpected attributes and blocks as well as missing required attributes.
    pub fn check(&self, body: &hcl::Body, origin: &Origin, diagnostics: &mut Diagnostics) {
        for attribute in body.attributes() {
            if self.get(attribute.key.as_str()).is_none() {
                diagnostics.log(
                    origin,
                    DecodeError::UnexpectedAttribute {
                        name: attribute.key.to_string(),
                    },
                );
            }
        }

        for block in body.blocks() {
            diagnostics.log(
                origin,
                DecodeError::UnexpectedBlock {
                    name: block.identifier.to_string(),
                },
            );
        }

        for (name, _) in self.iter().filter(|(_, spec)| spec.required) {
            if !body.attributes().any(|attribute| attribute.key.as_str() == name) {
                diagnostics.log(
                    origin,
                    DecodeError::MissingAttribute {
                        name: name.to_string(),
                    },
                );
            }
        }
    }

    /// Evaluates every declared attribute of `body`
    ///
    /// Absent optional attributes are left out of the result. The first problem ends decoding.
    pub fn decode(
        &self,
        body: &hcl::Body,
        evaluator: &Evaluator,
    ) -> Result<IndexMap<String, Value>, AttributeError> {
        if let Some(attribute) = body
            .attributes()
            .find(|attribute| self.get(attribute.key.as_str()).is_none())
        {
            return Err(AttributeError::UnexpectedAttribute {
                name: attribute.key.to_string(),
            });
        }

        if let Some(block) = body.blocks().next() {
            return Err(AttributeError::UnexpectedBlock {
                name: block.identifier.to_string(),
            });
        }

        let mut values = IndexMap::new();
        for (name, spec) in self.iter() {
            let Some(attribute) = body
                .attributes()
                .find(|attribute| attribute.key.as_str() == name)
            else {
                if spec.required {
                    return Err(AttributeError::MissingAttribute {
                        name: name.to_string(),
                    });
                }
                continue;
            };

            let value =
                evaluator
                    .evaluate(&attribute.expr)
                    .map_err(|source| AttributeError::Evaluation {
                        name: name.to_string(),
                        source,
                    })?;

            if !spec.value_type.accepts(&value) {
                return Err(AttributeError::TypeMismatch {
                    name: name.to_string(),
                    expected: spec.value_type,
                    actual: value.type_name().to_string(),
                });
            }

            values.insert(name.to_string(), value);
        }

        Ok(values)
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum AttributeError {
    #[error("missing required attribute `{name}`")]
    MissingAttribute { name: String },
    #[error("unexpected attribute `{name}`")]
    UnexpectedAttribute { name: String },
    #[error("unexpected block `{name}`")]
    UnexpectedBlock { name: String },
    #[error("attribute `{name}` must be of type {expected}, got {actual}")]
    TypeMismatch {
        name: String,
        expected: ValueType,
        actual: String,
    },
    #[error("unable to evaluate attribute `{name}`")]
    Evaluation {
        name: String,
        #[source]
        source: EvalError,
    },
}
