//! target entities
//!
//! A `target` block holds one block per output entity. The block identifier (`hub`, ...) selects the
//! [AttributeSpec] its body is decoded with:
//!
//! ```hcl
//! target "name" {
//!   hub "customer" {
//!     key      = var.id   # required string
//!     date     = nows     # optional string
//!     computed = "..."    # optional string
//!   }
//! }
//! ```
//!
//! Decoding only checks the shape of target bodies, expressions are evaluated later (see [crate::model::Model::evaluate]).
use crate::attribute_spec::{AttributeSpec, ValueType};
use crate::body::NestedBlock;
use crate::diagnostics::{DecodeError, Diagnostics, Origin};
use crate::envelope::{Envelope, EnvelopeSchema};
use crate::hcl_documents::HclDocuments;
use crate::source::expression_text;
use crate::value::Value;
use hcl::Structure;
use indexmap::{IndexMap, IndexSet};

pub const SCHEMA: EnvelopeSchema = EnvelopeSchema {
    block_kind: "target",
    label_count: 1,
    discriminator: None,
};

/// Attribute specs by target block kind
#[derive(Debug, Clone, PartialEq)]
pub struct TargetSchemas {
    kinds: IndexMap<String, AttributeSpec>,
}

impl Default for TargetSchemas {
    fn default() -> Self {
        let mut schemas = Self::empty();
        schemas.register(
            "hub",
            AttributeSpec::new()
                .required("key", ValueType::String)
                .optional("date", ValueType::String)
                .optional("computed", ValueType::String),
        );
        schemas
    }
}

impl TargetSchemas {
    pub fn empty() -> Self {
        Self {
            kinds: IndexMap::new(),
        }
    }

    pub fn register(&mut self, kind: impl Into<String>, spec: AttributeSpec) -> &mut Self {
        self.kinds.insert(kind.into(), spec);
        self
    }

    pub fn get(&self, kind: &str) -> Option<&AttributeSpec> {
        self.kinds.get(kind)
    }

    pub fn known(&self) -> Vec<String> {
        self.kinds.keys().cloned().collect()
    }

    /// Reads `kind "<name>" { attribute ... }` blocks (see [AttributeSpec::from_body])
    pub fn from_documents(documents: &HclDocuments) -> Result<Self, Diagnostics> {
        let mut diagnostics = Diagnostics::new();
        let mut schemas = Self::empty();

        for (source, attribute) in documents.attributes() {
            diagnostics.log(
                &Origin::new(source.clone()),
                DecodeError::UnexpectedAttribute {
                    name: attribute.key.to_string(),
                },
            );
        }

        for (source, block) in documents.blocks() {
            let origin = Origin::new(source.clone());
            if block.identifier.as_str() != "kind" {
                diagnostics.log(
                    &origin,
                    DecodeError::UnexpectedBlock {
                        name: block.identifier.to_string(),
                    },
                );
                continue;
            }

            let Some(NestedBlock {
                label,
                origin,
                body,
            }) = NestedBlock::open(block.clone(), 1, &origin, &mut diagnostics)
            else {
                continue;
            };
            let kind = label.unwrap_or_default();

            if schemas.kinds.contains_key(&kind) {
                diagnostics.log(
                    &origin,
                    DecodeError::DuplicateLabel {
                        block: "kind".into(),
                        label: kind,
                    },
                );
                continue;
            }

            let spec = AttributeSpec::from_body(body, &origin, &mut diagnostics);
            tracing::debug!(%kind, attributes=spec.iter().count(), "attribute spec loaded");
            schemas.register(kind, spec);
        }

        diagnostics.into_result(schemas)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub name: String,
    pub origin: Origin,
    pub blocks: Vec<TargetBlock>,
}

/// An entity of a target, its body is checked but not evaluated
#[derive(Debug, Clone, PartialEq)]
pub struct TargetBlock {
    pub kind: String,
    pub name: String,
    pub body: hcl::Body,
    pub origin: Origin,
}

impl Target {
    /// Decodes the body of a target envelope
    ///
    /// Every block must be of a known kind, carry one label that is unique among the blocks of its kind and fit the
    /// kind's [AttributeSpec]. Attributes are not allowed at target level.
    pub fn decode(envelope: &Envelope, schemas: &TargetSchemas) -> Result<Self, Diagnostics> {
        let mut diagnostics = Diagnostics::new();
        let origin = &envelope.origin;
        let mut labels = IndexSet::new();
        let mut blocks = vec![];

        for structure in envelope.remainder.clone() {
            let block = match structure {
                Structure::Block(block) => block,
                Structure::Attribute(attribute) => {
                    diagnostics.log(
                        origin,
                        DecodeError::UnexpectedAttribute {
                            name: attribute.key.to_string(),
                        },
                    );
                    continue;
                }
            };

            let kind = block.identifier.to_string();
            let Some(spec) = schemas.get(&kind) else {
                diagnostics.log(
                    &origin.block(&kind, None),
                    DecodeError::UnknownType {
                        kind,
                        known: schemas.known(),
                    },
                );
                continue;
            };

            let Some(NestedBlock {
                label,
                origin: block_origin,
                body,
            }) = NestedBlock::open(block, 1, origin, &mut diagnostics)
            else {
                continue;
            };
            let name = label.unwrap_or_default();

            if !labels.insert((kind.clone(), name.clone())) {
                diagnostics.log(
                    &block_origin,
                    DecodeError::DuplicateLabel { block: kind, label: name },
                );
                continue;
            }

            let body = body.into_remainder();
            spec.check(&body, &block_origin, &mut diagnostics);

            blocks.push(TargetBlock {
                kind,
                name,
                body,
                origin: block_origin,
            });
        }

        tracing::debug!(%origin, blocks=blocks.len(), "decoded target");
        diagnostics.into_result(Target {
            name: envelope.name.clone(),
            origin: origin.clone(),
            blocks,
        })
    }

    /// Decoded target, expressions are rendered as hcl
    pub fn to_value(&self) -> Value {
        let mut kinds: IndexMap<String, Value> = IndexMap::new();

        for block in &self.blocks {
            let attributes = block
                .body
                .attributes()
                .map(|attribute| (attribute.key.to_string(), expression_text(&attribute.expr)))
                .collect();

            if let Value::Object(names) = kinds
                .entry(block.kind.clone())
                .or_insert_with(|| Value::Object(IndexMap::new()))
            {
                names.insert(block.name.clone(), Value::Object(attributes));
            }
        }

        Value::Object(kinds)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::hcl_documents;
    use pretty_assertions::assert_eq;

    fn decode(documents: HclDocuments) -> Result<Target, Diagnostics> {
        let mut diagnostics = Diagnostics::new();
        let envelopes = SCHEMA.decode(documents.blocks(), &mut diagnostics);
        assert!(diagnostics.is_empty(), "{diagnostics}");
        assert_eq!(envelopes.len(), 1);

        Target::decode(&envelopes[0], &TargetSchemas::default())
    }

    #[test]
    fn hub_blocks() {
        let target = decode(hcl_documents! {r#"
        target "t" {
          hub "customer" {
            key  = var.id
            date = nows
          }
          hub "order" {
            key = "o1"
          }
        }
        "#})
        .unwrap();

        assert_eq!(target.name, "t");
        let names: Vec<_> = target.blocks.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["customer", "order"]);
        assert_eq!(
            target.blocks[0].origin.to_string(),
            "<input>: target \"t\" > hub \"customer\""
        );
    }

    #[test]
    fn closed_schema() {
        let err = decode(hcl_documents! {r#"
        target "t" {
          owner = "me"
          hub "customer" {
            kye = var.id
          }
        }
        "#})
        .unwrap_err();

        assert!(err.contains(|e| *e == DecodeError::UnexpectedAttribute { name: "owner".into() }));
        assert!(err.contains(|e| *e == DecodeError::UnexpectedAttribute { name: "kye".into() }));
        assert!(err.contains(|e| *e == DecodeError::MissingAttribute { name: "key".into() }));
        assert_eq!(err.len(), 3);
    }

    #[test]
    fn duplicate_attribute_in_block() {
        let envelope = Envelope {
            name: "t".into(),
            kind: None,
            remainder: hcl::Body::builder()
                .add_block(
                    hcl::Block::builder("hub")
                        .add_label("customer")
                        .add_attribute(("key", "a"))
                        .add_attribute(("key", "b"))
                        .build(),
                )
                .build(),
            origin: Origin::default().block("target", Some("t")),
        };

        let err = Target::decode(&envelope, &TargetSchemas::default()).unwrap_err();

        assert!(err.contains(|e| *e == DecodeError::DuplicateAttribute { name: "key".into() }));
        assert_eq!(err.len(), 1);
    }

    #[test]
    fn unknown_block_kind() {
        let err = decode(hcl_documents! {r#"
        target "t" {
          link "l" {}
        }
        "#})
        .unwrap_err();

        assert!(err.contains(|e| *e
            == DecodeError::UnknownType {
                kind: "link".into(),
                known: vec!["hub".into()]
            }));
    }

    #[test]
    fn duplicate_block_names() {
        let err = decode(hcl_documents! {r#"
        target "t" {
          hub "customer" { key = "a" }
          hub "customer" { key = "b" }
        }
        "#})
        .unwrap_err();

        assert!(err.contains(|e| *e
            == DecodeError::DuplicateLabel {
                block: "hub".into(),
                label: "customer".into()
            }));
    }

    #[test]
    fn tree_value() {
        let target = decode(hcl_documents! {r#"
        target "t" {
          hub "customer" {
            key = upper(var.id)
          }
        }
        "#})
        .unwrap();

        assert_eq!(
            serde_json::to_value(target.to_value()).unwrap(),
            serde_json::json!({ "hub": { "customer": { "key": "upper(var.id)" } } })
        );
    }

    #[test]
    fn schemas_from_documents() {
        let schemas = TargetSchemas::from_documents(&hcl_documents! {r#"
        kind "link" {
          attribute "from" {
            type     = "string"
            required = true
          }
          attribute "weight" {
            type = "number"
          }
        }
        "#})
        .unwrap();

        assert_eq!(schemas.known(), vec!["link".to_string()]);
        assert_eq!(
            schemas.get("link"),
            Some(
                &AttributeSpec::new()
                    .required("from", ValueType::String)
                    .optional("weight", ValueType::Number)
            )
        );
    }

    #[test]
    fn schemas_from_documents_issues() {
        let err = TargetSchemas::from_documents(&hcl_documents! {r#"
        version = 1
        kind "hub" {}
        kind "hub" {}
        kinds "link" {}
        "#})
        .unwrap_err();

        assert!(err.contains(|e| matches!(e, DecodeError::UnexpectedAttribute { .. })));
        assert!(err.contains(|e| matches!(e, DecodeError::UnexpectedBlock { .. })));
        assert!(err.contains(|e| matches!(e, DecodeError::DuplicateLabel { .. })));
    }
}
