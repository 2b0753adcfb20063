//! source entities and the registry of source types
//!
//! A `source` block names its type with the `type` attribute. The [SourceRegistry] maps that type to a [DecodeFn]
//! that decodes the rest of the block. Supporting a new type means registering a new function:
//!
//! ```
//! # use dvml::source::{SourceRegistry, Source};
//! # use dvml::envelope::Envelope;
//! # use dvml::diagnostics::Diagnostics;
//! fn decode_csv(envelope: &Envelope) -> Result<Source, Diagnostics> {
//!     // ...
//! #   unimplemented!()
//! }
//!
//! let mut registry = SourceRegistry::default();
//! registry.register("csv", decode_csv);
//! ```
use crate::body::{NestedBlock, PartialBody};
use crate::diagnostics::{DecodeError, Diagnostics, Origin};
use crate::envelope::{Envelope, EnvelopeSchema};
use crate::value::Value;
use indexmap::IndexMap;

pub const SCHEMA: EnvelopeSchema = EnvelopeSchema {
    block_kind: "source",
    label_count: 1,
    discriminator: Some("type"),
};

/// Decodes the remainder of a source envelope
pub type DecodeFn = fn(&Envelope) -> Result<Source, Diagnostics>;

/// All decoded source types
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    Json(JsonSource),
}

impl Source {
    pub fn name(&self) -> &str {
        match self {
            Source::Json(json) => &json.name,
        }
    }

    pub fn origin(&self) -> &Origin {
        match self {
            Source::Json(json) => &json.origin,
        }
    }

    /// Variable declarations of this source
    pub fn varchars(&self) -> &[Varchar] {
        match self {
            Source::Json(json) => &json.fields.varchar,
        }
    }

    /// Decoded source, unevaluated expressions are rendered as hcl
    pub fn to_value(&self) -> Value {
        match self {
            Source::Json(json) => Value::Object(IndexMap::from_iter([
                ("type".to_string(), Value::from("json")),
                ("fields".to_string(), json.fields.to_value()),
            ])),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JsonSource {
    pub name: String,
    pub origin: Origin,
    pub fields: Fields,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields {
    pub varchar: Vec<Varchar>,
    pub number: Vec<NumberField>,
}

impl Fields {
    fn to_value(&self) -> Value {
        let varchar = self
            .varchar
            .iter()
            .map(|varchar| {
                let path = varchar.path.as_ref().map_or(Value::Null, expression_text);
                (
                    varchar.name.clone(),
                    Value::Object(IndexMap::from_iter([("path".to_string(), path)])),
                )
            })
            .collect();

        let number = self
            .number
            .iter()
            .map(|number| {
                (
                    number.name.clone(),
                    Value::Object(IndexMap::from_iter([(
                        "path".to_string(),
                        Value::from(number.path.as_str()),
                    )])),
                )
            })
            .collect();

        Value::Object(IndexMap::from_iter([
            ("varchar".to_string(), Value::Object(varchar)),
            ("number".to_string(), Value::Object(number)),
        ]))
    }
}

/// Variable declaration, `path` is evaluated during variable extraction
#[derive(Debug, Clone, PartialEq)]
pub struct Varchar {
    pub name: String,
    pub path: Option<hcl::Expression>,
    pub origin: Origin,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NumberField {
    pub name: String,
    pub path: String,
}

/// hcl text of an unevaluated expression
pub(crate) fn expression_text(expr: &hcl::Expression) -> Value {
    match hcl::format::to_string(expr) {
        Ok(text) => Value::String(text),
        Err(err) => {
            tracing::warn!(%err, "unable to format expression");
            Value::Null
        }
    }
}

/// Source types by discriminator
#[derive(Clone)]
pub struct SourceRegistry {
    decoders: IndexMap<String, DecodeFn>,
}

impl std::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.decoders.keys()).finish()
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("json", decode_json);
        registry
    }
}

impl SourceRegistry {
    /// Registry without any source type
    pub fn empty() -> Self {
        Self {
            decoders: IndexMap::new(),
        }
    }

    pub fn register(&mut self, kind: impl Into<String>, decode: DecodeFn) -> &mut Self {
        self.decoders.insert(kind.into(), decode);
        self
    }

    pub fn known(&self) -> Vec<String> {
        self.decoders.keys().cloned().collect()
    }

    /// Decodes the remainder of `envelope` with the function registered for its type
    pub fn dispatch(&self, envelope: &Envelope) -> Result<Source, Diagnostics> {
        let kind = envelope.kind.as_deref().unwrap_or_default();

        let Some(decode) = self.decoders.get(kind) else {
            let mut diagnostics = Diagnostics::new();
            diagnostics.log(
                &envelope.origin,
                DecodeError::UnknownType {
                    kind: kind.to_string(),
                    known: self.known(),
                },
            );
            return Err(diagnostics);
        };

        decode(envelope)
    }
}

/// Decodes the `json` source type
///
/// ```hcl
/// source "name" {
///   type = "json"
///   attributes {
///     fields {
///       varchar "id" { path = <expression> }
///       number "amount" { path = "<string>" }
///     }
///   }
/// }
/// ```
pub fn decode_json(envelope: &Envelope) -> Result<Source, Diagnostics> {
    let mut diagnostics = Diagnostics::new();
    let origin = &envelope.origin;

    let mut body = PartialBody::new(envelope.remainder.clone(), origin, &mut diagnostics);
    let mut fields = Fields::default();

    let attributes = body
        .take_single_block("attributes", origin, &mut diagnostics)
        .and_then(|block| NestedBlock::open(block, 0, origin, &mut diagnostics));

    if let Some(NestedBlock {
        origin: attributes_origin,
        body: mut attributes_body,
        ..
    }) = attributes
    {
        let fields_block = attributes_body
            .take_single_block("fields", &attributes_origin, &mut diagnostics)
            .and_then(|block| NestedBlock::open(block, 0, &attributes_origin, &mut diagnostics));

        if let Some(fields_block) = fields_block {
            fields = decode_fields(fields_block, &mut diagnostics);
        }

        attributes_body.finish(&attributes_origin, &mut diagnostics);
    }

    body.finish(origin, &mut diagnostics);

    tracing::debug!(%origin, varchar=fields.varchar.len(), number=fields.number.len(), "decoded json source");
    diagnostics.into_result(Source::Json(JsonSource {
        name: envelope.name.clone(),
        origin: origin.clone(),
        fields,
    }))
}

fn decode_fields(fields_block: NestedBlock, diagnostics: &mut Diagnostics) -> Fields {
    let NestedBlock {
        origin, mut body, ..
    } = fields_block;
    let mut fields = Fields::default();

    for block in body.take_blocks("varchar") {
        let Some(mut varchar) = NestedBlock::open(block, 1, &origin, diagnostics) else {
            continue;
        };

        let path = varchar.body.take_attribute("path").map(|attribute| attribute.expr);
        varchar.body.finish(&varchar.origin, diagnostics);

        fields.varchar.push(Varchar {
            name: varchar.label.unwrap_or_default(),
            path,
            origin: varchar.origin,
        });
    }

    for block in body.take_blocks("number") {
        let Some(mut number) = NestedBlock::open(block, 1, &origin, diagnostics) else {
            continue;
        };

        let path = number.body.require_string("path", &number.origin, diagnostics);
        number.body.finish(&number.origin, diagnostics);

        if let Some(path) = path {
            fields.number.push(NumberField {
                name: number.label.unwrap_or_default(),
                path,
            });
        }
    }

    body.finish(&origin, diagnostics);
    fields
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::hcl_documents;
    use pretty_assertions::assert_eq;

    fn dispatch(documents: hcl_documents::HclDocuments) -> Result<Source, Diagnostics> {
        let mut diagnostics = Diagnostics::new();
        let envelopes = SCHEMA.decode(documents.blocks(), &mut diagnostics);
        assert!(diagnostics.is_empty(), "{diagnostics}");
        assert_eq!(envelopes.len(), 1);

        SourceRegistry::default().dispatch(&envelopes[0])
    }

    #[test]
    fn json_source() {
        let source = dispatch(hcl_documents! {r#"
        source "s" {
          type = "json"
          attributes {
            fields {
              varchar "id" { path = "x1" }
              varchar "unset" {}
              number "amount" { path = "$.amount" }
            }
          }
        }
        "#})
        .unwrap();

        assert_eq!(source.name(), "s");
        let names: Vec<_> = source.varchars().iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["id", "unset"]);
        assert_eq!(
            source.varchars()[0].origin.to_string(),
            "<input>: source \"s\" > attributes > fields > varchar \"id\""
        );

        let Source::Json(json) = source;
        assert_eq!(
            json.fields.number,
            vec![NumberField {
                name: "amount".into(),
                path: "$.amount".into()
            }]
        );
    }

    #[test]
    fn unknown_discriminator() {
        let err = dispatch(hcl_documents! {r#"
        source "s" {
          type = "xml"
        }
        "#})
        .unwrap_err();

        assert!(err.contains(|e| *e
            == DecodeError::UnknownType {
                kind: "xml".into(),
                known: vec!["json".into()]
            }));
    }

    #[test]
    fn closed_schema() {
        let err = dispatch(hcl_documents! {r#"
        source "s" {
          type = "json"
          atributes {}
          attributes {
            fields {
              varchar "id" {
                path = "x1"
                typo = 1
              }
              number "amount" {}
            }
          }
        }
        "#})
        .unwrap_err();

        assert!(err.contains(|e| *e
            == DecodeError::UnexpectedBlock {
                name: "atributes".into()
            }));
        assert!(err.contains(|e| *e
            == DecodeError::UnexpectedAttribute {
                name: "typo".into()
            }));
        assert!(err.contains(|e| *e
            == DecodeError::MissingAttribute {
                name: "path".into()
            }));
        assert_eq!(err.len(), 3);
    }

    #[test]
    fn registered_type() {
        fn decode_empty(envelope: &Envelope) -> Result<Source, Diagnostics> {
            Ok(Source::Json(JsonSource {
                name: envelope.name.clone(),
                origin: envelope.origin.clone(),
                fields: Fields::default(),
            }))
        }

        let documents = hcl_documents! {r#"
        source "c" {
          type = "csv"
          whatever = 1
        }
        "#};
        let mut diagnostics = Diagnostics::new();
        let envelopes = SCHEMA.decode(documents.blocks(), &mut diagnostics);

        let mut registry = SourceRegistry::empty();
        registry.register("csv", decode_empty);

        assert_eq!(registry.known(), vec!["csv".to_string()]);
        assert_eq!(registry.dispatch(&envelopes[0]).unwrap().name(), "c");
    }
}
