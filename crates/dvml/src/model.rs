//! decode and evaluation pipeline
//!
//! [Model::decode] turns the merged [HclDocuments] into sources and targets. It only checks the shape of the
//! documents and reports every issue found in one go. [Model::evaluate] then extracts the variables and evaluates
//! all target blocks, stopping at the first failure.
use crate::attribute_spec::AttributeError;
use crate::diagnostics::{DecodeError, Diagnostics, Origin};
use crate::envelope::Envelope;
use crate::eval::functions::FunctionRegistry;
use crate::eval::Evaluator;
use crate::hcl_documents::HclDocuments;
use crate::source::{self, Source, SourceRegistry};
use crate::target::{self, Target, TargetSchemas};
use crate::value::Value;
use crate::variables::{ExtractError, Variables};
use indexmap::{IndexMap, IndexSet};

/// Everything the decoder knows about source types and target kinds
#[derive(Debug, Clone, Default)]
pub struct Registry {
    pub sources: SourceRegistry,
    pub targets: TargetSchemas,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    pub sources: Vec<Source>,
    pub targets: Vec<Target>,
}

impl Model {
    pub fn decode(documents: &HclDocuments, registry: &Registry) -> Result<Self, Diagnostics> {
        let mut diagnostics = Diagnostics::new();

        for (source, attribute) in documents.attributes() {
            diagnostics.log(
                &Origin::new(source.clone()),
                DecodeError::UnexpectedAttribute {
                    name: attribute.key.to_string(),
                },
            );
        }

        for (source, block) in documents.blocks() {
            let identifier = block.identifier.as_str();
            if identifier != source::SCHEMA.block_kind && identifier != target::SCHEMA.block_kind {
                diagnostics.log(
                    &Origin::new(source.clone()),
                    DecodeError::UnexpectedBlock {
                        name: identifier.to_string(),
                    },
                );
            }
        }

        let source_envelopes = source::SCHEMA.decode(documents.blocks(), &mut diagnostics);
        let target_envelopes = target::SCHEMA.decode(documents.blocks(), &mut diagnostics);

        let mut sources = vec![];
        for envelope in unique(source_envelopes, source::SCHEMA.block_kind, &mut diagnostics) {
            match registry.sources.dispatch(&envelope) {
                Ok(source) => sources.push(source),
                Err(issues) => diagnostics.append(issues),
            }
        }

        let mut targets = vec![];
        for envelope in unique(target_envelopes, target::SCHEMA.block_kind, &mut diagnostics) {
            match Target::decode(&envelope, &registry.targets) {
                Ok(target) => targets.push(target),
                Err(issues) => diagnostics.append(issues),
            }
        }

        tracing::info!(
            sources = sources.len(),
            targets = targets.len(),
            issues = diagnostics.len(),
            "model decoded"
        );
        diagnostics.into_result(Model { sources, targets })
    }

    /// Extracts all variables, then evaluates every target block with the [crate::attribute_spec::AttributeSpec] of its kind
    pub fn evaluate(
        &self,
        schemas: &TargetSchemas,
        functions: &FunctionRegistry,
    ) -> Result<Output, Error> {
        let variables = Variables::extract(&self.sources, functions)?;
        tracing::info!(variables = variables.len(), "variables extracted");

        let evaluator = Evaluator::new(&variables, functions);
        let mut output = Output::default();

        for target in &self.targets {
            for block in &target.blocks {
                let Some(spec) = schemas.get(&block.kind) else {
                    return Err(Error::UnknownKind {
                        kind: block.kind.clone(),
                        origin: block.origin.clone(),
                    });
                };

                let values =
                    spec.decode(&block.body, &evaluator)
                        .map_err(|source| Error::Target {
                            origin: block.origin.clone(),
                            source,
                        })?;

                tracing::debug!(origin=%block.origin, "target block evaluated");
                output.insert(&target.name, &block.kind, &block.name, values);
            }
        }

        Ok(output)
    }

    /// Decoded model, unevaluated expressions are rendered as hcl
    pub fn to_value(&self) -> Value {
        let sources = self
            .sources
            .iter()
            .map(|source| (source.name().to_string(), source.to_value()))
            .collect();
        let targets = self
            .targets
            .iter()
            .map(|target| (target.name.clone(), target.to_value()))
            .collect();

        Value::Object(IndexMap::from_iter([
            ("sources".to_string(), Value::Object(sources)),
            ("targets".to_string(), Value::Object(targets)),
        ]))
    }
}

/// Drops envelopes whose name is already taken by an earlier one of the same block kind
fn unique(
    envelopes: Vec<Envelope>,
    block_kind: &str,
    diagnostics: &mut Diagnostics,
) -> Vec<Envelope> {
    let mut names = IndexSet::new();

    envelopes
        .into_iter()
        .filter(|envelope| {
            if names.insert(envelope.name.clone()) {
                return true;
            }

            diagnostics.log(
                &envelope.origin,
                DecodeError::DuplicateLabel {
                    block: block_kind.to_string(),
                    label: envelope.name.clone(),
                },
            );
            false
        })
        .collect()
}

/// Evaluated attributes: target name > block kind > block name > attribute name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Output {
    targets: IndexMap<String, IndexMap<String, IndexMap<String, IndexMap<String, Value>>>>,
}

impl Output {
    fn insert(&mut self, target: &str, kind: &str, name: &str, values: IndexMap<String, Value>) {
        self.targets
            .entry(target.to_string())
            .or_default()
            .entry(kind.to_string())
            .or_default()
            .insert(name.to_string(), values);
    }

    pub fn get(&self, target: &str, kind: &str, name: &str) -> Option<&IndexMap<String, Value>> {
        self.targets.get(target)?.get(kind)?.get(name)
    }

    pub fn to_value(&self) -> Value {
        Value::Object(
            self.targets
                .iter()
                .map(|(target, kinds)| {
                    let kinds = kinds
                        .iter()
                        .map(|(kind, names)| {
                            let names = names
                                .iter()
                                .map(|(name, values)| (name.clone(), Value::Object(values.clone())))
                                .collect();
                            (kind.clone(), Value::Object(names))
                        })
                        .collect();
                    (target.clone(), Value::Object(kinds))
                })
                .collect(),
        )
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid model")]
    Decode(#[from] Diagnostics),
    #[error(transparent)]
    Variable(#[from] ExtractError),
    #[error("{origin}: unable to evaluate block")]
    Target {
        origin: Origin,
        #[source]
        source: AttributeError,
    },
    #[error("{origin}: no attribute spec for `{kind}` blocks")]
    UnknownKind { kind: String, origin: Origin },
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::eval::functions::BUILTINS;
    use crate::eval::EvalError;
    use crate::hcl_documents;
    use pretty_assertions::assert_eq;

    const CUSTOMER: &str = r#"
    source "crm" {
      type = "json"
      attributes {
        fields {
          varchar "id" { path = "x1" }
        }
      }
    }
    target "vault" {
      hub "customer" {
        key = var.id
      }
    }
    "#;

    fn evaluate(documents: HclDocuments) -> Result<Output, Error> {
        let registry = Registry::default();
        let model = Model::decode(&documents, &registry)?;
        model.evaluate(&registry.targets, &BUILTINS)
    }

    #[test]
    fn round_trip() {
        let output = evaluate(hcl_documents! {CUSTOMER}).unwrap();

        assert_eq!(
            serde_json::to_value(output.to_value()).unwrap(),
            serde_json::json!({ "vault": { "hub": { "customer": { "key": "x1" } } } })
        );
    }

    #[test]
    fn merge_order_is_deterministic() {
        let split = || {
            hcl_documents! {
                "a.hcl" => r#"
                source "crm" {
                  type = "json"
                  attributes {
                    fields {
                      varchar "id" { path = "x1" }
                    }
                  }
                }"#,
                "b.hcl" => r#"
                target "vault" {
                  hub "customer" { key = var.id }
                  hub "order" { key = upper(var.id) }
                }"#
            }
        };

        let first = evaluate(split()).unwrap();
        let second = evaluate(split()).unwrap();
        assert_eq!(first, second);

        let names: Vec<_> = first.targets["vault"]["hub"].keys().cloned().collect();
        assert_eq!(names, vec!["customer", "order"]);
        assert_eq!(
            first.get("vault", "hub", "order").unwrap()["key"],
            Value::from("X1")
        );
    }

    #[test]
    fn decode_collects_all_issues() {
        let documents = hcl_documents! {r#"
        version = 1
        model "m" {}
        source "crm" {
          type = "xml"
        }
        source "crm" {
          type = "json"
        }
        target "vault" {
          hub "customer" {}
        }
        "#};

        let err = Model::decode(&documents, &Registry::default()).unwrap_err();

        assert!(err.contains(|e| matches!(e, DecodeError::UnexpectedAttribute { name } if name == "version")));
        assert!(err.contains(|e| matches!(e, DecodeError::UnexpectedBlock { name } if name == "model")));
        assert!(err.contains(|e| matches!(e, DecodeError::UnknownType { kind, .. } if kind == "xml")));
        assert!(err.contains(|e| *e
            == DecodeError::DuplicateLabel {
                block: "source".into(),
                label: "crm".into()
            }));
        assert!(err.contains(|e| matches!(e, DecodeError::MissingAttribute { name } if name == "key")));
    }

    #[test]
    fn evaluation_stops_at_first_failure() {
        let err = evaluate(hcl_documents! {r#"
        target "vault" {
          hub "customer" { key = var.missing }
          hub "order" { key = 42 }
        }
        "#})
        .unwrap_err();

        let Error::Target { origin, source } = err else {
            panic!("expected a target error");
        };
        assert_eq!(origin.to_string(), "<input>: target \"vault\" > hub \"customer\"");
        assert_eq!(
            source,
            AttributeError::Evaluation {
                name: "key".into(),
                source: EvalError::UndefinedVariable("var.missing".into())
            }
        );
    }

    #[test]
    fn tree() {
        let registry = Registry::default();
        let model = Model::decode(&hcl_documents! {CUSTOMER}, &registry).unwrap();

        assert_eq!(
            serde_json::to_value(model.to_value()).unwrap(),
            serde_json::json!({
                "sources": {
                    "crm": {
                        "type": "json",
                        "fields": {
                            "varchar": { "id": { "path": "\"x1\"" } },
                            "number": {}
                        }
                    }
                },
                "targets": {
                    "vault": { "hub": { "customer": { "key": "var.id" } } }
                }
            })
        );
    }
}
