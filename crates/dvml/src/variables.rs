//! variable extraction
//!
//! Every `varchar` entry of every source declares a variable. Its `path` expression is evaluated with an
//! [Evaluator::isolated] evaluator, so a variable can never refer to another variable. The resulting [Variables]
//! are shared by all target evaluations and never change afterwards.
use crate::diagnostics::Origin;
use crate::eval::functions::FunctionRegistry;
use crate::eval::{EvalError, Evaluator};
use crate::source::Source;
use crate::value::Value;
use indexmap::IndexMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Variables {
    values: IndexMap<String, Value>,
}

impl Variables {
    /// Extracts the variables declared by `sources`
    ///
    /// Entries without a `path` are declared but unset: they are skipped, yet their name is still taken.
    pub fn extract(sources: &[Source], functions: &FunctionRegistry) -> Result<Self, ExtractError> {
        let evaluator = Evaluator::isolated(functions);
        let mut declared: IndexMap<&str, &Origin> = IndexMap::new();
        let mut variables = Variables::default();

        for varchar in sources.iter().flat_map(|source| source.varchars()) {
            if let Some(first) = declared.insert(&varchar.name, &varchar.origin) {
                return Err(ExtractError::DuplicateVariable {
                    name: varchar.name.clone(),
                    first: first.clone(),
                    origin: varchar.origin.clone(),
                });
            }

            let Some(path) = &varchar.path else {
                tracing::debug!(origin=%varchar.origin, "variable has no path, skipping");
                continue;
            };

            let value = evaluator
                .evaluate(path)
                .map_err(|source| ExtractError::Evaluation {
                    name: varchar.name.clone(),
                    origin: varchar.origin.clone(),
                    source,
                })?;

            tracing::debug!(name=%varchar.name, ?value, "variable extracted");
            variables.values.insert(varchar.name.clone(), value);
        }

        Ok(variables)
    }

    /// Adds a variable, names must be unique
    pub fn insert(&mut self, name: impl Into<String>, value: Value) -> Result<(), Value> {
        let name = name.into();
        if self.values.contains_key(&name) {
            return Err(value);
        }

        self.values.insert(name, value);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ExtractError {
    #[error("{origin}: variable `{name}` is already declared at {first}")]
    DuplicateVariable {
        name: String,
        first: Origin,
        origin: Origin,
    },
    #[error("{origin}: unable to evaluate variable `{name}`")]
    Evaluation {
        name: String,
        origin: Origin,
        #[source]
        source: EvalError,
    },
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::eval::functions::BUILTINS;
    use crate::hcl_documents;
    use crate::model::{Model, Registry};
    use pretty_assertions::assert_eq;

    fn extract(documents: hcl_documents::HclDocuments) -> Result<Variables, ExtractError> {
        let model = Model::decode(&documents, &Registry::default()).expect("valid model");
        Variables::extract(&model.sources, &BUILTINS)
    }

    #[test]
    fn literal_and_function_paths() {
        let variables = extract(hcl_documents! {r#"
        source "s" {
          type = "json"
          attributes {
            fields {
              varchar "id" { path = "x1" }
              varchar "shout" { path = upper("abc") }
              varchar "unset" {}
            }
          }
        }
        "#})
        .unwrap();

        assert_eq!(variables.get("id"), Some(&Value::from("x1")));
        assert_eq!(variables.get("shout"), Some(&Value::from("ABC")));
        assert_eq!(variables.get("unset"), None);
        assert_eq!(variables.len(), 2);
    }

    #[test]
    fn all_sources_contribute() {
        let variables = extract(hcl_documents! {
            "one.hcl" => r#"
            source "a" {
              type = "json"
              attributes {
                fields {
                  varchar "first" { path = "1" }
                }
              }
            }"#,
            "two.hcl" => r#"
            source "b" {
              type = "json"
              attributes {
                fields {
                  varchar "second" { path = "2" }
                }
              }
            }"#
        })
        .unwrap();

        let names: Vec<_> = variables.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[test]
    fn variables_can_not_reference_variables() {
        let err = extract(hcl_documents! {r#"
        source "s" {
          type = "json"
          attributes {
            fields {
              varchar "id" { path = "x1" }
              varchar "copy" { path = var.id }
            }
          }
        }
        "#})
        .unwrap_err();

        let ExtractError::Evaluation { name, source, .. } = err else {
            panic!("expected an evaluation error");
        };
        assert_eq!(name, "copy");
        assert_eq!(source, EvalError::UnresolvedReference("var.id".into()));
    }

    #[test]
    fn isolation_covers_for_expressions() {
        let err = extract(hcl_documents! {r#"
        source "s" {
          type = "json"
          attributes {
            fields {
              varchar "id" { path = "x1" }
              varchar "copy" { path = [for x in ["a"] : var.id] }
            }
          }
        }
        "#})
        .unwrap_err();

        let ExtractError::Evaluation { name, source, .. } = err else {
            panic!("expected an evaluation error");
        };
        assert_eq!(name, "copy");
        assert_eq!(source, EvalError::UnresolvedReference("var.id".into()));
    }

    #[test]
    fn duplicate_names_across_sources() {
        let err = extract(hcl_documents! {r#"
        source "a" {
          type = "json"
          attributes {
            fields {
              varchar "id" { path = "x1" }
            }
          }
        }
        source "b" {
          type = "json"
          attributes {
            fields {
              varchar "id" {}
            }
          }
        }
        "#})
        .unwrap_err();

        assert!(matches!(err, ExtractError::DuplicateVariable { name, .. } if name == "id"));
    }
}
