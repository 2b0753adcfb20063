//! expression evaluation
//!
//! Expressions are evaluated by [hcl::eval] in a [Context] that is built from scratch for every evaluation:
//! - `var`: object holding every extracted variable
//! - `nows`: the current timestamp, taken when the context is built
//! - all functions of the [FunctionRegistry]
//!
//! Before evaluating, the expression is walked once and every function call and variable reference is checked
//! against what the context will provide. This gives precise errors (unknown function, wrong number of arguments,
//! unknown variable) instead of the generic ones of the evaluator.
pub mod functions;

use crate::value::Value;
use crate::variables::Variables;
use crate::visit::{Reference, VisitReferences};
use functions::FunctionRegistry;
use hcl::eval::{Context, ErrorKind, Evaluate};
use hcl::{Expression, Identifier};

/// Name of the object holding all variables
pub const VARIABLES: &str = "var";
/// Name of the implicit current timestamp value
pub const NOW: &str = "nows";

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum EvalError {
    #[error("`{0}` can not be referenced here, variables can not refer to other variables")]
    UnresolvedReference(String),
    #[error("undefined variable `{0}`")]
    UndefinedVariable(String),
    #[error("undefined function `{0}`")]
    UndefinedFunction(String),
    #[error("function `{name}` expects {expected} argument(s), got {actual}")]
    Arity {
        name: String,
        expected: usize,
        actual: usize,
    },
    #[error("invalid arguments for function `{name}`: {message}")]
    Type { name: String, message: String },
    #[error("{0}")]
    Failed(String),
}

impl From<hcl::eval::Error> for EvalError {
    fn from(error: hcl::eval::Error) -> Self {
        match error.kind() {
            ErrorKind::UndefinedVar(name) => EvalError::UndefinedVariable(name.to_string()),
            ErrorKind::UndefinedFunc(name) => EvalError::UndefinedFunction(name.to_string()),
            ErrorKind::FuncCall(name, message) => EvalError::Type {
                name: name.to_string(),
                message: message.clone(),
            },
            _ => EvalError::Failed(error.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Evaluator<'a> {
    /// `None` while variables are being extracted
    variables: Option<&'a Variables>,
    functions: &'a FunctionRegistry,
}

impl<'a> Evaluator<'a> {
    pub fn new(variables: &'a Variables, functions: &'a FunctionRegistry) -> Self {
        Self {
            variables: Some(variables),
            functions,
        }
    }

    /// Evaluator without any variables
    ///
    /// Every variable reference fails with [EvalError::UnresolvedReference].
    pub fn isolated(functions: &'a FunctionRegistry) -> Self {
        Self {
            variables: None,
            functions,
        }
    }

    #[tracing::instrument(level = "trace", skip(self), ret)]
    pub fn evaluate(&self, expr: &Expression) -> Result<Value, EvalError> {
        self.check(expr)?;

        let context = self.context();
        let value = expr.evaluate(&context)?;
        Ok(value.into())
    }

    fn check(&self, expr: &Expression) -> Result<(), EvalError> {
        let mut references = vec![];
        expr.visit_references(&mut |reference: Reference| references.push(reference));

        references
            .into_iter()
            .try_for_each(|reference| self.check_reference(reference))
    }

    fn check_reference(&self, reference: Reference) -> Result<(), EvalError> {
        match reference {
            Reference::Function {
                name,
                arguments,
                expand_final,
            } => {
                let Some(builtin) = self.functions.get(&name) else {
                    return Err(EvalError::UndefinedFunction(name));
                };

                // the number of expanded arguments is only known after evaluation
                if !expand_final && arguments != builtin.arity() {
                    return Err(EvalError::Arity {
                        name,
                        expected: builtin.arity(),
                        actual: arguments,
                    });
                }

                Ok(())
            }
            Reference::Variable { root, .. } if root == NOW => Ok(()),
            Reference::Variable { root, attribute } => {
                let full_name = match &attribute {
                    Some(attribute) => format!("{root}.{attribute}"),
                    None => root.clone(),
                };

                let Some(variables) = self.variables else {
                    return Err(EvalError::UnresolvedReference(full_name));
                };

                match (root.as_str(), attribute) {
                    (VARIABLES, Some(name)) if variables.get(&name).is_none() => {
                        Err(EvalError::UndefinedVariable(full_name))
                    }
                    (VARIABLES, _) => Ok(()),
                    _ => Err(EvalError::UndefinedVariable(full_name)),
                }
            }
        }
    }

    fn context(&self) -> Context<'static> {
        let mut context = Context::new();

        let variables: hcl::value::Map<String, hcl::Value> = self
            .variables
            .into_iter()
            .flat_map(|variables| variables.iter())
            .map(|(name, value)| (name.to_string(), value.clone().into()))
            .collect();
        context.declare_var(
            Identifier::unchecked(VARIABLES),
            hcl::Value::Object(variables),
        );
        context.declare_var(Identifier::unchecked(NOW), functions::timestamp());

        for (name, builtin) in self.functions.iter() {
            context.declare_func(Identifier::unchecked(name), builtin.func_def());
        }

        context
    }
}

#[cfg(test)]
mod test {
    use super::functions::{Builtin, BUILTINS};
    use super::*;
    use pretty_assertions::assert_eq;

    fn expr(input: &str) -> Expression {
        let expr: hcl_edit::expr::Expression = input.parse().unwrap();
        expr.into()
    }

    fn variables() -> Variables {
        let mut variables = Variables::default();
        variables.insert("name", Value::from("abc")).unwrap();
        variables
    }

    #[test]
    fn literals() {
        let variables = variables();
        let evaluator = Evaluator::new(&variables, &BUILTINS);

        assert_eq!(evaluator.evaluate(&expr("\"x1\"")), Ok(Value::from("x1")));
        assert_eq!(evaluator.evaluate(&expr("42")), Ok(Value::Integer(42)));
        assert_eq!(evaluator.evaluate(&expr("true")), Ok(Value::Boolean(true)));
        assert_eq!(evaluator.evaluate(&expr("null")), Ok(Value::Null));
    }

    #[test]
    fn upper_of_variable() {
        let variables = variables();
        let evaluator = Evaluator::new(&variables, &BUILTINS);

        assert_eq!(
            evaluator.evaluate(&expr("upper(var.name)")),
            Ok(Value::from("ABC"))
        );
        assert_eq!(
            evaluator.evaluate(&expr("\"${var.name}-suffix\"")),
            Ok(Value::from("abc-suffix"))
        );
    }

    #[test]
    fn now_is_a_timestamp() {
        let evaluator = Evaluator::isolated(&BUILTINS);

        for input in ["now()", "nows"] {
            let value = evaluator.evaluate(&expr(input)).unwrap();
            let timestamp = value.as_str().expect("timestamp is a string");
            assert!(
                chrono::DateTime::parse_from_rfc3339(timestamp).is_ok(),
                "{timestamp} is not a valid timestamp"
            );
        }
    }

    #[test]
    fn undefined_variable() {
        let variables = variables();
        let evaluator = Evaluator::new(&variables, &BUILTINS);

        assert_eq!(
            evaluator.evaluate(&expr("var.missing")),
            Err(EvalError::UndefinedVariable("var.missing".into()))
        );
        assert_eq!(
            evaluator.evaluate(&expr("other")),
            Err(EvalError::UndefinedVariable("other".into()))
        );
    }

    #[test]
    fn undefined_variable_in_for_expression() {
        let variables = variables();
        let evaluator = Evaluator::new(&variables, &BUILTINS);

        assert_eq!(
            evaluator.evaluate(&expr("[for x in [\"a\"] : var.missing]")),
            Err(EvalError::UndefinedVariable("var.missing".into()))
        );
        assert_eq!(
            evaluator.evaluate(&expr("[for x in [\"a\"] : upper(x)]")),
            Ok(Value::from(vec![Value::from("A")]))
        );
    }

    #[test]
    fn runtime_failure() {
        let evaluator = Evaluator::isolated(&BUILTINS);

        assert!(matches!(
            evaluator.evaluate(&expr("1 + \"a\"")),
            Err(EvalError::Failed(_))
        ));
    }

    #[test]
    fn isolated_rejects_variables() {
        let evaluator = Evaluator::isolated(&BUILTINS);

        assert_eq!(
            evaluator.evaluate(&expr("upper(var.name)")),
            Err(EvalError::UnresolvedReference("var.name".into()))
        );
    }

    #[test]
    fn undefined_function() {
        let evaluator = Evaluator::isolated(&BUILTINS);

        assert_eq!(
            evaluator.evaluate(&expr("lower(\"ABC\")")),
            Err(EvalError::UndefinedFunction("lower".into()))
        );
    }

    #[test]
    fn arity() {
        let evaluator = Evaluator::isolated(&BUILTINS);

        assert_eq!(
            evaluator.evaluate(&expr("upper(\"a\", \"b\")")),
            Err(EvalError::Arity {
                name: "upper".into(),
                expected: 1,
                actual: 2
            })
        );
        assert_eq!(
            evaluator.evaluate(&expr("now(1)")),
            Err(EvalError::Arity {
                name: "now".into(),
                expected: 0,
                actual: 1
            })
        );
    }

    #[test]
    fn argument_type() {
        let evaluator = Evaluator::isolated(&BUILTINS);

        assert!(matches!(
            evaluator.evaluate(&expr("upper(42)")),
            Err(EvalError::Type { name, .. }) if name == "upper"
        ));
    }

    #[test]
    fn custom_function() {
        fn answer(_: hcl::eval::FuncArgs) -> Result<hcl::Value, String> {
            Ok(hcl::Value::from(42i64))
        }

        let mut functions = FunctionRegistry::default();
        functions.register("answer", Builtin::new(answer));
        let evaluator = Evaluator::isolated(&functions);

        assert_eq!(
            evaluator.evaluate(&expr("answer()")),
            Ok(Value::Integer(42))
        );
        assert_eq!(
            evaluator.evaluate(&expr("upper(\"a\")")),
            Err(EvalError::UndefinedFunction("upper".into()))
        );
    }
}
