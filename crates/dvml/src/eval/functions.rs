//! built-in functions
use hcl::eval::{Func, FuncArgs, FuncDef, ParamType};
use hcl::Value;
use indexmap::IndexMap;
use lazy_static::lazy_static;

/// A function that can be called from expressions
#[derive(Debug, Clone)]
pub struct Builtin {
    params: Vec<ParamType>,
    func: Func,
}

impl Builtin {
    pub fn new(func: Func) -> Self {
        Self {
            params: vec![],
            func,
        }
    }

    /// Adds a positional parameter
    pub fn param(mut self, param: ParamType) -> Self {
        self.params.push(param);
        self
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub(crate) fn func_def(&self) -> FuncDef {
        self.params
            .iter()
            .cloned()
            .fold(FuncDef::builder(), |builder, param| builder.param(param))
            .build(self.func)
    }
}

/// Functions available to expressions, by name
#[derive(Debug, Clone, Default)]
pub struct FunctionRegistry {
    functions: IndexMap<String, Builtin>,
}

impl FunctionRegistry {
    pub fn register(&mut self, name: impl Into<String>, builtin: Builtin) -> &mut Self {
        self.functions.insert(name.into(), builtin);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Builtin> {
        self.functions.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Builtin)> {
        self.functions
            .iter()
            .map(|(name, builtin)| (name.as_str(), builtin))
    }
}

lazy_static! {
    /// Default functions, shared by every evaluation in the process
    pub static ref BUILTINS: FunctionRegistry = {
        let mut registry = FunctionRegistry::default();
        registry
            .register("upper", Builtin::new(upper).param(ParamType::String))
            .register("now", Builtin::new(now));
        registry
    };
}

/// Current instant as RFC 3339 timestamp (second precision, local offset)
pub fn timestamp() -> String {
    chrono::Local::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

fn upper(args: FuncArgs) -> Result<Value, String> {
    let string = args[0]
        .as_str()
        .ok_or_else(|| format!("expected a string, got `{:?}`", args[0]))?;
    Ok(Value::from(string.to_uppercase()))
}

fn now(_args: FuncArgs) -> Result<Value, String> {
    Ok(Value::from(timestamp()))
}
