//! Decode issues and where they were found
//!
//! Decoding does not stop at the first problem. Each issue is logged into [Diagnostics] together with its [Origin]
//! and the whole list is reported once the decode pass is over.
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// Location of a block or attribute: source file and block path
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Origin {
    pub file: Option<PathBuf>,
    pub path: Vec<String>,
}

impl Origin {
    pub fn new(file: Option<PathBuf>) -> Self {
        Self { file, path: vec![] }
    }

    /// Origin of a nested block
    pub fn block(&self, identifier: &str, label: Option<&str>) -> Self {
        let segment = match label {
            Some(label) => format!("{identifier} \"{label}\""),
            None => identifier.to_string(),
        };

        let mut path = self.path.clone();
        path.push(segment);
        Self {
            file: self.file.clone(),
            path,
        }
    }
}

impl Display for Origin {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.file {
            Some(file) => write!(f, "{}: ", file.display())?,
            None => f.write_str("<input>: ")?,
        }

        if self.path.is_empty() {
            f.write_str("<root>")
        } else {
            f.write_str(&self.path.join(" > "))
        }
    }
}

/// Everything that can be wrong with the shape of a document
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum DecodeError {
    #[error("expected {expected} label(s) on `{block}` block, found {found}")]
    LabelCount {
        block: String,
        expected: usize,
        found: usize,
    },
    #[error("missing required attribute `{name}`")]
    MissingAttribute { name: String },
    #[error("attribute `{name}` must be a string literal")]
    NotAStringLiteral { name: String },
    #[error("unexpected attribute `{name}`")]
    UnexpectedAttribute { name: String },
    #[error("unexpected block `{name}`")]
    UnexpectedBlock { name: String },
    #[error("attribute `{name}` is defined more than once")]
    DuplicateAttribute { name: String },
    #[error("block `{name}` may only be defined once")]
    DuplicateBlock { name: String },
    #[error("`{block}` label \"{label}\" is already in use")]
    DuplicateLabel { block: String, label: String },
    #[error("invalid value for `{name}`: {message}")]
    InvalidValue { name: String, message: String },
    #[error("unknown type `{kind}`, expected one of: {}", known.join(", "))]
    UnknownType { kind: String, known: Vec<String> },
}

#[derive(Debug, PartialEq)]
pub struct Diagnostic {
    pub origin: Origin,
    pub error: DecodeError,
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.origin, self.error)
    }
}

#[derive(derive_new::new, Debug, Default)]
pub struct Diagnostics {
    #[new(default)]
    issues: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn log(&mut self, origin: &Origin, error: DecodeError) {
        tracing::trace!(%origin, %error, "issue found");
        self.issues.push(Diagnostic {
            origin: origin.clone(),
            error,
        });
    }

    pub fn append(&mut self, other: Diagnostics) {
        self.issues.extend(other.issues);
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.issues.iter()
    }

    /// Any [DecodeError] matching the predicate
    pub fn contains(&self, predicate: impl Fn(&DecodeError) -> bool) -> bool {
        self.issues.iter().any(|issue| predicate(&issue.error))
    }

    /// `Ok(value)` when no issue was logged
    pub fn into_result<T>(self, value: T) -> Result<T, Diagnostics> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl std::error::Error for Diagnostics {}

impl Display for Diagnostics {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (index, issue) in self.issues.iter().enumerate() {
            if index > 0 {
                f.write_str("\n")?;
            }
            issue.fmt(f)?;
        }
        Ok(())
    }
}
