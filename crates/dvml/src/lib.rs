//! # dvml - data vault model definitions in hcl
//!
//! ## Introduction for developers
//!
//! Read this to understand how `dvml` works internally.
//!
//! ### HCL Terms
//!
//! In hcl terms...
//! - a file gets parsed as a `body`
//! - ...which is just a list of `structures`
//! - ...where there are two kinds:
//!   - `attribute`: a "key = value" pair
//!   - or `block`:
//!     - 1 `identifier`
//!     - followed by 0 or more `labels`
//!     - and a `body` enclosed in `{` and `}`
//!
//! A model consists of `source` and `target` blocks:
//!
//! ```hcl
//! source "crm" {
//!   type = "json"
//!   attributes {
//!     fields {
//!       varchar "id" { path = "x1" }
//!     }
//!   }
//! }
//!
//! target "vault" {
//!   hub "customer" {
//!     key  = upper(var.id)
//!     date = nows
//!   }
//! }
//! ```
//!
//! ### Loading files
//!
//! Every `.hcl` document is parsed as a `body` ([hcl_edit::structure::Body]) and converted to an [hcl::Body].
//! [hcl_documents::HclDocuments] merges the root attributes and blocks of all documents, in load order, and keeps the
//! source path of each so issues can point to the file they come from.
//!
//! ### Decoding
//!
//! see [model::Model::decode]
//!
//! Decoding happens in two phases. First the [envelope::EnvelopeSchema] of a block kind reads what is common to all
//! blocks of that kind: the name label and, for sources, the `type` discriminator. The rest of the body is kept
//! undecoded as the remainder. Then the remainder is decoded:
//! - sources: [source::SourceRegistry] selects a decode function by `type`
//! - targets: each nested block is checked against the [attribute_spec::AttributeSpec] of its kind
//!
//! Every schema is closed: attributes or blocks that nobody asked for are reported. All issues are collected in
//! [diagnostics::Diagnostics] and reported together.
//!
//! ### Variables
//!
//! see [variables::Variables::extract]
//!
//! Each `varchar` field of a source declares a variable, its `path` expression is the value. Variables are evaluated
//! without access to other variables, so there is no evaluation order to figure out.
//!
//! ### Evaluation
//!
//! see [model::Model::evaluate]
//!
//! We use [hcl::eval] to evaluate the hcl expressions. [eval::Evaluator] provides the [hcl::eval::Context]:
//! - `var.<name>`: the extracted variables
//! - `nows`: the current timestamp
//! - functions of [eval::functions::FunctionRegistry] (`upper`, `now`)
//!
//! Target block attributes are evaluated by [attribute_spec::AttributeSpec::decode], which also checks the type of
//! each value.
//!
//! ### Output
//!
//! Evaluated values are [value::Value]s which in turn get serialized via [serde].
//!
pub mod attribute_spec;
pub mod body;
pub mod diagnostics;
pub mod envelope;
pub mod eval;
pub mod hcl_documents;
pub mod model;
pub mod source;
pub mod target;
pub mod value;
pub mod variables;
mod visit;
