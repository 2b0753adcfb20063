//! collection of hcl documents ([Body] and path to source file)
//!
//! [HclDocuments] is the merged view over all loaded documents. It tracks
//! - the source path
//! - the root blocks
//! - the root attributes
//!
//! Root structures are kept in load order, so the blocks of a later document always follow the blocks of an earlier
//! one. Loading the same files in the same order yields the same merged document.
use hcl::{Attribute, Block, Body, Structure};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// File extension of loadable documents
pub const EXTENSION: &str = "hcl";

#[derive(Default, Debug)]
pub struct HclDocuments {
    sources: Vec<Source>,
    root_attributes: Vec<(usize, Attribute)>,
    root_blocks: Vec<(usize, Block)>,
}

impl HclDocuments {
    /// Inserts an hcl document after all previously inserted ones
    pub fn insert(&mut self, document: Body, path: impl Into<Option<PathBuf>>) {
        let source_index = self.sources.len();
        self.sources.push(path.into());

        for structure in document.into_iter() {
            match structure {
                Structure::Block(block) => self.root_blocks.push((source_index, block)),
                Structure::Attribute(attribute) => {
                    self.root_attributes.push((source_index, attribute))
                }
            }
        }
    }

    pub fn attributes(&self) -> impl Iterator<Item = SourceAttribute> {
        self.root_attributes
            .iter()
            .map(|(source_index, attribute)| (&self.sources[*source_index], attribute))
    }

    pub fn blocks(&self) -> impl Iterator<Item = SourceBlock> {
        self.root_blocks
            .iter()
            .map(|(source_index, block)| (&self.sources[*source_index], block))
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }
}

impl HclDocuments {
    pub fn load_file(&mut self, file_path: &Path) -> Result<(), LoadError> {
        if file_path.is_dir() {
            return Err(LoadError::NotAFile(file_path.to_owned()));
        }

        let file_path = file_path
            .canonicalize()
            .map_err(|source| LoadError::Io {
                path: file_path.to_owned(),
                source,
            })?;
        tracing::info!(path=%file_path.display(), "loading file");

        let file_contents =
            std::fs::read_to_string(&file_path).map_err(|source| LoadError::Io {
                path: file_path.clone(),
                source,
            })?;
        let body = hcl_edit::parser::parse_body(&file_contents).map_err(|source| {
            LoadError::Parse {
                path: file_path.clone(),
                source,
            }
        })?;

        self.insert(body.into(), Some(file_path));
        Ok(())
    }

    /// Loads every `*.hcl` file below `dir_path`, sorted by path
    ///
    /// Symbolic links are followed. A directory without matching files is not an error, callers decide if an empty
    /// document is acceptable.
    pub fn load_directory(&mut self, dir_path: &Path) -> Result<(), LoadError> {
        let mut file_paths = vec![];

        for dir_entry in WalkDir::new(dir_path).follow_links(true).sort_by_file_name() {
            let dir_entry = dir_entry.map_err(|err| LoadError::Io {
                path: err.path().unwrap_or(dir_path).to_owned(),
                source: err.into(),
            })?;

            let path = dir_entry.path();
            let is_hcl_file = path.extension().is_some_and(|ext| ext == EXTENSION);
            if dir_entry.file_type().is_file() && is_hcl_file {
                tracing::debug!(path=%path.display(), "found hcl file");
                file_paths.push(path.to_owned());
            }
        }
        file_paths.sort();

        if file_paths.is_empty() {
            tracing::warn!(path=%dir_path.display(), "no .{EXTENSION} files found");
        }

        for file_path in &file_paths {
            self.load_file(file_path)?;
        }

        Ok(())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error("{0} is a directory. Did you mean to use --dir?")]
    NotAFile(PathBuf),
    #[error("unable to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unable to parse hcl file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: hcl_edit::parser::Error,
    },
}

impl From<Body> for HclDocuments {
    fn from(value: Body) -> Self {
        let mut tree = HclDocuments::default();
        tree.insert(value, None);
        tree
    }
}

/// Utility macro to create [HclDocuments]
///
/// Create from a single document
/// ```
/// # use dvml::hcl_documents;
/// hcl_documents!("attribute = 42");
/// ```
///
/// Create from multiple documents (path required)
/// ```
/// # use dvml::hcl_documents;
/// hcl_documents! {
///   "one.hcl" => "attribute_one = 1",
///   "two.hcl" => "attribute_two = 2"
/// };
/// ```
///
/// # Panic
/// Panics on invalid input
///
/// ```should_panic
/// # use dvml::hcl_documents;
/// hcl_documents!("not = valid = hcl");
/// ```
#[macro_export]
macro_rules! hcl_documents {
    // single document without source
    { $expr:expr } => {
        $crate::hcl_documents::HclDocuments::from(
            ::hcl::Body::from(::hcl_edit::parser::parse_body($expr).expect("body must parse"))
        )
    };
    // multi document with sources
    { $($source:expr => $expr:expr),+ } => {{
        let mut docs = $crate::hcl_documents::HclDocuments::default();
        $(
            docs.insert(
                ::hcl::Body::from(::hcl_edit::parser::parse_body($expr).expect("body must parse")),
                Some(::std::path::PathBuf::from($source)),
            );
        )+

        docs
    }};
}

pub type Source = Option<PathBuf>;
pub type SourceAttribute<'a> = (&'a Source, &'a Attribute);
pub type SourceBlock<'a> = (&'a Source, &'a Block);
