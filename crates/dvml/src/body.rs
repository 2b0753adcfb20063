//! closed schema decoding helpers
//!
//! A [PartialBody] is an [hcl::Body] that is being decoded: every attribute or block a decoder recognizes is taken
//! out of it, whatever is left at the end is the remainder. Decoders that do not pass the remainder on call
//! [PartialBody::finish], which reports each leftover structure as an issue.
use crate::diagnostics::{DecodeError, Diagnostics, Origin};
use hcl::{Attribute, Block, Body, Expression, Structure};
use indexmap::IndexMap;

pub struct PartialBody {
    attributes: IndexMap<String, Attribute>,
    blocks: Vec<Block>,
}

impl PartialBody {
    /// Splits `body` into attributes and blocks
    ///
    /// Attributes with a key that was already seen are reported and dropped.
    pub fn new(body: Body, origin: &Origin, diagnostics: &mut Diagnostics) -> Self {
        let mut attributes = IndexMap::new();
        let mut blocks = vec![];

        for structure in body {
            match structure {
                Structure::Attribute(attribute) => {
                    let key = attribute.key.to_string();
                    if attributes.contains_key(&key) {
                        diagnostics.log(origin, DecodeError::DuplicateAttribute { name: key });
                        continue;
                    }
                    attributes.insert(key, attribute);
                }
                Structure::Block(block) => blocks.push(block),
            }
        }

        Self { attributes, blocks }
    }

    pub fn take_attribute(&mut self, key: &str) -> Option<Attribute> {
        self.attributes.shift_remove(key)
    }

    /// Takes an attribute that must be written as a plain string literal
    pub fn take_string(
        &mut self,
        key: &str,
        origin: &Origin,
        diagnostics: &mut Diagnostics,
    ) -> Option<String> {
        let attribute = self.take_attribute(key)?;
        string_literal(attribute, origin, diagnostics)
    }

    /// Like [PartialBody::take_string], but a missing attribute is an issue too
    pub fn require_string(
        &mut self,
        key: &str,
        origin: &Origin,
        diagnostics: &mut Diagnostics,
    ) -> Option<String> {
        let Some(attribute) = self.take_attribute(key) else {
            diagnostics.log(
                origin,
                DecodeError::MissingAttribute {
                    name: key.to_string(),
                },
            );
            return None;
        };
        string_literal(attribute, origin, diagnostics)
    }

    pub fn take_blocks(&mut self, identifier: &str) -> Vec<Block> {
        let (taken, kept): (Vec<Block>, Vec<Block>) = std::mem::take(&mut self.blocks)
            .into_iter()
            .partition(|block| block.identifier.as_str() == identifier);
        self.blocks = kept;
        taken
    }

    /// Takes a block that may appear at most once
    pub fn take_single_block(
        &mut self,
        identifier: &str,
        origin: &Origin,
        diagnostics: &mut Diagnostics,
    ) -> Option<Block> {
        let mut blocks = self.take_blocks(identifier).into_iter();
        let first = blocks.next();
        if blocks.next().is_some() {
            diagnostics.log(
                origin,
                DecodeError::DuplicateBlock {
                    name: identifier.to_string(),
                },
            );
        }
        first
    }

    /// Everything not taken yet
    pub fn into_remainder(self) -> Body {
        self.attributes
            .into_values()
            .map(Structure::Attribute)
            .chain(self.blocks.into_iter().map(Structure::Block))
            .collect()
    }

    /// Reports every structure that was not taken
    pub fn finish(self, origin: &Origin, diagnostics: &mut Diagnostics) {
        for key in self.attributes.into_keys() {
            diagnostics.log(origin, DecodeError::UnexpectedAttribute { name: key });
        }

        for block in self.blocks {
            diagnostics.log(
                origin,
                DecodeError::UnexpectedBlock {
                    name: block.identifier.to_string(),
                },
            );
        }
    }
}

fn string_literal(
    attribute: Attribute,
    origin: &Origin,
    diagnostics: &mut Diagnostics,
) -> Option<String> {
    match attribute.expr {
        Expression::String(value) => Some(value),
        _ => {
            diagnostics.log(
                origin,
                DecodeError::NotAStringLiteral {
                    name: attribute.key.to_string(),
                },
            );
            None
        }
    }
}

/// A nested block with checked labels, ready to be decoded
pub struct NestedBlock {
    /// First label, if the block has one
    pub label: Option<String>,
    pub origin: Origin,
    pub body: PartialBody,
}

impl NestedBlock {
    /// Checks that `block` has exactly `label_count` labels and splits its body
    pub fn open(
        block: Block,
        label_count: usize,
        parent: &Origin,
        diagnostics: &mut Diagnostics,
    ) -> Option<Self> {
        let identifier = block.identifier.as_str();
        if block.labels.len() != label_count {
            diagnostics.log(
                &parent.block(identifier, None),
                DecodeError::LabelCount {
                    block: identifier.to_string(),
                    expected: label_count,
                    found: block.labels.len(),
                },
            );
            return None;
        }

        let label = block.labels.first().map(|label| label.as_str().to_string());
        let origin = parent.block(identifier, label.as_deref());
        let body = PartialBody::new(block.body, &origin, diagnostics);

        Some(Self {
            label,
            origin,
            body,
        })
    }
}
