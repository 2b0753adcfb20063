//! first decode stage: labels and discriminator
//!
//! An [Envelope] is everything that can be known about a top level block before its type is known: the name label,
//! the discriminator and the still undecoded rest of its body.
use crate::body::NestedBlock;
use crate::diagnostics::{Diagnostics, Origin};
use crate::hcl_documents::SourceBlock;

#[derive(Debug, Clone, Copy)]
pub struct EnvelopeSchema {
    pub block_kind: &'static str,
    pub label_count: usize,
    /// Attribute holding the type discriminator, if the block kind has one
    pub discriminator: Option<&'static str>,
}

#[derive(Debug, Clone)]
pub struct Envelope {
    pub name: String,
    /// Value of the discriminator attribute
    pub kind: Option<String>,
    /// Undecoded rest of the block body
    pub remainder: hcl::Body,
    pub origin: Origin,
}

impl EnvelopeSchema {
    /// Decodes all blocks of [EnvelopeSchema::block_kind], in order
    ///
    /// Blocks of other kinds are skipped. Blocks with issues are logged and left out of the result.
    pub fn decode<'a>(
        &self,
        blocks: impl IntoIterator<Item = SourceBlock<'a>>,
        diagnostics: &mut Diagnostics,
    ) -> Vec<Envelope> {
        blocks
            .into_iter()
            .filter(|(_, block)| block.identifier.as_str() == self.block_kind)
            .filter_map(|(source, block)| {
                let NestedBlock {
                    label,
                    origin,
                    mut body,
                } = NestedBlock::open(
                    block.clone(),
                    self.label_count,
                    &Origin::new(source.clone()),
                    diagnostics,
                )?;

                let kind = match self.discriminator {
                    None => None,
                    Some(attribute) => Some(body.require_string(attribute, &origin, diagnostics)?),
                };

                tracing::debug!(%origin, ?kind, "decoded envelope");
                Some(Envelope {
                    name: label.unwrap_or_default(),
                    kind,
                    remainder: body.into_remainder(),
                    origin,
                })
            })
            .collect()
    }
}
