//! Parsed component templates

use crate::parser::{parse, Block};
use crate::render::SlotDecls;
use crate::RenderError;

/// A parsed template plus the slots it declares
#[derive(Debug)]
pub struct CompiledTemplate {
    name: String,
    nodes: Block,
    slots: SlotDecls,
}

impl CompiledTemplate {
    /// Parse `source` and scan its slot declarations
    pub fn compile(name: &str, source: &str) -> Result<Self, RenderError> {
        let document = parse(source).map_err(|errors| RenderError::Parse {
            template: name.to_string(),
            source_text: source.to_string(),
            errors,
        })?;
        let slots = SlotDecls::scan(name, &document.nodes)?;
        Ok(Self {
            name: name.to_string(),
            nodes: document.nodes,
            slots,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nodes(&self) -> &Block {
        &self.nodes
    }

    pub fn slots(&self) -> &SlotDecls {
        &self.slots
    }
}
