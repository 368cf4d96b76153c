//! Per-invocation bookkeeping for one render tree
//!
//! Contexts live in a flat map keyed by render id. A context points at its parent
//! by id instead of holding a reference, so the tree can be arbitrarily deep
//! without anything walking it recursively.

use std::collections::HashMap;

use crate::component::ComponentClass;
use crate::render::{BoundSlots, RenderId};

#[derive(Debug)]
pub(crate) struct RenderContext {
    /// None for a page template that is not itself a component
    pub class: Option<ComponentClass>,
    pub parent: Option<RenderId>,
    pub default_slot_name: Option<String>,
    pub slots: BoundSlots,
}

#[derive(Debug, Default)]
pub(crate) struct RenderContexts {
    entries: HashMap<RenderId, RenderContext>,
}

impl RenderContexts {
    pub fn insert(&mut self, id: RenderId, context: RenderContext) {
        self.entries.insert(id, context);
    }

    pub fn get(&self, id: &RenderId) -> Option<&RenderContext> {
        self.entries.get(id)
    }

    pub fn get_mut(&mut self, id: &RenderId) -> Option<&mut RenderContext> {
        self.entries.get_mut(id)
    }

    pub fn remove(&mut self, id: &RenderId) -> Option<RenderContext> {
        self.entries.remove(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Component names from the root down to `id`
    pub fn path(&self, id: &RenderId) -> Vec<String> {
        let mut names = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let Some(context) = self.entries.get(current) else {
                break;
            };
            if let Some(class) = &context.class {
                names.push(class.name().to_string());
            }
            cursor = context.parent.as_ref();
        }
        names.reverse();
        names
    }

    /// `Outer > Inner` form of [`RenderContexts::path`]
    pub fn path_string(&self, id: &RenderId) -> String {
        self.path(id).join(" > ")
    }
}
