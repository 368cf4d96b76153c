//! Slots: named placeholders in a component template and the fills that replace them

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use thiserror::Error;

use crate::environment::EnvironmentSnapshot;
use crate::parser::{Block, Node, Spanned};
use crate::render::{CompiledTemplate, ProvideSnapshot, RenderId};
use crate::value::Bindings;
use crate::RenderError;

/// Fill name that targets whichever slot is marked `default`
pub const DEFAULT_SLOT: &str = "default";

#[derive(Debug, Error, PartialEq)]
pub enum SlotError {
    #[error("component '{component}' marks both '{first}' and '{second}' as the default slot")]
    MultipleDefaults {
        component: String,
        first: String,
        second: String,
    },

    #[error("slot '{slot}' of component '{component}' was filled more than once")]
    DuplicateFill { component: String, slot: String },

    #[error("component '{component}' has no slot named '{slot}' (available: {available})")]
    UnknownFill {
        component: String,
        slot: String,
        available: String,
    },

    #[error("component '{component}' was given default content but declares no default slot")]
    NoDefaultSlot { component: String },

    #[error("body of component '{component}' mixes fill tags with other content")]
    MixedFillContent { component: String },

    #[error("fill '{slot}' is only allowed directly inside a component body")]
    StrayFill { slot: String },

    #[error("required slot '{slot}' of component '{component}' was not filled")]
    RequiredSlotMissing { component: String, slot: String },
}

/// One slot declared by a template
#[derive(Debug, Clone, PartialEq)]
pub struct SlotDecl {
    pub name: String,
    pub is_default: bool,
    pub required: bool,
}

/// Slots declared anywhere in a template, in order of first appearance
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SlotDecls {
    decls: Vec<SlotDecl>,
    default: Option<String>,
}

impl SlotDecls {
    /// Collect the slot tags of a template
    ///
    /// Slots nested in `if`/`for` blocks, fallbacks and the bodies of nested
    /// component invocations all belong to this template.
    pub fn scan(component: &str, nodes: &[Spanned<Node>]) -> Result<Self, SlotError> {
        let mut decls = SlotDecls::default();
        let mut pending: Vec<std::slice::Iter<'_, Spanned<Node>>> = vec![nodes.iter()];

        while let Some(iter) = pending.last_mut() {
            let Some(spanned) = iter.next() else {
                pending.pop();
                continue;
            };
            match &spanned.node {
                Node::Slot(tag) => {
                    decls.declare(component, &tag.name.node, tag.is_default, tag.required)?;
                    pending.push(tag.fallback.iter());
                }
                Node::If {
                    then, otherwise, ..
                } => {
                    pending.push(otherwise.iter());
                    pending.push(then.iter());
                }
                Node::For { body, .. } => pending.push(body.iter()),
                Node::Component(tag) => {
                    if let Some(body) = &tag.body {
                        pending.push(body.iter());
                    }
                }
                Node::Fill(tag) => pending.push(tag.body.iter()),
                Node::Provide(tag) => pending.push(tag.body.iter()),
                Node::Text(_)
                | Node::Variable(_)
                | Node::CssDependencies
                | Node::JsDependencies => {}
            }
        }

        Ok(decls)
    }

    fn declare(
        &mut self,
        component: &str,
        name: &str,
        is_default: bool,
        required: bool,
    ) -> Result<(), SlotError> {
        if is_default {
            match &self.default {
                Some(existing) if existing != name => {
                    return Err(SlotError::MultipleDefaults {
                        component: component.to_string(),
                        first: existing.clone(),
                        second: name.to_string(),
                    })
                }
                _ => self.default = Some(name.to_string()),
            }
        }
        match self.decls.iter_mut().find(|d| d.name == name) {
            Some(decl) => {
                decl.is_default |= is_default;
                decl.required |= required;
            }
            None => self.decls.push(SlotDecl {
                name: name.to_string(),
                is_default,
                required,
            }),
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &SlotDecl> {
        self.decls.iter()
    }

    pub fn get(&self, name: &str) -> Option<&SlotDecl> {
        self.decls.iter().find(|d| d.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Name of the slot marked `default`, if any
    pub fn default_name(&self) -> Option<&str> {
        self.default.as_deref()
    }

    pub fn names(&self) -> Vec<&str> {
        self.decls.iter().map(|d| d.name.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }
}

/// What a function slot is called with
pub struct SlotContext<'a> {
    /// Name of the slot being rendered
    pub name: &'a str,
    /// Data the slot tag hands to its fill
    pub data: &'a Bindings,
}

type SlotFn = dyn Fn(&SlotContext<'_>) -> Result<String, RenderError> + Send + Sync;

/// Content supplied for a slot
#[derive(Clone)]
pub struct Slot(pub(crate) SlotKind);

#[derive(Clone)]
pub(crate) enum SlotKind {
    Text(String),
    Func(Arc<SlotFn>),
    Template(Arc<TemplateFill>),
}

/// A `{% fill %}` body captured at invocation time
pub(crate) struct TemplateFill {
    pub nodes: Block,
    pub env: EnvironmentSnapshot,
    /// Render whose fills resolve slot tags inside this body
    pub scope: Option<RenderId>,
    pub provides: ProvideSnapshot,
    pub data_var: Option<String>,
    pub fallback_var: Option<String>,
}

impl Slot {
    /// Literal markup
    pub fn text(text: impl Into<String>) -> Self {
        Slot(SlotKind::Text(text.into()))
    }

    /// Markup computed when the slot renders
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&SlotContext<'_>) -> Result<String, RenderError> + Send + Sync + 'static,
    {
        Slot(SlotKind::Func(Arc::new(f)))
    }

    pub(crate) fn template(fill: TemplateFill) -> Self {
        Slot(SlotKind::Template(Arc::new(fill)))
    }

    /// Whether rendering this slot needs the slot's own fallback markup
    pub(crate) fn wants_fallback(&self) -> bool {
        matches!(&self.0, SlotKind::Template(fill) if fill.fallback_var.is_some())
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            SlotKind::Text(text) => f.debug_tuple("Slot::Text").field(text).finish(),
            SlotKind::Func(_) => f.write_str("Slot::Func"),
            SlotKind::Template(fill) => f
                .debug_struct("Slot::Template")
                .field("nodes", &fill.nodes.len())
                .field("data_var", &fill.data_var)
                .field("fallback_var", &fill.fallback_var)
                .finish(),
        }
    }
}

impl From<&str> for Slot {
    fn from(text: &str) -> Self {
        Slot::text(text)
    }
}

impl From<String> for Slot {
    fn from(text: String) -> Self {
        Slot::text(text)
    }
}

/// Fills matched to the slots of one template
#[derive(Debug, Clone, Default)]
pub struct BoundSlots {
    fills: HashMap<String, Slot>,
    is_filled: BTreeMap<String, bool>,
    default_name: Option<String>,
}

impl BoundSlots {
    pub fn fill(&self, slot: &str) -> Option<&Slot> {
        self.fills.get(slot)
    }

    /// `is_filled[name]` for every declared slot (and `default`, if one is marked)
    pub fn is_filled(&self) -> &BTreeMap<String, bool> {
        &self.is_filled
    }

    pub fn default_name(&self) -> Option<&str> {
        self.default_name.as_deref()
    }
}

/// A compiled template together with the fills for its slots
#[derive(Debug, Clone)]
pub struct BoundTemplate {
    pub template: Arc<CompiledTemplate>,
    pub slots: BoundSlots,
}

/// Matches caller fills to a template's declared slots
pub struct SlotResolver;

impl SlotResolver {
    /// Bind `fills` to the slots declared by `template`
    ///
    /// A fill named `default` goes to the slot marked default unless the template
    /// has a slot literally called `default`. Fills for undeclared slots, two
    /// fills ending up in the same slot, and unfilled `required` slots are errors.
    pub fn resolve(
        template: Arc<CompiledTemplate>,
        fills: IndexMap<String, Slot>,
    ) -> Result<BoundTemplate, SlotError> {
        let component = template.name().to_string();
        let decls = template.slots();
        let mut bound: HashMap<String, Slot> = HashMap::new();

        for (name, slot) in fills {
            let target = if name == DEFAULT_SLOT && !decls.contains(DEFAULT_SLOT) {
                match decls.default_name() {
                    Some(default) => default.to_string(),
                    None => return Err(SlotError::NoDefaultSlot { component }),
                }
            } else {
                name
            };
            if !decls.contains(&target) {
                return Err(SlotError::UnknownFill {
                    component,
                    slot: target,
                    available: decls.names().join(", "),
                });
            }
            if bound.contains_key(&target) {
                return Err(SlotError::DuplicateFill {
                    component,
                    slot: target,
                });
            }
            bound.insert(target, slot);
        }

        for decl in decls.iter() {
            if decl.required && !bound.contains_key(&decl.name) {
                return Err(SlotError::RequiredSlotMissing {
                    component,
                    slot: decl.name.clone(),
                });
            }
        }

        let mut is_filled: BTreeMap<String, bool> = decls
            .iter()
            .map(|d| (d.name.clone(), bound.contains_key(&d.name)))
            .collect();
        if let Some(default) = decls.default_name() {
            let filled = bound.contains_key(default);
            is_filled.entry(DEFAULT_SLOT.to_string()).or_insert(filled);
        }

        Ok(BoundTemplate {
            slots: BoundSlots {
                fills: bound,
                is_filled,
                default_name: decls.default_name().map(str::to_string),
            },
            template,
        })
    }
}
