//! Rendering of component trees
//!
//! A render starts from one or more root invocations held by a
//! [`RenderScheduler`]. Templates are evaluated one component at a time; nested
//! components are scheduled and spliced back in by render id once their own
//! markup is ready.

mod context;
mod evaluator;
pub mod html;
mod ids;
mod provide;
mod scheduler;
mod slots;
mod template;

pub use ids::{RenderId, DEFAULT_RENDER_ID_WIDTH, RENDER_ID_PREFIX};
pub use provide::{ProvideEntry, ProvideError, ProvideRegistry, ProvideSnapshot, ScopeId};
pub use scheduler::{Invocation, RenderScheduler};
pub use slots::{
    BoundSlots, BoundTemplate, Slot, SlotContext, SlotDecl, SlotDecls, SlotError, SlotResolver,
    DEFAULT_SLOT,
};
pub use template::CompiledTemplate;
