//! Deferred, non-recursive rendering of a component tree
//!
//! Evaluating a template never renders a nested component directly. The
//! component tag is turned into an [`Invocation`], scheduled, and replaced in the
//! caller's output by a placeholder. Scheduling runs the component's data hooks
//! right away (so they see the provide scopes and environment of the call site)
//! and stores a deferred renderer for later.
//!
//! [`RenderScheduler::drain`] then walks the tree with an explicit stack: render
//! a component, split its markup on child placeholders, render the children in
//! document order, and finally hand the assembled markup to the component's
//! post-render callback. Nesting depth is bounded by memory, not by the native
//! call stack.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use indexmap::IndexMap;

use crate::component::{ComponentClass, ComponentInput};
use crate::dependencies::markers::RenderedMarker;
use crate::dependencies::AssetKind;
use crate::engine::Engine;
use crate::environment::{ContextBehavior, Environment, EnvironmentSnapshot};
use crate::parser::Block;
use crate::render::context::{RenderContext, RenderContexts};
use crate::render::html::{
    child_placeholder, set_root_attributes, split_placeholders, Segment, CSS_HASH_ATTR_PREFIX,
    RENDER_ID_ATTR_PREFIX,
};
use crate::render::ids::RenderIdGenerator;
use crate::render::{
    BoundSlots, CompiledTemplate, ProvideRegistry, ProvideSnapshot, RenderId, Slot, SlotResolver,
};
use crate::value::{bindings, Bindings, Value};
use crate::RenderError;

/// Produces one component's markup, with placeholders for its children
pub(crate) type DeferredRenderer =
    Box<dyn FnOnce(&mut RenderScheduler<'_>) -> Result<String, RenderError>>;

/// Turns a component's assembled markup into its final markup
pub(crate) type PostRenderCallback = Box<dyn FnOnce(String) -> Result<String, RenderError>>;

fn deferred<F>(f: F) -> DeferredRenderer
where
    F: FnOnce(&mut RenderScheduler<'_>) -> Result<String, RenderError> + 'static,
{
    Box::new(f)
}

/// One request to render a component with specific inputs
#[derive(Debug, Clone)]
pub struct Invocation {
    pub class: ComponentClass,
    pub args: Vec<Value>,
    pub kwargs: IndexMap<String, Value>,
    pub fills: IndexMap<String, Slot>,
    /// The caller's environment when the invocation was made
    pub outer: EnvironmentSnapshot,
    pub parent: Option<RenderId>,
    /// Force isolated scoping for this invocation
    pub only: bool,
}

impl Invocation {
    pub fn new(class: ComponentClass) -> Self {
        Self {
            class,
            args: Vec::new(),
            kwargs: IndexMap::new(),
            fills: IndexMap::new(),
            outer: EnvironmentSnapshot::default(),
            parent: None,
            only: false,
        }
    }
}

/// Where template evaluation currently is
#[derive(Debug, Clone)]
pub(crate) struct Frame {
    /// Render whose markup is being produced
    pub owner: RenderId,
    /// Render whose fills answer slot tags; None on a page template
    pub slot_scope: Option<RenderId>,
}

enum Step {
    Render {
        id: RenderId,
        owner: Option<RenderId>,
    },
    Emit {
        owner: RenderId,
        html: String,
    },
    /// A placeholder for a child already rendered earlier in the document
    Repeat {
        id: RenderId,
        owner: RenderId,
    },
    Finish {
        id: RenderId,
        owner: Option<RenderId>,
    },
}

pub struct RenderScheduler<'e> {
    pub(crate) engine: &'e Engine,
    ids: RenderIdGenerator,
    pub(crate) contexts: RenderContexts,
    pending: HashMap<RenderId, DeferredRenderer>,
    callbacks: HashMap<RenderId, PostRenderCallback>,
    roots: VecDeque<RenderId>,
    pub(crate) provides: ProvideRegistry,
    /// Classes rendered in this tree, by class id
    classes: HashMap<String, ComponentClass>,
}

impl<'e> RenderScheduler<'e> {
    pub fn new(engine: &'e Engine) -> Self {
        Self {
            engine,
            ids: RenderIdGenerator::new(engine.settings().render_id_width),
            contexts: RenderContexts::default(),
            pending: HashMap::new(),
            callbacks: HashMap::new(),
            roots: VecDeque::new(),
            provides: ProvideRegistry::new(),
            classes: HashMap::new(),
        }
    }

    /// Queue an invocation; its markup is produced by [`RenderScheduler::drain`]
    ///
    /// Data hooks, slot binding and per-instance asset registration run now.
    /// Any error is annotated with the component path.
    pub fn schedule(&mut self, invocation: Invocation) -> Result<RenderId, RenderError> {
        let id = self.ids.next_id();
        let is_root = invocation.parent.is_none();
        self.contexts.insert(
            id.clone(),
            RenderContext {
                class: Some(invocation.class.clone()),
                parent: invocation.parent.clone(),
                default_slot_name: None,
                slots: BoundSlots::default(),
            },
        );
        tracing::trace!(
            render_id = %id,
            component = %invocation.class.name(),
            "scheduling component"
        );
        if let Err(err) = self.prepare(&id, invocation) {
            let err = self.annotate(&id, err);
            self.contexts.remove(&id);
            return Err(err);
        }
        if is_root {
            self.roots.push_back(id.clone());
        }
        Ok(id)
    }

    /// Queue a page template that is not itself a component
    pub fn schedule_page(&mut self, nodes: Block, env: Environment) -> RenderId {
        let id = self.ids.next_id();
        self.contexts.insert(
            id.clone(),
            RenderContext {
                class: None,
                parent: None,
                default_slot_name: None,
                slots: BoundSlots::default(),
            },
        );
        let page_id = id.clone();
        let renderer = deferred(move |sched| {
            let mut env = env;
            let frame = Frame {
                owner: page_id,
                slot_scope: None,
            };
            sched.render_nodes(&nodes, &mut env, &frame)
        });
        self.pending.insert(id.clone(), renderer);
        self.roots.push_back(id.clone());
        id
    }

    fn prepare(&mut self, id: &RenderId, invocation: Invocation) -> Result<(), RenderError> {
        let Invocation {
            class,
            args,
            kwargs,
            fills,
            outer,
            parent: _,
            only,
        } = invocation;
        let engine = self.engine;
        let settings = engine.settings();

        class.validate()?;
        let template = class.compiled_template(&settings.dirs)?;
        engine.aggregator().register(&class)?;
        self.classes
            .entry(class.id().to_string())
            .or_insert_with(|| class.clone());

        let bound = SlotResolver::resolve(Arc::clone(&template), fills)?;
        let path = self.contexts.path(id);

        let component = class.component();
        let (data, js_data, css_data) = {
            let input = ComponentInput {
                render_id: id,
                component_path: &path,
                args: &args,
                kwargs: &kwargs,
                is_filled: bound.slots.is_filled(),
                provides: &self.provides,
                outer: &outer,
            };
            (
                component.get_template_data(&input)?,
                component.get_js_data(&input)?,
                component.get_css_data(&input)?,
            )
        };

        let aggregator = engine.aggregator();
        let js_hash = if js_data.is_empty() {
            None
        } else {
            Some(aggregator.register_instance_vars(&class, AssetKind::Js, &js_data)?)
        };
        let css_hash = if css_data.is_empty() {
            None
        } else {
            Some(aggregator.register_instance_vars(&class, AssetKind::Css, &css_data)?)
        };

        let behavior = if only {
            ContextBehavior::Isolated
        } else {
            settings.context_behavior
        };
        let mut env = outer.scoped(behavior);
        env.push(data);
        let is_filled: Bindings = bound
            .slots
            .is_filled()
            .iter()
            .map(|(name, filled)| (name.clone(), Value::Bool(*filled)))
            .collect();
        let kwargs_map: Bindings = kwargs.into_iter().collect();
        env.push(bindings([(
            "component_vars",
            Value::Map(bindings([
                ("is_filled", Value::Map(is_filled)),
                ("args", Value::List(args)),
                ("kwargs", Value::Map(kwargs_map)),
            ])),
        )]));
        let env = env.snapshot();
        let provides = self.provides.snapshot();

        if let Some(context) = self.contexts.get_mut(id) {
            context.default_slot_name = bound.slots.default_name().map(str::to_string);
            context.slots = bound.slots;
        }

        let marker = RenderedMarker {
            class_id: class.id().to_string(),
            render_id: id.to_string(),
            js_hash,
            css_hash: css_hash.clone(),
        };
        let mut attrs = vec![format!("{}{}", RENDER_ID_ATTR_PREFIX, id)];
        if let Some(hash) = &css_hash {
            attrs.push(format!("{}{}", CSS_HASH_ATTR_PREFIX, hash));
        }
        let callback_class = class.clone();
        self.callbacks.insert(
            id.clone(),
            Box::new(move |html: String| {
                let html = callback_class.component().on_render_after(html)?;
                let html = set_root_attributes(&html, &attrs);
                Ok(format!("{}{}", marker, html))
            }),
        );

        let render_id = id.clone();
        self.pending.insert(
            id.clone(),
            deferred(move |sched| sched.render_component(&render_id, &template, &env, &provides)),
        );
        Ok(())
    }

    fn render_component(
        &mut self,
        id: &RenderId,
        template: &CompiledTemplate,
        env: &EnvironmentSnapshot,
        provides: &ProvideSnapshot,
    ) -> Result<String, RenderError> {
        let scope = self.provides.restore(provides);
        let mut env = Environment::from_snapshot(env);
        let frame = Frame {
            owner: id.clone(),
            slot_scope: Some(id.clone()),
        };
        let result = self.render_nodes(template.nodes(), &mut env, &frame);
        let exited = self.provides.exit(scope);
        let html = result?;
        exited?;
        Ok(html)
    }

    /// Render everything scheduled so far and return the concatenated markup
    ///
    /// On error every per-render structure is torn down before returning.
    pub fn drain(&mut self) -> Result<String, RenderError> {
        match self.run() {
            Ok(html) => {
                self.discard_orphans();
                Ok(html)
            }
            Err(err) => {
                self.teardown();
                Err(err)
            }
        }
    }

    fn run(&mut self) -> Result<String, RenderError> {
        let mut output = String::new();

        while let Some(root) = self.roots.pop_front() {
            let mut parts: HashMap<RenderId, String> = HashMap::new();
            // Children whose placeholder has been turned into a render step
            let mut claimed: HashSet<RenderId> = HashSet::new();
            // Finished markup of children whose placeholder occurs more than once
            let mut repeated: HashMap<RenderId, Option<String>> = HashMap::new();
            let mut steps = vec![Step::Render {
                id: root,
                owner: None,
            }];

            while let Some(step) = steps.pop() {
                match step {
                    Step::Render { id, owner } => {
                        let Some(renderer) = self.pending.remove(&id) else {
                            continue;
                        };
                        let html = renderer(self).map_err(|e| self.annotate(&id, e))?;
                        parts.insert(id.clone(), String::with_capacity(html.len()));
                        steps.push(Step::Finish {
                            id: id.clone(),
                            owner,
                        });
                        // Claim children in document order, then push so the first pops first
                        let mut children = Vec::new();
                        for segment in split_placeholders(&html) {
                            children.push(match segment {
                                Segment::Child(child) if claimed.contains(&child) => {
                                    repeated.entry(child.clone()).or_insert(None);
                                    Step::Repeat {
                                        id: child,
                                        owner: id.clone(),
                                    }
                                }
                                Segment::Child(child) if self.pending.contains_key(&child) => {
                                    claimed.insert(child.clone());
                                    Step::Render {
                                        id: child,
                                        owner: Some(id.clone()),
                                    }
                                }
                                Segment::Child(child) => Step::Emit {
                                    owner: id.clone(),
                                    html: child_placeholder(&child),
                                },
                                Segment::Html(html) => Step::Emit {
                                    owner: id.clone(),
                                    html,
                                },
                            });
                        }
                        steps.extend(children.into_iter().rev());
                    }
                    Step::Emit { owner, html } => {
                        parts.entry(owner).or_default().push_str(&html);
                    }
                    Step::Repeat { id, owner } => {
                        let Some(Some(html)) = repeated.get(&id) else {
                            let err = RenderError::custom(format!(
                                "placeholder of {} appears inside its own markup",
                                id
                            ));
                            return Err(self.annotate(&owner, err));
                        };
                        parts.entry(owner).or_default().push_str(html);
                    }
                    Step::Finish { id, owner } => {
                        let mut html = parts.remove(&id).unwrap_or_default();
                        if let Some(callback) = self.callbacks.remove(&id) {
                            html = callback(html).map_err(|e| self.annotate(&id, e))?;
                        }
                        if let Some(copy) = repeated.get_mut(&id) {
                            *copy = Some(html.clone());
                        }
                        self.contexts.remove(&id);
                        tracing::trace!(render_id = %id, "component finished");
                        match owner {
                            Some(owner) => parts.entry(owner).or_default().push_str(&html),
                            None => output.push_str(&html),
                        }
                    }
                }
            }
        }

        Ok(output)
    }

    /// Wrap `err` once with the component path of `id`
    fn annotate(&self, id: &RenderId, err: RenderError) -> RenderError {
        if matches!(err, RenderError::InComponent { .. }) {
            return err;
        }
        let path = self.contexts.path_string(id);
        if path.is_empty() {
            return err;
        }
        RenderError::InComponent {
            path,
            source: Box::new(err),
        }
    }

    /// Invocations whose placeholder never made it into the output
    fn discard_orphans(&mut self) {
        if self.pending.is_empty() && self.callbacks.is_empty() && self.contexts.is_empty() {
            return;
        }
        tracing::debug!(
            pending = self.pending.len(),
            contexts = self.contexts.len(),
            "discarding renders whose placeholders were not emitted"
        );
        self.pending.clear();
        self.callbacks.clear();
        self.contexts.clear();
    }

    fn teardown(&mut self) {
        tracing::debug!(
            pending = self.pending.len(),
            contexts = self.contexts.len(),
            provide_scopes = self.provides.depth(),
            "render aborted, tearing down"
        );
        self.pending.clear();
        self.callbacks.clear();
        self.contexts.clear();
        self.roots.clear();
        self.provides = ProvideRegistry::new();
    }

    /// True when no per-render state is left
    pub fn is_idle(&self) -> bool {
        self.pending.is_empty()
            && self.callbacks.is_empty()
            && self.contexts.is_empty()
            && self.roots.is_empty()
            && self.provides.is_empty()
    }

    /// Classes rendered so far, by class id
    pub fn classes(&self) -> &HashMap<String, ComponentClass> {
        &self.classes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{Component, TemplateComponent};
    use crate::engine::Engine;
    use crate::settings::Settings;

    fn engine_with(components: &[(&str, &str, &str)]) -> Engine {
        let mut engine = Engine::new(Settings::default());
        for (tag, class_name, template) in components {
            engine
                .register(
                    *tag,
                    ComponentClass::new(
                        "scheduler::tests",
                        *class_name,
                        TemplateComponent::new(*template),
                    ),
                )
                .unwrap();
        }
        engine
    }

    #[test]
    fn test_children_resolved_in_document_order() {
        let engine = engine_with(&[
            ("list", "SchedList", r#"<ul>{% component "item" n=1 / %}{% component "item" n=2 / %}</ul>"#),
            ("item", "SchedItem", "<li>{{ n }}</li>"),
        ]);
        let mut sched = RenderScheduler::new(&engine);
        let class = engine.registry().get("list").unwrap().clone();
        sched.schedule(Invocation::new(class)).unwrap();
        let html = sched.drain().unwrap();

        let first = html.find(">1</li>").unwrap();
        let second = html.find(">2</li>").unwrap();
        assert!(first < second);
        assert!(!html.contains("data-cw-render"));
        assert!(sched.is_idle());
    }

    struct Failing;

    impl Component for Failing {
        fn template(&self) -> Option<&str> {
            Some("<p>never</p>")
        }

        fn get_template_data(&self, _input: &ComponentInput<'_>) -> Result<Bindings, RenderError> {
            Err(RenderError::custom("boom"))
        }
    }

    #[test]
    fn test_error_tears_down_and_names_path() {
        let mut engine = engine_with(&[
            ("outer", "SchedOuter", r#"<div>{% provide "k" v=1 %}{% component "bad" / %}{% endprovide %}</div>"#),
        ]);
        engine
            .register("bad", ComponentClass::new("scheduler::tests", "SchedBad", Failing))
            .unwrap();

        let mut sched = RenderScheduler::new(&engine);
        let class = engine.registry().get("outer").unwrap().clone();
        sched.schedule(Invocation::new(class)).unwrap();
        let err = sched.drain().unwrap_err();

        match &err {
            RenderError::InComponent { path, .. } => assert_eq!(path, "SchedOuter > SchedBad"),
            other => panic!("Expected annotated error, got {:?}", other),
        }
        assert!(err.to_string().contains("boom"));
        assert!(sched.is_idle());
    }

    #[test]
    fn test_schedule_error_is_annotated() {
        let engine = engine_with(&[("broken", "SchedBroken", "{% if x %}unclosed")]);
        let mut sched = RenderScheduler::new(&engine);
        let class = engine.registry().get("broken").unwrap().clone();
        let err = sched.schedule(Invocation::new(class)).unwrap_err();
        assert!(matches!(
            err,
            RenderError::InComponent { ref path, .. } if path == "SchedBroken"
        ));
    }
}
