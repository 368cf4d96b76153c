//! Template evaluation
//!
//! Walks a template's nodes against a live environment. Control flow recurses
//! over the template's own structure; component tags are scheduled and leave a
//! placeholder behind.

use indexmap::IndexMap;

use crate::dependencies::markers::{css_placeholder, js_placeholder};
use crate::environment::Environment;
use crate::parser::{Block, ComponentTag, Expr, KeywordArg, Node, SlotTag, Spanned};
use crate::render::html::child_placeholder;
use crate::render::scheduler::{Frame, Invocation, RenderScheduler};
use crate::render::slots::{SlotKind, TemplateFill};
use crate::render::{RenderId, Slot, SlotContext, SlotError, DEFAULT_SLOT};
use crate::value::{Bindings, Value};
use crate::RenderError;

impl<'e> RenderScheduler<'e> {
    pub(crate) fn render_nodes(
        &mut self,
        nodes: &[Spanned<Node>],
        env: &mut Environment,
        frame: &Frame,
    ) -> Result<String, RenderError> {
        let mut out = String::new();
        for spanned in nodes {
            match &spanned.node {
                Node::Text(text) => out.push_str(text),
                Node::Variable(path) => {
                    if let Some(value) = env.lookup(path.segments()) {
                        out.push_str(&value.render());
                    }
                }
                Node::If {
                    condition,
                    then,
                    otherwise,
                } => {
                    let truthy = eval(&condition.expr.node, env).is_truthy() != condition.negated;
                    let branch = if truthy { then } else { otherwise };
                    out.push_str(&self.render_nodes(branch, env, frame)?);
                }
                Node::For {
                    binding,
                    iterable,
                    body,
                } => {
                    let items = match env.lookup(iterable.segments()) {
                        Some(Value::List(items)) => items.clone(),
                        _ => Vec::new(),
                    };
                    for item in items {
                        let mut scope = Bindings::new();
                        scope.insert(binding.node.to_string(), item);
                        env.push(scope);
                        let result = self.render_nodes(body, env, frame);
                        env.pop();
                        out.push_str(&result?);
                    }
                }
                Node::Component(tag) => out.push_str(&self.invoke_tag(tag, env, frame)?),
                Node::Slot(tag) => out.push_str(&self.render_slot(tag, env, frame)?),
                Node::Fill(tag) => {
                    return Err(SlotError::StrayFill {
                        slot: tag.name.node.clone(),
                    }
                    .into())
                }
                Node::Provide(tag) => {
                    let payload = Value::Map(eval_kwargs(&tag.data, env));
                    let scope = self.provides.enter(&tag.key.node, payload)?;
                    let result = self.render_nodes(&tag.body, env, frame);
                    let exited = self.provides.exit(scope);
                    out.push_str(&result?);
                    exited?;
                }
                Node::CssDependencies => out.push_str(&css_placeholder()),
                Node::JsDependencies => out.push_str(&js_placeholder()),
            }
        }
        Ok(out)
    }

    /// Schedule the component a tag invokes and return its placeholder
    fn invoke_tag(
        &mut self,
        tag: &ComponentTag,
        env: &Environment,
        frame: &Frame,
    ) -> Result<String, RenderError> {
        let class = self.engine.registry().get(&tag.name.node)?.clone();

        let mut args = Vec::new();
        let mut kwargs = IndexMap::new();
        for arg in &tag.args {
            let value = eval(&arg.value.node, env);
            match &arg.name {
                Some(name) => {
                    kwargs.insert(name.node.to_string(), value);
                }
                None => args.push(value),
            }
        }

        let fills = match &tag.body {
            Some(body) => self.collect_fills(&tag.name.node, body, env, frame)?,
            None => IndexMap::new(),
        };

        let id = self.schedule(Invocation {
            class,
            args,
            kwargs,
            fills,
            outer: env.snapshot(),
            parent: Some(frame.owner.clone()),
            only: tag.only,
        })?;
        Ok(child_placeholder(&id))
    }

    /// Turn a component tag's body into fills
    ///
    /// Either every non-blank node is a `fill` tag, or the whole body is the
    /// default fill.
    fn collect_fills(
        &self,
        component: &str,
        body: &Block,
        env: &Environment,
        frame: &Frame,
    ) -> Result<IndexMap<String, Slot>, RenderError> {
        let mut fills = IndexMap::new();
        let has_fill_tags = body.iter().any(|n| matches!(n.node, Node::Fill(_)));
        let has_content = body.iter().any(|n| !n.node.is_blank_text());
        if !has_content {
            return Ok(fills);
        }

        let env = env.snapshot();
        let provides = self.provides.snapshot();
        let capture = |nodes: Block, data_var: Option<String>, fallback_var: Option<String>| {
            Slot::template(TemplateFill {
                nodes,
                env: env.clone(),
                scope: frame.slot_scope.clone(),
                provides: provides.clone(),
                data_var,
                fallback_var,
            })
        };

        if !has_fill_tags {
            fills.insert(DEFAULT_SLOT.to_string(), capture(body.clone(), None, None));
            return Ok(fills);
        }

        for spanned in body.iter() {
            match &spanned.node {
                Node::Fill(fill) => {
                    let name = fill.name.node.clone();
                    if fills.contains_key(&name) {
                        return Err(SlotError::DuplicateFill {
                            component: component.to_string(),
                            slot: name,
                        }
                        .into());
                    }
                    let slot = capture(
                        fill.body.clone(),
                        fill.data_var.clone(),
                        fill.fallback_var.clone(),
                    );
                    fills.insert(name, slot);
                }
                node if node.is_blank_text() => {}
                _ => {
                    return Err(SlotError::MixedFillContent {
                        component: component.to_string(),
                    }
                    .into())
                }
            }
        }
        Ok(fills)
    }

    /// Render a slot tag: the caller's fill if there is one, else the fallback
    fn render_slot(
        &mut self,
        tag: &SlotTag,
        env: &mut Environment,
        frame: &Frame,
    ) -> Result<String, RenderError> {
        let name = tag.name.node.as_str();
        let Some(scope) = frame.slot_scope.clone() else {
            return self.render_nodes(&tag.fallback, env, frame);
        };

        if tag.is_default {
            self.claim_default_slot(&scope, name)?;
        }

        let fill = self
            .contexts
            .get(&scope)
            .and_then(|context| context.slots.fill(name))
            .cloned();
        let Some(slot) = fill else {
            return self.render_nodes(&tag.fallback, env, frame);
        };

        let data = eval_kwargs(&tag.data, env);
        let fallback = if slot.wants_fallback() {
            Some(self.render_nodes(&tag.fallback, env, frame)?)
        } else {
            None
        };

        match slot.0 {
            SlotKind::Text(text) => Ok(text),
            SlotKind::Func(f) => f(&SlotContext { name, data: &data }),
            SlotKind::Template(fill) => {
                let mut fill_env = Environment::from_snapshot(&fill.env);
                let mut extra = Bindings::new();
                if let Some(var) = &fill.data_var {
                    extra.insert(var.clone(), Value::Map(data));
                }
                if let Some(var) = &fill.fallback_var {
                    extra.insert(var.clone(), Value::String(fallback.unwrap_or_default()));
                }
                fill_env.push(extra);

                let fill_frame = Frame {
                    owner: frame.owner.clone(),
                    slot_scope: fill.scope.clone(),
                };
                // Fills see the caller's provide scopes, not the callee's
                let callee_provides = std::mem::take(&mut self.provides);
                let restored = self.provides.restore(&fill.provides);
                let result = self.render_nodes(&fill.nodes, &mut fill_env, &fill_frame);
                let exited = self.provides.exit(restored);
                self.provides = callee_provides;
                let html = result?;
                exited?;
                Ok(html)
            }
        }
    }

    /// Record `name` as the default slot of `scope`, rejecting a second name
    fn claim_default_slot(&mut self, scope: &RenderId, name: &str) -> Result<(), RenderError> {
        let Some(context) = self.contexts.get_mut(scope) else {
            return Ok(());
        };
        match &context.default_slot_name {
            Some(existing) if existing != name => Err(SlotError::MultipleDefaults {
                component: context
                    .class
                    .as_ref()
                    .map(|c| c.name().to_string())
                    .unwrap_or_default(),
                first: existing.clone(),
                second: name.to_string(),
            }
            .into()),
            Some(_) => Ok(()),
            None => {
                context.default_slot_name = Some(name.to_string());
                Ok(())
            }
        }
    }
}

fn eval(expr: &Expr, env: &Environment) -> Value {
    match expr {
        Expr::Literal(value) => value.clone(),
        Expr::Path(path) => env.lookup(path.segments()).cloned().unwrap_or_default(),
    }
}

fn eval_kwargs(args: &[KeywordArg], env: &Environment) -> Bindings {
    args.iter()
        .map(|arg| (arg.name.node.to_string(), eval(&arg.value.node, env)))
        .collect()
}
