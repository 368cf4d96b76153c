//! Public entry point: registered components, settings and asset resolution

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::component::{ComponentClass, ComponentRegistry};
use crate::dependencies::{AssetResolver, DependencyAggregator, DependencyStrategy, StaticUrlResolver};
use crate::environment::Environment;
use crate::render::{CompiledTemplate, Invocation, RenderScheduler, Slot};
use crate::settings::Settings;
use crate::value::Value;
use crate::RenderError;

/// Name a page template is compiled under
const PAGE_TEMPLATE_NAME: &str = "<page>";

/// Inputs for one top-level component render
#[derive(Debug, Clone, Default)]
pub struct RenderRequest {
    pub args: Vec<Value>,
    pub kwargs: IndexMap<String, Value>,
    pub fills: IndexMap<String, Slot>,
    pub env: Environment,
    /// Overrides the configured dependency strategy
    pub strategy: Option<DependencyStrategy>,
    pub only: bool,
}

impl RenderRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    pub fn with_kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(name.into(), value.into());
        self
    }

    /// Supply content for a slot; `"default"` targets the default slot
    pub fn with_fill(mut self, slot: impl Into<String>, fill: impl Into<Slot>) -> Self {
        self.fills.insert(slot.into(), fill.into());
        self
    }

    pub fn with_env(mut self, env: Environment) -> Self {
        self.env = env;
        self
    }

    pub fn with_strategy(mut self, strategy: DependencyStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Render in isolated scope regardless of settings
    pub fn with_only(mut self, only: bool) -> Self {
        self.only = only;
        self
    }
}

pub struct Engine {
    registry: ComponentRegistry,
    settings: Settings,
    aggregator: DependencyAggregator,
}

impl Engine {
    /// Create an engine resolving relative asset urls against `settings.static_url`
    pub fn new(settings: Settings) -> Self {
        let resolver = Arc::new(StaticUrlResolver::new(settings.static_url.clone()));
        Self::with_resolver(settings, resolver)
    }

    pub fn with_resolver(settings: Settings, resolver: Arc<dyn AssetResolver>) -> Self {
        let aggregator = DependencyAggregator::new(resolver, settings.dirs.clone());
        Self {
            registry: ComponentRegistry::new(),
            settings,
            aggregator,
        }
    }

    /// Register `class` under the tag name templates invoke it by
    ///
    /// Conflicting declarations are reported here rather than on first render.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        class: ComponentClass,
    ) -> Result<(), RenderError> {
        class.validate()?;
        self.registry.register(name, class)?;
        Ok(())
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ComponentRegistry {
        &mut self.registry
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn aggregator(&self) -> &DependencyAggregator {
        &self.aggregator
    }

    /// Render the component registered as `name`
    pub fn render(&self, name: &str, request: RenderRequest) -> Result<String, RenderError> {
        let class = self.registry.get(name)?.clone();
        self.render_class(class, request)
    }

    /// Render a component class, registered or not
    pub fn render_class(
        &self,
        class: ComponentClass,
        request: RenderRequest,
    ) -> Result<String, RenderError> {
        let strategy = request.strategy.unwrap_or(self.settings.dependency_strategy);
        tracing::debug!(component = %class.name(), strategy = %strategy, "render");

        let mut scheduler = RenderScheduler::new(self);
        scheduler.schedule(Invocation {
            class,
            args: request.args,
            kwargs: request.kwargs,
            fills: request.fills,
            outer: request.env.snapshot(),
            parent: None,
            only: request.only,
        })?;
        let html = scheduler.drain()?;
        self.aggregator.finalize(&html, strategy, scheduler.classes())
    }

    /// Render a page template that is not itself a component
    pub fn render_source(
        &self,
        source: &str,
        env: Environment,
        strategy: Option<DependencyStrategy>,
    ) -> Result<String, RenderError> {
        let strategy = strategy.unwrap_or(self.settings.dependency_strategy);
        tracing::debug!(strategy = %strategy, "render page");

        let template = CompiledTemplate::compile(PAGE_TEMPLATE_NAME, source)?;
        let mut scheduler = RenderScheduler::new(self);
        scheduler.schedule_page(template.nodes().clone(), env);
        let html = scheduler.drain()?;
        self.aggregator.finalize(&html, strategy, scheduler.classes())
    }

    /// Run the dependency pass over markup rendered earlier with `ignore`
    ///
    /// Classes are looked up in the process-wide identity registry, so they must
    /// still be alive.
    pub fn finalize(&self, html: &str, strategy: DependencyStrategy) -> Result<String, RenderError> {
        tracing::debug!(strategy = %strategy, "finalize");
        self.aggregator.finalize(html, strategy, &HashMap::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::TemplateComponent;
    use pretty_assertions::assert_eq;

    fn class(name: &str, template: &str) -> ComponentClass {
        ComponentClass::new("engine::tests", name, TemplateComponent::new(template))
    }

    #[test]
    fn test_render_registered_component() {
        let mut engine = Engine::new(Settings::default());
        engine
            .register("greeting", class("EngineGreeting", "<p>Hello {{ who }}</p>"))
            .unwrap();

        let html = engine
            .render(
                "greeting",
                RenderRequest::new()
                    .with_kwarg("who", "world")
                    .with_strategy(DependencyStrategy::Simple),
            )
            .unwrap();
        assert!(html.contains(">Hello world</p>"));
        assert!(!html.contains("_RENDERED"));
    }

    #[test]
    fn test_unknown_component() {
        let engine = Engine::new(Settings::default());
        let err = engine.render("nope", RenderRequest::new()).unwrap_err();
        assert!(matches!(err, RenderError::Registry(_)));
    }

    #[test]
    fn test_register_rejects_duplicate_name() {
        let mut engine = Engine::new(Settings::default());
        engine.register("x", class("EngineDupA", "a")).unwrap();
        let err = engine.register("x", class("EngineDupB", "b")).unwrap_err();
        assert!(matches!(err, RenderError::Registry(_)));
    }

    #[test]
    fn test_render_source_without_components() {
        let engine = Engine::new(Settings::default());
        let env = Environment::new().with_global("title", "Home");
        let html = engine
            .render_source("<h1>{{ title }}</h1>", env, Some(DependencyStrategy::Ignore))
            .unwrap();
        assert_eq!(html, "<h1>Home</h1>");
    }

    #[test]
    fn test_page_template_errors_are_not_wrapped() {
        let engine = Engine::new(Settings::default());
        let err = engine
            .render_source("{% for %}", Environment::new(), None)
            .unwrap_err();
        assert!(matches!(err, RenderError::Parse { .. }));
    }
}
