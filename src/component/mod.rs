//! Component classes and the hooks a component can implement
//!
//! A component is anything implementing [`Component`]: it supplies a template
//! (inline or from a file), optional JS/CSS, external media, and data hooks that
//! run once per invocation. Every hook has a no-op default, so the smallest
//! component is just a template.
//!
//! Components are wrapped in a [`ComponentClass`], a cheap reference-counted
//! handle that owns the per-class caches (compiled template, static assets) and
//! keeps the class registered in the process-wide identity registry for as long
//! as a handle is alive.
//!
//! # Example
//!
//! ```
//! use component_weave::component::{ComponentClass, TemplateComponent};
//!
//! let card = ComponentClass::new(
//!     "app::cards",
//!     "Card",
//!     TemplateComponent::new("<div class=\"card\">{% slot \"body\" default %}{% endslot %}</div>"),
//! );
//! assert!(card.id().as_str().starts_with("Card_"));
//! ```

pub mod identity;
mod registry;
mod template_component;

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use once_cell::sync::OnceCell;
use thiserror::Error;

use crate::dependencies::ClassAssets;
use crate::environment::EnvironmentSnapshot;
use crate::render::{CompiledTemplate, ProvideError, ProvideRegistry, RenderId};
use crate::value::{Bindings, Value};
use crate::RenderError;

pub use identity::{ClassId, IdentityError, IdentityRegistry};
pub use registry::{ComponentRegistry, RegistryError};
pub use template_component::TemplateComponent;

/// Errors in how a component class is declared
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("component '{component}' declares both {kind} and {kind}_file")]
    ConflictingDeclaration {
        component: String,
        kind: &'static str,
    },

    #[error("component '{component}' has neither template nor template_file")]
    MissingTemplate { component: String },

    #[error("{kind} file for component '{component}' not found: {path}")]
    FileNotFound {
        component: String,
        kind: &'static str,
        path: PathBuf,
    },

    #[error("error reading {kind} file {path}: {message}")]
    FileRead {
        kind: &'static str,
        path: PathBuf,
        message: String,
    },
}

/// External stylesheet with extra tag attributes (e.g. `media`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaCss {
    pub url: String,
    pub attrs: BTreeMap<String, String>,
}

/// External JS/CSS a component depends on
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Media {
    pub js: Vec<String>,
    pub css: Vec<MediaCss>,
}

impl Media {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn js(mut self, url: impl Into<String>) -> Self {
        self.js.push(url.into());
        self
    }

    pub fn css(mut self, url: impl Into<String>) -> Self {
        self.css.push(MediaCss {
            url: url.into(),
            attrs: BTreeMap::new(),
        });
        self
    }

    /// Stylesheet with a `media` attribute, e.g. `print`
    pub fn css_for(mut self, url: impl Into<String>, media: impl Into<String>) -> Self {
        let mut attrs = BTreeMap::new();
        attrs.insert("media".to_string(), media.into());
        self.css.push(MediaCss {
            url: url.into(),
            attrs,
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.js.is_empty() && self.css.is_empty()
    }
}

/// Everything a data hook can see about the invocation it runs for
pub struct ComponentInput<'a> {
    pub(crate) render_id: &'a RenderId,
    pub(crate) component_path: &'a [String],
    pub(crate) args: &'a [Value],
    pub(crate) kwargs: &'a IndexMap<String, Value>,
    pub(crate) is_filled: &'a BTreeMap<String, bool>,
    pub(crate) provides: &'a ProvideRegistry,
    pub(crate) outer: &'a EnvironmentSnapshot,
}

impl<'a> ComponentInput<'a> {
    pub fn render_id(&self) -> &RenderId {
        self.render_id
    }

    /// Names of the components from the root down to this one
    pub fn component_path(&self) -> &[String] {
        self.component_path
    }

    pub fn args(&self) -> &[Value] {
        self.args
    }

    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }

    pub fn kwargs(&self) -> &IndexMap<String, Value> {
        self.kwargs
    }

    pub fn kwarg(&self, name: &str) -> Option<&Value> {
        self.kwargs.get(name)
    }

    /// Whether the caller supplied a fill for `slot`
    pub fn is_filled(&self, slot: &str) -> bool {
        self.is_filled.get(slot).copied().unwrap_or(false)
    }

    pub fn filled_slots(&self) -> &BTreeMap<String, bool> {
        self.is_filled
    }

    /// Payload of the nearest enclosing provide scope for `key`
    pub fn inject(&self, key: &str) -> Result<Value, ProvideError> {
        self.provides.inject(key, None)
    }

    /// Like [`ComponentInput::inject`], falling back to `default` when nothing is provided
    pub fn inject_or(&self, key: &str, default: Value) -> Value {
        self.provides
            .inject(key, Some(default.clone()))
            .unwrap_or(default)
    }

    /// The caller's environment at the time of the invocation
    pub fn outer(&self) -> &EnvironmentSnapshot {
        self.outer
    }
}

/// A renderable component
///
/// All methods have defaults. Implementors override the ones they need.
pub trait Component: Send + Sync + 'static {
    /// Inline template source
    fn template(&self) -> Option<&str> {
        None
    }

    /// Path of the template file, relative to the configured search dirs
    fn template_file(&self) -> Option<&str> {
        None
    }

    fn js(&self) -> Option<&str> {
        None
    }

    fn js_file(&self) -> Option<&str> {
        None
    }

    fn css(&self) -> Option<&str> {
        None
    }

    fn css_file(&self) -> Option<&str> {
        None
    }

    /// External JS/CSS urls
    fn media(&self) -> Media {
        Media::default()
    }

    /// Variables made available to the component's template
    fn get_template_data(&self, _input: &ComponentInput<'_>) -> Result<Bindings, RenderError> {
        Ok(Bindings::new())
    }

    /// Per-instance variables for the component's JS
    fn get_js_data(&self, _input: &ComponentInput<'_>) -> Result<Bindings, RenderError> {
        Ok(Bindings::new())
    }

    /// Per-instance CSS custom properties, emitted as `--name: value`
    fn get_css_data(&self, _input: &ComponentInput<'_>) -> Result<Bindings, RenderError> {
        Ok(Bindings::new())
    }

    /// Last chance to rewrite the component's finished markup
    fn on_render_after(&self, html: String) -> Result<String, RenderError> {
        Ok(html)
    }
}

pub(crate) struct ClassInner {
    id: ClassId,
    name: String,
    module: String,
    component: Box<dyn Component>,
    template: OnceCell<Arc<CompiledTemplate>>,
    assets: OnceCell<Arc<ClassAssets>>,
}

impl Drop for ClassInner {
    fn drop(&mut self) {
        IdentityRegistry::global().forget(&self.id, self as *const ClassInner);
    }
}

/// Shared handle to a component class
#[derive(Clone)]
pub struct ComponentClass {
    inner: Arc<ClassInner>,
}

impl ComponentClass {
    /// Define a class; `module` and `name` together form its identity
    pub fn new(
        module: impl Into<String>,
        name: impl Into<String>,
        component: impl Component,
    ) -> Self {
        let module = module.into();
        let name = name.into();
        let inner = Arc::new(ClassInner {
            id: ClassId::derive(&module, &name),
            name,
            module,
            component: Box::new(component),
            template: OnceCell::new(),
            assets: OnceCell::new(),
        });
        IdentityRegistry::global().insert(&inner);
        Self { inner }
    }

    pub fn id(&self) -> &ClassId {
        &self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn module(&self) -> &str {
        &self.inner.module
    }

    /// Fully qualified path, `module::Name`
    pub fn path(&self) -> String {
        format!("{}::{}", self.inner.module, self.inner.name)
    }

    pub fn component(&self) -> &dyn Component {
        self.inner.component.as_ref()
    }

    pub fn ptr_eq(&self, other: &ComponentClass) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Reject classes that declare both variants of a template or asset
    pub fn validate(&self) -> Result<(), ConfigError> {
        let c = self.component();
        let pairs = [
            ("template", c.template().is_some(), c.template_file().is_some()),
            ("js", c.js().is_some(), c.js_file().is_some()),
            ("css", c.css().is_some(), c.css_file().is_some()),
        ];
        for (kind, inline, file) in pairs {
            if inline && file {
                return Err(ConfigError::ConflictingDeclaration {
                    component: self.name().to_string(),
                    kind,
                });
            }
        }
        Ok(())
    }

    /// Parsed template, compiled on first use and cached for the class's lifetime
    pub(crate) fn compiled_template(
        &self,
        dirs: &[PathBuf],
    ) -> Result<Arc<CompiledTemplate>, RenderError> {
        self.inner
            .template
            .get_or_try_init(|| -> Result<Arc<CompiledTemplate>, RenderError> {
                let c = self.component();
                let source = self
                    .load_source("template", c.template(), c.template_file(), dirs)?
                    .ok_or_else(|| ConfigError::MissingTemplate {
                        component: self.name().to_string(),
                    })?;
                tracing::debug!(component = %self.name(), "compiling component template");
                CompiledTemplate::compile(self.name(), &source).map(Arc::new)
            })
            .cloned()
    }

    pub(crate) fn assets_cell(&self) -> &OnceCell<Arc<ClassAssets>> {
        &self.inner.assets
    }

    /// Inline content or file content for one kind of source, if declared
    pub(crate) fn load_source(
        &self,
        kind: &'static str,
        inline: Option<&str>,
        file: Option<&str>,
        dirs: &[PathBuf],
    ) -> Result<Option<String>, ConfigError> {
        match (inline, file) {
            (Some(_), Some(_)) => Err(ConfigError::ConflictingDeclaration {
                component: self.name().to_string(),
                kind,
            }),
            (Some(src), None) => Ok(Some(src.to_string())),
            (None, Some(path)) => read_component_file(self.name(), kind, path, dirs).map(Some),
            (None, None) => Ok(None),
        }
    }
}

impl fmt::Debug for ComponentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentClass")
            .field("id", &self.inner.id)
            .field("module", &self.inner.module)
            .finish()
    }
}

/// Find `relative` in the search dirs (or as given, if absolute)
fn read_component_file(
    component: &str,
    kind: &'static str,
    relative: &str,
    dirs: &[PathBuf],
) -> Result<String, ConfigError> {
    let candidate = Path::new(relative);
    let found = if candidate.is_absolute() {
        candidate.is_file().then(|| candidate.to_path_buf())
    } else {
        dirs.iter()
            .map(|dir| dir.join(relative))
            .find(|path| path.is_file())
            .or_else(|| candidate.is_file().then(|| candidate.to_path_buf()))
    };
    let path = found.ok_or_else(|| ConfigError::FileNotFound {
        component: component.to_string(),
        kind,
        path: candidate.to_path_buf(),
    })?;
    std::fs::read_to_string(&path).map_err(|e| ConfigError::FileRead {
        kind,
        path,
        message: e.to_string(),
    })
}
