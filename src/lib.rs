//! Component Weave - nestable template components with deferred rendering
//!
//! This library renders trees of reusable template components. Nested components
//! are expanded through an explicit work stack rather than native recursion, so
//! nesting depth is bounded by memory. While rendering, each component's JS and
//! CSS is collected once per document and placed according to a
//! [`DependencyStrategy`].
//!
//! # Example
//!
//! ```rust
//! use component_weave::{ComponentClass, DependencyStrategy, Engine, RenderRequest, Settings};
//! use component_weave::component::TemplateComponent;
//!
//! let mut engine = Engine::new(Settings::default());
//! engine
//!     .register(
//!         "card",
//!         ComponentClass::new(
//!             "docs",
//!             "Card",
//!             TemplateComponent::new(r#"<div class="card">{% slot "body" default %}empty{% endslot %}</div>"#),
//!         ),
//!     )
//!     .unwrap();
//!
//! let html = engine
//!     .render(
//!         "card",
//!         RenderRequest::new()
//!             .with_fill("default", "Hello")
//!             .with_strategy(DependencyStrategy::Simple),
//!     )
//!     .unwrap();
//! assert!(html.contains(">Hello</div>"));
//! ```

pub mod component;
pub mod dependencies;
pub mod engine;
pub mod environment;
pub mod error;
pub mod parser;
pub mod render;
pub mod settings;
pub mod value;

pub use component::{
    ClassId, Component, ComponentClass, ComponentInput, ComponentRegistry, ConfigError,
    IdentityError, Media, RegistryError,
};
pub use dependencies::{DependencyError, DependencyStrategy};
pub use engine::{Engine, RenderRequest};
pub use environment::{ContextBehavior, Environment, EnvironmentSnapshot};
pub use error::ParseError;
pub use parser::{parse, Document};
pub use render::{
    Invocation, ProvideError, RenderId, RenderScheduler, Slot, SlotContext, SlotError,
};
pub use settings::{Settings, SettingsError};
pub use value::{bindings, Bindings, Value};

use thiserror::Error;

/// Errors that can occur during the render pipeline
#[derive(Debug, Error)]
pub enum RenderError {
    /// Error parsing a template
    #[error("parse errors in template '{template}': {}", format_parse_errors(.errors))]
    Parse {
        template: String,
        source_text: String,
        errors: Vec<ParseError>,
    },

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Registry(#[from] RegistryError),

    #[error("{0}")]
    Identity(#[from] IdentityError),

    #[error("slot error: {0}")]
    Slot(#[from] SlotError),

    #[error("provide error: {0}")]
    Provide(#[from] ProvideError),

    #[error("dependency error: {0}")]
    Dependency(#[from] DependencyError),

    /// Raised by a component's own hooks
    #[error("{message}")]
    Component { message: String },

    /// An error inside a component tree, with the path to the failing component
    #[error("error while rendering {path}: {source}")]
    InComponent {
        path: String,
        #[source]
        source: Box<RenderError>,
    },
}

impl RenderError {
    /// Error for use in component hooks
    pub fn custom(message: impl Into<String>) -> Self {
        RenderError::Component {
            message: message.into(),
        }
    }

    /// `Outer > Inner` path of the failing component, if known
    pub fn component_path(&self) -> Option<&str> {
        match self {
            RenderError::InComponent { path, .. } => Some(path),
            _ => None,
        }
    }

    /// The error underneath any component path annotation
    pub fn root_cause(&self) -> &RenderError {
        match self {
            RenderError::InComponent { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Format parse errors with source context; other errors use `Display`
    pub fn report(&self) -> String {
        match self.root_cause() {
            RenderError::Parse {
                template,
                source_text,
                errors,
            } => errors
                .iter()
                .map(|e| e.format(source_text, template))
                .collect::<Vec<_>>()
                .join("\n"),
            _ => self.to_string(),
        }
    }
}

fn format_parse_errors(errors: &[ParseError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
