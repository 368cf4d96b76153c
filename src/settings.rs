//! Engine configuration loaded from TOML
//!
//! ```toml
//! context_behavior = "isolated"
//! dependency_strategy = "fragment"
//! static_url = "/static/"
//! dirs = ["components"]
//! ```
//!
//! Keys missing from a settings file take their value from [`DEFAULT_SETTINGS`].

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::dependencies::DependencyStrategy;
use crate::environment::ContextBehavior;
use crate::render::DEFAULT_RENDER_ID_WIDTH;

/// Errors that can occur when loading or parsing settings
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to read settings file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse settings TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Defaults every settings file is layered over
pub const DEFAULT_SETTINGS: &str = r#"
# How much of the caller's environment a component sees: inherited | isolated
context_behavior = "inherited"

# document | simple | fragment | prepend | append | ignore
dependency_strategy = "document"

# Random characters after the "c" prefix of a render id
render_id_width = 6

# Prefix for relative JS/CSS urls
static_url = ""

# Directories searched for template_file / js_file / css_file
dirs = []
"#;

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub context_behavior: ContextBehavior,
    pub dependency_strategy: DependencyStrategy,
    pub render_id_width: usize,
    pub static_url: String,
    pub dirs: Vec<PathBuf>,
}

/// TOML structure for deserializing settings
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlSettings {
    context_behavior: Option<ContextBehavior>,
    dependency_strategy: Option<DependencyStrategy>,
    render_id_width: Option<usize>,
    static_url: Option<String>,
    dirs: Option<Vec<PathBuf>>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            context_behavior: ContextBehavior::Inherited,
            dependency_strategy: DependencyStrategy::Document,
            render_id_width: DEFAULT_RENDER_ID_WIDTH,
            static_url: String::new(),
            dirs: Vec::new(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load settings from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, SettingsError> {
        let defaults: TomlSettings = toml::from_str(DEFAULT_SETTINGS)?;
        let parsed: TomlSettings = toml::from_str(content)?;
        let base = Settings::default();

        Ok(Settings {
            context_behavior: parsed
                .context_behavior
                .or(defaults.context_behavior)
                .unwrap_or(base.context_behavior),
            dependency_strategy: parsed
                .dependency_strategy
                .or(defaults.dependency_strategy)
                .unwrap_or(base.dependency_strategy),
            render_id_width: parsed
                .render_id_width
                .or(defaults.render_id_width)
                .unwrap_or(base.render_id_width)
                .max(1),
            static_url: parsed
                .static_url
                .or(defaults.static_url)
                .unwrap_or(base.static_url),
            dirs: parsed.dirs.or(defaults.dirs).unwrap_or(base.dirs),
        })
    }

    pub fn with_context_behavior(mut self, behavior: ContextBehavior) -> Self {
        self.context_behavior = behavior;
        self
    }

    pub fn with_dependency_strategy(mut self, strategy: DependencyStrategy) -> Self {
        self.dependency_strategy = strategy;
        self
    }

    /// Set the render id width (at least 1)
    pub fn with_render_id_width(mut self, width: usize) -> Self {
        self.render_id_width = width.max(1);
        self
    }

    pub fn with_static_url(mut self, url: impl Into<String>) -> Self {
        self.static_url = url.into();
        self
    }

    /// Add a directory to the asset/template search path
    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dirs.push(dir.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_embedded_defaults_match_default() {
        assert_eq!(Settings::from_str("").unwrap(), Settings::default());
    }

    #[test]
    fn test_partial_file_overrides() {
        let settings = Settings::from_str(
            r#"
context_behavior = "isolated"
dependency_strategy = "fragment"
dirs = ["components", "shared"]
"#,
        )
        .unwrap();
        assert_eq!(settings.context_behavior, ContextBehavior::Isolated);
        assert_eq!(settings.dependency_strategy, DependencyStrategy::Fragment);
        assert_eq!(settings.render_id_width, DEFAULT_RENDER_ID_WIDTH);
        assert_eq!(
            settings.dirs,
            vec![PathBuf::from("components"), PathBuf::from("shared")]
        );
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            Settings::from_str(r#"dependency_strategy = "inline""#),
            Err(SettingsError::Parse(_))
        ));
        assert!(matches!(
            Settings::from_str("unknown_key = 1"),
            Err(SettingsError::Parse(_))
        ));
    }

    #[test]
    fn test_builders() {
        let settings = Settings::default()
            .with_context_behavior(ContextBehavior::Isolated)
            .with_render_id_width(0)
            .with_static_url("/static/")
            .with_dir("a");
        assert_eq!(settings.render_id_width, 1);
        assert_eq!(settings.static_url, "/static/");
        assert_eq!(settings.dirs, vec![PathBuf::from("a")]);
    }

    #[test]
    fn test_from_file() {
        let dir = std::env::temp_dir().join(format!("cw-settings-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("settings.toml");
        std::fs::write(&path, "render_id_width = 8\n").unwrap();
        let settings = Settings::from_file(&path).unwrap();
        assert_eq!(settings.render_id_width, 8);
        std::fs::remove_dir_all(&dir).unwrap();

        assert!(matches!(
            Settings::from_file(&dir.join("missing.toml")),
            Err(SettingsError::Io(_))
        ));
    }
}
