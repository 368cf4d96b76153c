//! Name registry mapping template tag names to component classes

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::{ComponentClass, TemplateComponent};

/// Errors that can occur during registry operations
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Component not found in registry
    #[error("component not found: {name}")]
    NotFound { name: String },

    /// Duplicate component registration
    #[error("duplicate component registration: {name}")]
    Duplicate { name: String },

    /// Error reading a component directory
    #[error("error reading component directory {path}: {message}")]
    FileRead { path: PathBuf, message: String },
}

/// Registry of components by the name templates use to invoke them
#[derive(Debug, Default, Clone)]
pub struct ComponentRegistry {
    components: HashMap<String, ComponentClass>,
}

impl ComponentRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a class under `name`
    pub fn register(
        &mut self,
        name: impl Into<String>,
        class: ComponentClass,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        if self.components.contains_key(&name) {
            return Err(RegistryError::Duplicate { name });
        }
        tracing::debug!(component = %name, class_id = %class.id(), "registered component");
        self.components.insert(name, class);
        Ok(())
    }

    /// Remove a registration, returning the class
    pub fn unregister(&mut self, name: &str) -> Option<ComponentClass> {
        self.components.remove(name)
    }

    /// Get a component by name
    pub fn get(&self, name: &str) -> Result<&ComponentClass, RegistryError> {
        self.components
            .get(name)
            .ok_or_else(|| RegistryError::NotFound {
                name: name.to_string(),
            })
    }

    /// Check if a component is registered
    pub fn contains(&self, name: &str) -> bool {
        self.components.contains_key(name)
    }

    /// All registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.components.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Register every `NAME.html` in `dir` as a template-only component
    ///
    /// `NAME.css` and `NAME.js` next to the template are attached to it. Returns
    /// the number of components registered.
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize, RegistryError> {
        let read_err = |e: std::io::Error| RegistryError::FileRead {
            path: dir.to_path_buf(),
            message: e.to_string(),
        };

        let mut templates: Vec<PathBuf> = std::fs::read_dir(dir)
            .map_err(read_err)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "html"))
            .collect();
        templates.sort();

        let module = format!("dir:{}", dir.display());
        let mut count = 0;
        for path in templates {
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let mut component = TemplateComponent::from_file(path.to_string_lossy());
            let css = path.with_extension("css");
            if css.is_file() {
                component = component.with_css_file(css.to_string_lossy());
            }
            let js = path.with_extension("js");
            if js.is_file() {
                component = component.with_js_file(js.to_string_lossy());
            }
            self.register(name, ComponentClass::new(module.clone(), name, component))?;
            count += 1;
        }
        Ok(count)
    }
}
