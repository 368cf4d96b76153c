//! Components defined purely by template, script and style sources

use crate::value::{Bindings, Value};
use crate::RenderError;

use super::{Component, ComponentInput, Media};

/// A component with no code of its own
///
/// Its template sees the invocation's kwargs as variables (plus `args` as a list)
/// on top of any static data set with [`TemplateComponent::with_data`]. Selected
/// kwargs can also be forwarded as per-instance CSS or JS variables.
#[derive(Debug, Clone, Default)]
pub struct TemplateComponent {
    template: Option<String>,
    template_file: Option<String>,
    js: Option<String>,
    js_file: Option<String>,
    css: Option<String>,
    css_file: Option<String>,
    media: Media,
    data: Bindings,
    css_vars: Vec<String>,
    js_vars: Vec<String>,
}

impl TemplateComponent {
    /// Component with an inline template
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: Some(template.into()),
            ..Default::default()
        }
    }

    /// Component whose template is read from a file
    pub fn from_file(path: impl Into<String>) -> Self {
        Self {
            template_file: Some(path.into()),
            ..Default::default()
        }
    }

    pub fn with_js(mut self, js: impl Into<String>) -> Self {
        self.js = Some(js.into());
        self
    }

    pub fn with_js_file(mut self, path: impl Into<String>) -> Self {
        self.js_file = Some(path.into());
        self
    }

    pub fn with_css(mut self, css: impl Into<String>) -> Self {
        self.css = Some(css.into());
        self
    }

    pub fn with_css_file(mut self, path: impl Into<String>) -> Self {
        self.css_file = Some(path.into());
        self
    }

    /// Also declare a template file next to the inline template (a configuration error)
    pub fn with_template_file(mut self, path: impl Into<String>) -> Self {
        self.template_file = Some(path.into());
        self
    }

    pub fn with_media(mut self, media: Media) -> Self {
        self.media = media;
        self
    }

    /// Static template variables, overridden by kwargs of the same name
    pub fn with_data(mut self, data: Bindings) -> Self {
        self.data = data;
        self
    }

    /// Forward these kwargs as CSS custom properties
    pub fn with_css_vars<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.css_vars = names.into_iter().map(Into::into).collect();
        self
    }

    /// Forward these kwargs as JS variables
    pub fn with_js_vars<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.js_vars = names.into_iter().map(Into::into).collect();
        self
    }

    fn pick(names: &[String], input: &ComponentInput<'_>) -> Bindings {
        names
            .iter()
            .filter_map(|name| input.kwarg(name).map(|v| (name.clone(), v.clone())))
            .collect()
    }
}

impl Component for TemplateComponent {
    fn template(&self) -> Option<&str> {
        self.template.as_deref()
    }

    fn template_file(&self) -> Option<&str> {
        self.template_file.as_deref()
    }

    fn js(&self) -> Option<&str> {
        self.js.as_deref()
    }

    fn js_file(&self) -> Option<&str> {
        self.js_file.as_deref()
    }

    fn css(&self) -> Option<&str> {
        self.css.as_deref()
    }

    fn css_file(&self) -> Option<&str> {
        self.css_file.as_deref()
    }

    fn media(&self) -> Media {
        self.media.clone()
    }

    fn get_template_data(&self, input: &ComponentInput<'_>) -> Result<Bindings, RenderError> {
        let mut data = self.data.clone();
        for (name, value) in input.kwargs() {
            data.insert(name.clone(), value.clone());
        }
        if !input.args().is_empty() {
            data.insert("args".to_string(), Value::List(input.args().to_vec()));
        }
        Ok(data)
    }

    fn get_js_data(&self, input: &ComponentInput<'_>) -> Result<Bindings, RenderError> {
        Ok(Self::pick(&self.js_vars, input))
    }

    fn get_css_data(&self, input: &ComponentInput<'_>) -> Result<Bindings, RenderError> {
        Ok(Self::pick(&self.css_vars, input))
    }
}
