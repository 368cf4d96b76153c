//! JS/CSS dependency collection
//!
//! Rendering leaves a `_RENDERED` marker in front of each component's markup.
//! [`DependencyAggregator::finalize`] reads those markers back in document order,
//! gathers each component's external media, static inline JS/CSS and per-instance
//! variables, removes duplicates, and inserts the result according to a
//! [`DependencyStrategy`].

mod aggregator;
pub mod cache;
pub mod markers;
mod record;
mod strategy;

pub use aggregator::{Collected, DependencyAggregator, BOOTSTRAP_ATTR, LOADER_ATTR, LOADER_JS};
pub use cache::{content_hash, AssetKind, ClassAssets, InstanceVarsCache};
pub use record::{DedupKey, DependencyError, DependencyKind, DependencyRecord};
pub use strategy::{DependencyStrategy, UnknownStrategy};

/// Maps a component's relative asset path to a servable url
pub trait AssetResolver: Send + Sync {
    fn resolve(&self, path: &str) -> String;
}

/// Prefixes relative paths with a static url; absolute urls pass through
#[derive(Debug, Clone, Default)]
pub struct StaticUrlResolver {
    prefix: String,
}

impl StaticUrlResolver {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl AssetResolver for StaticUrlResolver {
    fn resolve(&self, path: &str) -> String {
        let passthrough = path.starts_with('/') || path.starts_with("data:") || path.contains("://");
        if passthrough || self.prefix.is_empty() {
            return path.to_string();
        }
        format!("{}/{}", self.prefix.trim_end_matches('/'), path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_url_resolver() {
        let resolver = StaticUrlResolver::new("/static/");
        assert_eq!(resolver.resolve("app.js"), "/static/app.js");
        assert_eq!(resolver.resolve("/root.js"), "/root.js");
        assert_eq!(
            resolver.resolve("https://cdn.example.com/x.js"),
            "https://cdn.example.com/x.js"
        );
        assert_eq!(StaticUrlResolver::default().resolve("a.css"), "a.css");
    }
}
