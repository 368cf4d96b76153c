//! Where collected JS/CSS ends up in the rendered output

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyStrategy {
    /// Placeholders (or `<head>`/`<body>`), plus the client-side loader
    #[default]
    Document,
    /// Same placement as `Document`, without the loader
    Simple,
    /// Nothing inserted; a manifest is appended for a page-level loader
    Fragment,
    /// Everything before the rendered markup
    Prepend,
    /// Everything after the rendered markup
    Append,
    /// Leave markers in place for a later finalize pass
    Ignore,
}

impl DependencyStrategy {
    pub const ALL: [DependencyStrategy; 6] = [
        DependencyStrategy::Document,
        DependencyStrategy::Simple,
        DependencyStrategy::Fragment,
        DependencyStrategy::Prepend,
        DependencyStrategy::Append,
        DependencyStrategy::Ignore,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyStrategy::Document => "document",
            DependencyStrategy::Simple => "simple",
            DependencyStrategy::Fragment => "fragment",
            DependencyStrategy::Prepend => "prepend",
            DependencyStrategy::Append => "append",
            DependencyStrategy::Ignore => "ignore",
        }
    }
}

impl fmt::Display for DependencyStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown dependency strategy '{0}' (expected one of document, simple, fragment, prepend, append, ignore)")]
pub struct UnknownStrategy(String);

impl FromStr for DependencyStrategy {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DependencyStrategy::ALL
            .into_iter()
            .find(|strategy| strategy.as_str() == s)
            .ok_or_else(|| UnknownStrategy(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str_round_trips_names() {
        for strategy in DependencyStrategy::ALL {
            assert_eq!(strategy.as_str().parse::<DependencyStrategy>().unwrap(), strategy);
        }
        assert!("inline".parse::<DependencyStrategy>().is_err());
    }
}
