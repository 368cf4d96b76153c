//! Scoped variable environments and their immutable snapshots
//!
//! An [`Environment`] is a stack of binding frames on top of a set of global
//! bindings. Templates push a frame when they enter a scope (a component's data,
//! a loop iteration) and pop it on the way out.
//!
//! Rendering is deferred: a component's template runs some time after the tag
//! that invoked it was evaluated, by which point the caller's frames may have been
//! popped. An [`EnvironmentSnapshot`] flattens the visible bindings at invocation
//! time into an immutable, cheaply clonable value the deferred renderer can
//! resume from.

use std::str::FromStr;
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

use crate::value::{Bindings, Value};

/// How much of the caller's environment a component template can see
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextBehavior {
    /// Child templates see every binding visible at the call site
    #[default]
    Inherited,
    /// Child templates see only globals and their own data
    Isolated,
}

#[derive(Debug, Error)]
#[error("unknown context behavior '{0}' (expected 'inherited' or 'isolated')")]
pub struct UnknownContextBehavior(String);

impl FromStr for ContextBehavior {
    type Err = UnknownContextBehavior;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inherited" => Ok(ContextBehavior::Inherited),
            "isolated" => Ok(ContextBehavior::Isolated),
            other => Err(UnknownContextBehavior(other.to_string())),
        }
    }
}

/// A live, scoped variable environment
#[derive(Debug, Clone, Default)]
pub struct Environment {
    globals: Arc<Bindings>,
    frames: Vec<Bindings>,
}

impl Environment {
    /// Create an empty environment
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an environment whose bottom frame holds `bindings`
    pub fn with_bindings(bindings: Bindings) -> Self {
        Self {
            globals: Arc::default(),
            frames: vec![bindings],
        }
    }

    /// Set a global binding
    ///
    /// Globals survive isolation, so they are the place for things like feature
    /// flags that every component should see.
    pub fn set_global(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        Arc::make_mut(&mut self.globals).insert(name.into(), value.into());
    }

    /// Builder form of [`Environment::set_global`]
    pub fn with_global(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_global(name, value);
        self
    }

    /// Set a binding in the innermost frame, creating one if needed
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        if self.frames.is_empty() {
            self.frames.push(Bindings::new());
        }
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name.into(), value.into());
        }
    }

    /// Push a new frame
    pub fn push(&mut self, bindings: Bindings) {
        self.frames.push(bindings);
    }

    /// Pop the innermost frame
    pub fn pop(&mut self) -> Option<Bindings> {
        self.frames.pop()
    }

    /// Number of frames currently pushed
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Look up a name, innermost frame first, then globals
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.get(name))
            .or_else(|| self.globals.get(name))
    }

    /// Look up a dotted path such as `user.name`
    pub fn lookup<S: AsRef<str>>(&self, path: &[S]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        self.get(first.as_ref()).and_then(|v| v.get_path(rest))
    }

    /// Freeze the visible bindings into an immutable snapshot
    pub fn snapshot(&self) -> EnvironmentSnapshot {
        let mut locals = Bindings::new();
        for frame in &self.frames {
            for (k, v) in frame {
                locals.insert(k.clone(), v.clone());
            }
        }
        EnvironmentSnapshot {
            globals: Arc::clone(&self.globals),
            locals: Arc::new(locals),
        }
    }

    /// Copy that keeps only the global bindings
    pub fn isolated_copy(&self) -> Environment {
        Environment {
            globals: Arc::clone(&self.globals),
            frames: Vec::new(),
        }
    }

    /// Resume a live environment from a snapshot
    pub fn from_snapshot(snapshot: &EnvironmentSnapshot) -> Environment {
        Environment {
            globals: Arc::clone(&snapshot.globals),
            frames: vec![(*snapshot.locals).clone()],
        }
    }
}

/// Immutable, flattened copy of an environment
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvironmentSnapshot {
    globals: Arc<Bindings>,
    locals: Arc<Bindings>,
}

impl EnvironmentSnapshot {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.locals.get(name).or_else(|| self.globals.get(name))
    }

    pub fn globals(&self) -> &Bindings {
        &self.globals
    }

    pub fn locals(&self) -> &Bindings {
        &self.locals
    }

    /// Environment for a child component under the given scoping mode
    pub fn scoped(&self, behavior: ContextBehavior) -> Environment {
        let env = Environment::from_snapshot(self);
        match behavior {
            ContextBehavior::Inherited => env,
            ContextBehavior::Isolated => env.isolated_copy(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::bindings;

    #[test]
    fn test_push_pop_shadowing() {
        let mut env = Environment::with_bindings(bindings([("x", 1)]));
        env.push(bindings([("x", 2)]));
        assert_eq!(env.get("x"), Some(&Value::from(2)));
        env.pop();
        assert_eq!(env.get("x"), Some(&Value::from(1)));
    }

    #[test]
    fn test_snapshot_survives_pop() {
        let mut env = Environment::new();
        env.push(bindings([("item", "first")]));
        let snap = env.snapshot();
        env.pop();
        env.push(bindings([("item", "second")]));

        let resumed = Environment::from_snapshot(&snap);
        assert_eq!(resumed.get("item"), Some(&Value::from("first")));
    }

    #[test]
    fn test_isolated_copy_keeps_globals_only() {
        let env = Environment::with_bindings(bindings([("secret", "caller")]))
            .with_global("feature_x", true);
        let isolated = env.isolated_copy();
        assert_eq!(isolated.get("secret"), None);
        assert_eq!(isolated.get("feature_x"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_locals_shadow_globals() {
        let mut env = Environment::new().with_global("theme", "light");
        env.insert("theme", "dark");
        assert_eq!(env.snapshot().get("theme"), Some(&Value::from("dark")));
    }

    #[test]
    fn test_context_behavior_from_str() {
        assert_eq!(
            "isolated".parse::<ContextBehavior>().unwrap(),
            ContextBehavior::Isolated
        );
        assert!("django".parse::<ContextBehavior>().is_err());
    }
}
