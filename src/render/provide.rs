//! Provide/inject: scoped key-value broadcasting to descendant components
//!
//! Each key has its own stack of entries; the top of the stack is what `inject`
//! returns, so nested provides with the same key shadow the outer ones. Scopes
//! are closed in LIFO order.
//!
//! Because component bodies render after their caller's provide scope has been
//! closed, every deferred render remembers a [`ProvideSnapshot`] taken when it
//! was queued and re-enters it around its own template.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use thiserror::Error;

use crate::value::Value;

#[derive(Debug, Error, PartialEq)]
pub enum ProvideError {
    #[error("invalid provide key '{0}': keys must be non-empty identifiers")]
    InvalidKey(String),

    #[error("no provider found for key '{key}'")]
    NotProvided { key: String },

    #[error("provide scope {0} closed out of order")]
    ScopeMismatch(u64),
}

/// Handle for one entered scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(u64);

impl ScopeId {
    pub fn get(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProvideEntry {
    pub key: String,
    pub payload: Value,
    pub scope_id: ScopeId,
}

/// The nearest entry for every key, frozen at one point in the render
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProvideSnapshot(Arc<BTreeMap<String, ProvideEntry>>);

impl ProvideSnapshot {
    pub fn get(&self, key: &str) -> Option<&ProvideEntry> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct ProvideRegistry {
    stacks: HashMap<String, Vec<ProvideEntry>>,
    open: Vec<(ScopeId, Vec<String>)>,
    next_scope: u64,
}

impl ProvideRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a scope providing `payload` under `key`
    pub fn enter(&mut self, key: &str, payload: Value) -> Result<ScopeId, ProvideError> {
        if !is_identifier(key) {
            return Err(ProvideError::InvalidKey(key.to_string()));
        }
        let scope_id = self.allocate();
        self.push_entry(ProvideEntry {
            key: key.to_string(),
            payload,
            scope_id,
        });
        self.open.push((scope_id, vec![key.to_string()]));
        tracing::trace!(key, scope = scope_id.0, "provide scope entered");
        Ok(scope_id)
    }

    /// Close a scope; it must be the innermost open one
    pub fn exit(&mut self, scope: ScopeId) -> Result<(), ProvideError> {
        match self.open.last() {
            Some((top, _)) if *top == scope => {}
            _ => return Err(ProvideError::ScopeMismatch(scope.0)),
        }
        if let Some((_, keys)) = self.open.pop() {
            for key in keys {
                if let Some(stack) = self.stacks.get_mut(&key) {
                    stack.pop();
                    if stack.is_empty() {
                        self.stacks.remove(&key);
                    }
                }
            }
        }
        Ok(())
    }

    /// Payload of the nearest enclosing scope for `key`
    ///
    /// With no such scope, `default` is returned if given; otherwise this is a
    /// lookup error.
    pub fn inject(&self, key: &str, default: Option<Value>) -> Result<Value, ProvideError> {
        match self.stacks.get(key).and_then(|stack| stack.last()) {
            Some(entry) => Ok(entry.payload.clone()),
            None => default.ok_or_else(|| ProvideError::NotProvided {
                key: key.to_string(),
            }),
        }
    }

    pub fn snapshot(&self) -> ProvideSnapshot {
        let nearest = self
            .stacks
            .iter()
            .filter_map(|(key, stack)| stack.last().map(|e| (key.clone(), e.clone())))
            .collect();
        ProvideSnapshot(Arc::new(nearest))
    }

    /// Open one scope that re-provides every entry of `snapshot`
    pub fn restore(&mut self, snapshot: &ProvideSnapshot) -> ScopeId {
        let scope_id = self.allocate();
        let mut keys = Vec::with_capacity(snapshot.0.len());
        for entry in snapshot.0.values() {
            keys.push(entry.key.clone());
            self.push_entry(entry.clone());
        }
        self.open.push((scope_id, keys));
        scope_id
    }

    /// Number of scopes currently open
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty() && self.stacks.is_empty()
    }

    fn allocate(&mut self) -> ScopeId {
        self.next_scope += 1;
        ScopeId(self.next_scope)
    }

    fn push_entry(&mut self, entry: ProvideEntry) {
        self.stacks.entry(entry.key.clone()).or_default().push(entry);
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
