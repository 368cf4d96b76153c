//! Per-class static assets and the process-wide per-instance variable cache

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};

use crate::component::{ClassId, Media};

use super::record::DependencyError;

static INSTANCE_VARS: Lazy<InstanceVarsCache> = Lazy::new(InstanceVarsCache::default);

/// Hex characters kept from a content hash (64 bits)
pub const CONTENT_HASH_LEN: usize = 16;

/// Short hash identifying a piece of content
pub fn content_hash(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    let mut hash = hex::encode(digest);
    hash.truncate(CONTENT_HASH_LEN);
    hash
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Js,
    Css,
}

impl AssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Js => "js",
            AssetKind::Css => "css",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static JS/CSS of a class, loaded and hashed once
#[derive(Debug, Clone, Default)]
pub struct ClassAssets {
    pub js: Option<String>,
    pub js_hash: Option<String>,
    pub css: Option<String>,
    pub css_hash: Option<String>,
    pub media: Media,
}

impl ClassAssets {
    pub fn has_js(&self) -> bool {
        self.js.is_some() || !self.media.js.is_empty()
    }
}

type CacheKey = (ClassId, AssetKind, String);

/// Content generated from per-instance variables, keyed by class, kind and data hash
///
/// Entries are immutable once inserted. Identical data always produces identical
/// content, so a second insert under the same key must carry the same content;
/// anything else is a hash collision and is reported rather than served stale.
#[derive(Debug, Default)]
pub struct InstanceVarsCache {
    entries: RwLock<HashMap<CacheKey, Arc<str>>>,
}

impl InstanceVarsCache {
    pub fn global() -> &'static InstanceVarsCache {
        &INSTANCE_VARS
    }

    pub fn get(&self, class_id: &ClassId, kind: AssetKind, hash: &str) -> Option<Arc<str>> {
        self.entries
            .read()
            .get(&(class_id.clone(), kind, hash.to_string()))
            .cloned()
    }

    /// Insert unless present; returns whether this call inserted
    ///
    /// A key that is already taken by different content is a
    /// [`DependencyError::HashCollision`].
    pub fn insert_if_absent(
        &self,
        class_id: &ClassId,
        kind: AssetKind,
        hash: &str,
        content: String,
    ) -> Result<bool, DependencyError> {
        let key = (class_id.clone(), kind, hash.to_string());
        if let Some(existing) = self.entries.read().get(&key) {
            return same_content(existing, &content, &key).map(|()| false);
        }
        match self.entries.write().entry(key) {
            Entry::Occupied(entry) => same_content(entry.get(), &content, entry.key()).map(|()| false),
            Entry::Vacant(entry) => {
                entry.insert(Arc::from(content));
                Ok(true)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

fn same_content(existing: &str, content: &str, key: &CacheKey) -> Result<(), DependencyError> {
    if existing == content {
        return Ok(());
    }
    let (class_id, kind, hash) = key;
    Err(DependencyError::HashCollision {
        class_id: class_id.to_string(),
        kind: kind.as_str(),
        hash: hash.clone(),
    })
}

/// Reset the process-wide instance variable cache
pub fn clear() {
    InstanceVarsCache::global().clear();
}
