//! Process-wide identity registry for component classes
//!
//! Every [`ComponentClass`] gets a short, stable id derived from its fully
//! qualified path, e.g. `Card_1f3a9c`. The registry maps ids back to live classes
//! so that a later finalize pass can find a class from the id embedded in a
//! `_RENDERED` marker.
//!
//! Entries are weak. A class handle's finalizer removes its own entry once the
//! last handle is dropped, so classes defined on the fly (in tests, say) do not
//! pile up over the life of the process.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::{ClassInner, ComponentClass};

static IDENTITIES: Lazy<IdentityRegistry> = Lazy::new(IdentityRegistry::default);

/// Number of hex characters of the path hash kept in a class id
const CLASS_HASH_LEN: usize = 6;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("unknown component class id '{0}'")]
    UnknownClass(String),
}

/// Short identifier of a component class
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(String);

impl ClassId {
    /// Derive the id for a class from its module path and short name
    pub fn derive(module: &str, name: &str) -> Self {
        let digest = Sha256::digest(format!("{}::{}", module, name).as_bytes());
        let hash = hex::encode(digest);
        ClassId(format!("{}_{}", name, &hash[..CLASS_HASH_LEN]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Weak map from class id to class
#[derive(Default)]
pub struct IdentityRegistry {
    entries: RwLock<HashMap<ClassId, Weak<ClassInner>>>,
}

impl IdentityRegistry {
    /// The process-wide registry
    pub fn global() -> &'static IdentityRegistry {
        &IDENTITIES
    }

    pub(crate) fn insert(&self, class: &Arc<ClassInner>) {
        let previous = self
            .entries
            .write()
            .insert(class.id.clone(), Arc::downgrade(class));
        if previous.is_some_and(|w| w.strong_count() > 0) {
            tracing::debug!(class_id = %class.id, "class id redefined, latest definition wins");
        }
    }

    /// Find a live class by id
    pub fn lookup(&self, id: &str) -> Result<ComponentClass, IdentityError> {
        let inner = {
            let entries = self.entries.read();
            entries
                .get(&ClassId(id.to_string()))
                .and_then(Weak::upgrade)
        };
        inner
            .map(|inner| ComponentClass { inner })
            .ok_or_else(|| IdentityError::UnknownClass(id.to_string()))
    }

    /// Forget `id`, but only if the entry still belongs to the class at `ptr`
    pub(crate) fn forget(&self, id: &ClassId, ptr: *const ClassInner) {
        let mut entries = self.entries.write();
        if entries.get(id).is_some_and(|w| Weak::as_ptr(w) == ptr) {
            entries.remove(id);
        }
    }

    /// Number of live classes
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .values()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lookup(id).is_ok()
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

/// Id of a class, as registered
pub fn id_for(class: &ComponentClass) -> &ClassId {
    class.id()
}

/// Look up a live class in the process-wide registry
pub fn lookup(id: &str) -> Result<ComponentClass, IdentityError> {
    IdentityRegistry::global().lookup(id)
}

/// Reset the process-wide registry
pub fn clear() {
    IdentityRegistry::global().clear();
}
