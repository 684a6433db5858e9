use crate::types::{ObjectTypeMeta, TypeHandle, TypeResolver, OBJECT_TYPE_NAME};
use crate::{CodecError, Result};
use std::collections::HashMap;
use std::sync::Mutex;

/// Shared name-to-type registry.
///
/// Decoders register type definitions they discover mid-stream, and several
/// decode operations may share one loader, so all mutation goes through a
/// coarse mutex. A frozen loader rejects further bindings; that is a
/// programming-contract violation, not a recoverable condition.
#[derive(Debug)]
pub struct Loader {
    inner: Mutex<Inner>,
}

#[derive(Debug)]
struct Inner {
    bound: HashMap<String, TypeHandle>,
    frozen: bool,
}

impl Loader {
    /// A new loader with the reserved meta-type pre-bound.
    pub fn new() -> Self {
        let mut bound = HashMap::new();
        bound.insert(OBJECT_TYPE_NAME.to_owned(), ObjectTypeMeta::handle());
        Self {
            inner: Mutex::new(Inner {
                bound,
                frozen: false,
            }),
        }
    }

    /// Binds `dtype` under `name` unless a binding already exists. Returns
    /// whether a new binding was made.
    pub fn bind_if_absent(&self, name: &str, dtype: TypeHandle) -> Result<bool> {
        let mut inner = self.inner.lock().expect("loader mutex poisoned");
        if inner.bound.contains_key(name) {
            return Ok(false);
        }
        if inner.frozen {
            return Err(CodecError::Contract("bind on a frozen loader"));
        }
        log::debug!("loader: binding type '{name}'");
        inner.bound.insert(name.to_owned(), dtype);
        Ok(true)
    }

    pub fn lookup(&self, name: &str) -> Option<TypeHandle> {
        let inner = self.inner.lock().expect("loader mutex poisoned");
        inner.bound.get(name).cloned()
    }

    /// Makes the loader immutable. Lookup keeps working.
    pub fn freeze(&self) {
        let mut inner = self.inner.lock().expect("loader mutex poisoned");
        inner.frozen = true;
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeResolver for Loader {
    fn resolve(&self, name: &str) -> Option<TypeHandle> {
        self.lookup(name)
    }
}
