// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The live attribute view handed to every component instance.

use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::rc::{Rc, Weak};
use tessera_core::{AttributeError, AttributeMap, AttributeStore, AttributeValue, EntityId, Host};

type Watcher = Rc<dyn Fn(&str)>;

struct AttributesInner {
    tag: String,
    entity: EntityId,
    host: Weak<dyn Host>,
    mirror: RefCell<AttributeMap>,
    watched: RefCell<BTreeSet<String>>,
    watcher: RefCell<Option<Watcher>>,
    attached: Cell<bool>,
}

/// A mirrored, write-through view of one entity's attributes.
///
/// Reads come from a local mirror that the engine keeps in sync with the
/// host's attribute store. Writes update the mirror and are forwarded to the
/// store. Once the owning component is torn down every access fails with
/// [`AttributeError::Detached`].
///
/// Cloning is cheap; clones share the same view.
#[derive(Clone)]
pub struct Attributes {
    inner: Rc<AttributesInner>,
}

impl Attributes {
    pub(crate) fn new(
        tag: &str,
        entity: EntityId,
        host: Weak<dyn Host>,
        snapshot: AttributeMap,
    ) -> Self {
        let watched = snapshot.keys().cloned().collect();
        Self {
            inner: Rc::new(AttributesInner {
                tag: tag.to_string(),
                entity,
                host,
                mirror: RefCell::new(snapshot),
                watched: RefCell::new(watched),
                watcher: RefCell::new(None),
                attached: Cell::new(true),
            }),
        }
    }

    fn ensure_attached(&self) -> Result<(), AttributeError> {
        if self.inner.attached.get() {
            Ok(())
        } else {
            Err(AttributeError::Detached {
                tag: self.inner.tag.clone(),
                entity: self.inner.entity,
            })
        }
    }

    /// Reads an attribute from the mirror.
    pub fn get(&self, key: &str) -> Result<Option<AttributeValue>, AttributeError> {
        self.ensure_attached()?;
        Ok(self.inner.mirror.borrow().get(key).cloned())
    }

    /// Reads a numeric attribute, treating anything else as absent.
    pub fn number(&self, key: &str) -> Result<Option<f64>, AttributeError> {
        Ok(self.get(key)?.and_then(|value| value.as_number()))
    }

    /// Writes an attribute to the mirror and through to the attribute store.
    ///
    /// A key that was not present when the component attached starts being
    /// mirrored from this point on.
    pub fn set(&self, key: &str, value: impl Into<AttributeValue>) -> Result<(), AttributeError> {
        self.ensure_attached()?;
        let value = value.into();

        if self.start_watching(key) {
            let watcher = self.inner.watcher.borrow().clone();
            if let Some(watch) = watcher {
                watch(key);
            }
        }

        self.inner
            .mirror
            .borrow_mut()
            .insert(key.to_string(), value.clone());
        if let Some(host) = self.inner.host.upgrade() {
            host.set_attribute(self.inner.entity, key, value);
        }
        Ok(())
    }

    /// A copy of every mirrored attribute.
    pub fn snapshot(&self) -> Result<AttributeMap, AttributeError> {
        self.ensure_attached()?;
        Ok(self.inner.mirror.borrow().clone())
    }

    /// Returns `true` until the owning component is torn down.
    pub fn is_attached(&self) -> bool {
        self.inner.attached.get()
    }

    /// The entity this view reflects.
    pub fn entity(&self) -> EntityId {
        self.inner.entity
    }

    /// Keys currently mirrored from the store.
    pub(crate) fn watched_keys(&self) -> Vec<String> {
        self.inner.watched.borrow().iter().cloned().collect()
    }

    /// Adds `key` to the mirrored set. Returns `false` if it was already there.
    pub(crate) fn start_watching(&self, key: &str) -> bool {
        self.inner.watched.borrow_mut().insert(key.to_string())
    }

    pub(crate) fn set_watcher(&self, watcher: impl Fn(&str) + 'static) {
        *self.inner.watcher.borrow_mut() = Some(Rc::new(watcher));
    }

    /// Applies a change observed on the attribute store.
    pub(crate) fn mirror(&self, key: &str, value: Option<AttributeValue>) {
        let mut mirror = self.inner.mirror.borrow_mut();
        match value {
            Some(value) => {
                mirror.insert(key.to_string(), value);
            }
            None => {
                mirror.remove(key);
            }
        }
    }

    pub(crate) fn detach(&self) {
        self.inner.attached.set(false);
        self.inner.watcher.borrow_mut().take();
    }
}

impl std::fmt::Debug for Attributes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attributes")
            .field("tag", &self.inner.tag)
            .field("entity", &self.inner.entity)
            .field("attached", &self.inner.attached.get())
            .field("values", &self.inner.mirror.borrow())
            .finish()
    }
}
