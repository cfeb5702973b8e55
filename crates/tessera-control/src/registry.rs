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

//! Singleton registry with validation, topic publishing, and lazy loading.

use crate::descriptor::{validate_hooks, SingletonDescriptor};
use crate::discovery::SingletonSource;
use crate::singleton::Singleton;
use std::any::Any;
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;
use tessera_core::phase::topics;
use tessera_core::{
    ConfigError, DescriptorId, ExecutionRole, Identity, ListenerRegistry, MetadataStore,
    SingletonLookup,
};

/// Broadcast hub keyed by hook topic, producing registered singletons.
pub type SingletonListeners = ListenerRegistry<Rc<Singleton>>;

struct RegistryState {
    role: ExecutionRole,
    metadata: Rc<MetadataStore>,
    listeners: Rc<SingletonListeners>,
    /// Registration order.
    entries: RefCell<Vec<Rc<Singleton>>>,
    by_name: RefCell<HashMap<String, Rc<Singleton>>>,
    sources: RefCell<Vec<Rc<dyn SingletonSource>>>,
}

/// The table of every singleton in the process, keyed by unique name.
///
/// Cloning yields another handle to the same table.
#[derive(Clone)]
pub struct SingletonRegistry {
    state: Rc<RegistryState>,
}

impl SingletonRegistry {
    /// Creates an empty registry for `role`.
    pub fn new(
        role: ExecutionRole,
        metadata: Rc<MetadataStore>,
        listeners: Rc<SingletonListeners>,
    ) -> Self {
        Self {
            state: Rc::new(RegistryState {
                role,
                metadata,
                listeners,
                entries: RefCell::new(Vec::new()),
                by_name: RefCell::new(HashMap::new()),
                sources: RefCell::new(Vec::new()),
            }),
        }
    }

    /// The role this registry validates against.
    pub fn role(&self) -> ExecutionRole {
        self.state.role
    }

    /// The topic hub this registry publishes hooks to.
    pub fn listeners(&self) -> &Rc<SingletonListeners> {
        &self.state.listeners
    }

    /// The metadata store descriptors are tagged in.
    pub fn metadata(&self) -> &Rc<MetadataStore> {
        &self.state.metadata
    }

    /// Adds a source consulted by [`get`](Self::get) and
    /// [`register_discovered`](Self::register_discovered).
    pub fn add_source(&self, source: Rc<dyn SingletonSource>) {
        self.state.sources.borrow_mut().push(source);
    }

    /// Validates and registers a singleton.
    ///
    /// On success the descriptor is tagged in the metadata store and every
    /// hook other than `onInit` and `onStart` is published as a topic.
    pub fn register(
        &self,
        descriptor: impl Into<SingletonDescriptor>,
    ) -> Result<Rc<Singleton>, ConfigError> {
        let descriptor = descriptor.into();
        let name = descriptor.name().to_string();
        let role = self.state.role;

        if name.is_empty() {
            return Err(ConfigError::EmptyIdentity { kind: "singleton" });
        }
        if self.contains(&name) {
            return Err(ConfigError::DuplicateSingleton(name));
        }
        if let Some(required) = descriptor.realm() {
            if required != role {
                return Err(ConfigError::RoleMismatch {
                    identity: name,
                    required,
                    actual: role,
                });
            }
        }
        validate_hooks(&descriptor).map_err(|reason| ConfigError::Malformed {
            identity: name.clone(),
            reason,
        })?;
        if let Some((hook, required)) = descriptor.hooks.iter().find_map(|hook| {
            hook.required_role()
                .filter(|required| *required != role)
                .map(|required| (hook.name.clone(), required))
        }) {
            return Err(ConfigError::RoleRestrictedHook {
                identity: name,
                hook,
                required,
                actual: role,
            });
        }

        let id = DescriptorId::next();
        self.state
            .metadata
            .tag(id, Identity::Singleton, descriptor.load_order());
        let singleton = Rc::new(Singleton::from_descriptor(id, descriptor));
        self.state.entries.borrow_mut().push(Rc::clone(&singleton));
        self.state
            .by_name
            .borrow_mut()
            .insert(name.clone(), Rc::clone(&singleton));
        log::info!(
            "SingletonRegistry: Registered '{}' ({id}, load_order={:?})",
            name,
            singleton.load_order()
        );

        // Subscribers may call back into the registry, so no borrow is held here.
        let published: Vec<String> = singleton
            .hooks()
            .iter()
            .map(|hook| hook.name.clone())
            .filter(|hook| !topics::STARTUP.contains(&hook.as_str()))
            .collect();
        for topic in published {
            self.state.listeners.publish(Rc::clone(&singleton), &topic);
        }

        Ok(singleton)
    }

    /// Returns the singleton named `name`, loading it from a source on first use.
    pub fn get(&self, name: &str) -> Result<Rc<Singleton>, ConfigError> {
        if let Some(existing) = self.lookup(name) {
            return Ok(existing);
        }

        let sources: Vec<Rc<dyn SingletonSource>> = self.state.sources.borrow().clone();
        for source in sources {
            let Some(descriptor) = source.find(name) else {
                continue;
            };
            if descriptor.name() != name {
                log::warn!(
                    "SingletonRegistry: source returned '{}' when asked for '{name}'",
                    descriptor.name()
                );
                continue;
            }
            log::debug!("SingletonRegistry: lazily loading '{name}'");
            return self.register(descriptor);
        }

        Err(ConfigError::UnknownSingleton(name.to_string()))
    }

    /// Registers every singleton the sources provide that is not registered
    /// yet, in name order. Singletons scoped to the other role are skipped.
    pub fn register_discovered(&self) -> Result<Vec<Rc<Singleton>>, ConfigError> {
        let sources: Vec<Rc<dyn SingletonSource>> = self.state.sources.borrow().clone();
        let names: BTreeSet<String> = sources.iter().flat_map(|source| source.names()).collect();

        let mut registered = Vec::new();
        for name in names {
            if self.contains(&name) {
                continue;
            }
            let Some(descriptor) = sources.iter().find_map(|source| source.find(&name)) else {
                continue;
            };
            if descriptor.realm().is_some_and(|realm| realm != self.state.role) {
                log::debug!(
                    "SingletonRegistry: skipping '{name}', scoped to the {:?} role",
                    descriptor.realm()
                );
                continue;
            }
            registered.push(self.register(descriptor)?);
        }
        Ok(registered)
    }

    /// Returns the singleton named `name` without consulting any source.
    pub fn lookup(&self, name: &str) -> Option<Rc<Singleton>> {
        self.state.by_name.borrow().get(name).cloned()
    }

    /// Returns `true` if `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.state.by_name.borrow().contains_key(name)
    }

    /// Every registered singleton, in registration order.
    pub fn all(&self) -> Vec<Rc<Singleton>> {
        self.state.entries.borrow().clone()
    }

    /// Every registered singleton, by ascending load order. Unordered
    /// singletons come last; ties keep registration order.
    pub fn sorted(&self) -> Vec<Rc<Singleton>> {
        let mut entries = self.all();
        let metadata = &self.state.metadata;
        entries.sort_by_key(|singleton| metadata.order_key(singleton.id()));
        entries
    }

    /// Returns the number of registered singletons.
    pub fn len(&self) -> usize {
        self.state.entries.borrow().len()
    }

    /// Returns true if no singletons are registered.
    pub fn is_empty(&self) -> bool {
        self.state.entries.borrow().is_empty()
    }
}

impl SingletonLookup for SingletonRegistry {
    fn find(&self, name: &str) -> Option<Rc<dyn Any>> {
        match self.get(name) {
            Ok(singleton) => Some(singleton.instance_any()),
            Err(ConfigError::UnknownSingleton(_)) => None,
            Err(error) => {
                log::warn!("SingletonRegistry: lookup of '{name}' failed: {error}");
                None
            }
        }
    }

    fn names(&self) -> Vec<String> {
        self.state
            .entries
            .borrow()
            .iter()
            .map(|singleton| singleton.name().to_string())
            .collect()
    }
}

impl std::fmt::Debug for SingletonRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingletonRegistry")
            .field("role", &self.state.role)
            .field("singletons", &SingletonLookup::names(self))
            .finish()
    }
}
