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

//! The component registry and its tag-driven attachment engine.
//!
//! Each (entity, descriptor) pair moves through
//! `Unattached -> Validating -> Active -> Torn-down`. After [`start`], the
//! host's tag signals are the only thing that drives those transitions.
//!
//! [`start`]: ComponentRegistry::start

use crate::component::{ComponentDescriptor, ComponentSource};
use crate::instance::{ActiveInstance, Instance};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use tessera_core::metadata::Identity;
use tessera_core::task::log_hook_failure;
use tessera_core::{
    AttributeStore, ConfigError, DescriptorId, EmptyLookup, EntityId, ExecutionRole, FramePhase,
    FrameSignals, Host, MetadataStore, RuntimeError, SceneGraph, SingletonLookup, TagIndex,
    Teardown,
};

struct Registered {
    id: DescriptorId,
    descriptor: ComponentDescriptor,
    active: RefCell<Vec<Rc<ActiveInstance>>>,
}

impl Registered {
    fn find(&self, entity: EntityId) -> Option<Rc<ActiveInstance>> {
        self.active
            .borrow()
            .iter()
            .find(|active| active.entity() == entity)
            .cloned()
    }
}

struct State {
    host: Rc<dyn Host>,
    role: ExecutionRole,
    metadata: Rc<MetadataStore>,
    warn_on_rejection: bool,
    singletons: RefCell<Rc<dyn SingletonLookup>>,
    /// Sorted by load order, then registration order.
    ordered: RefCell<Vec<Rc<Registered>>>,
    by_tag: RefCell<HashMap<String, Rc<Registered>>>,
    connections: RefCell<Teardown>,
    started: Cell<bool>,
    stopped: Cell<bool>,
}

/// Tag-keyed table of component descriptors that attaches and detaches
/// instances as entities gain and lose tags.
///
/// Cloning yields another handle to the same registry.
#[derive(Clone)]
pub struct ComponentRegistry {
    state: Rc<State>,
}

impl ComponentRegistry {
    /// Creates a registry over `host`.
    ///
    /// `warn_on_rejection` is the global switch for guard and ancestry
    /// warnings; descriptors can still silence themselves with `ignore_flags`.
    pub fn new(
        host: Rc<dyn Host>,
        role: ExecutionRole,
        metadata: Rc<MetadataStore>,
        warn_on_rejection: bool,
    ) -> Self {
        Self {
            state: Rc::new(State {
                host,
                role,
                metadata,
                warn_on_rejection,
                singletons: RefCell::new(Rc::new(EmptyLookup)),
                ordered: RefCell::new(Vec::new()),
                by_tag: RefCell::new(HashMap::new()),
                connections: RefCell::new(Teardown::new()),
                started: Cell::new(false),
                stopped: Cell::new(false),
            }),
        }
    }

    /// Registers a descriptor.
    ///
    /// Fails on an empty or duplicate tag, or on a frame phase the current
    /// role never delivers. If the registry is already running, entities that
    /// carry the tag are attached immediately.
    pub fn register(&self, descriptor: ComponentDescriptor) -> Result<DescriptorId, ConfigError> {
        let tag = descriptor.tag().to_string();
        if tag.is_empty() {
            return Err(ConfigError::EmptyIdentity { kind: "component" });
        }
        if self.state.by_tag.borrow().contains_key(&tag) {
            return Err(ConfigError::DuplicateComponent(tag));
        }
        for phase in descriptor.phases() {
            if let Some(required) = phase.required_role() {
                if required != self.state.role {
                    return Err(ConfigError::RoleRestrictedHook {
                        identity: tag,
                        hook: hook_name(*phase).to_string(),
                        required,
                        actual: self.state.role,
                    });
                }
            }
        }

        let id = DescriptorId::next();
        self.state
            .metadata
            .tag(id, Identity::Component, descriptor.load_order());
        let registered = Rc::new(Registered {
            id,
            descriptor,
            active: RefCell::new(Vec::new()),
        });
        self.state
            .by_tag
            .borrow_mut()
            .insert(tag.clone(), Rc::clone(&registered));
        {
            let mut ordered = self.state.ordered.borrow_mut();
            ordered.push(Rc::clone(&registered));
            let metadata = &self.state.metadata;
            ordered.sort_by_key(|entry| metadata.order_key(entry.id));
        }
        log::info!("ComponentRegistry: registered component '{tag}' ({id})");

        if self.is_running() {
            Self::activate(&self.state, &registered);
        }
        Ok(id)
    }

    /// Registers every descriptor offered by `source`, stopping at the first error.
    pub fn register_from(
        &self,
        source: &dyn ComponentSource,
    ) -> Result<Vec<DescriptorId>, ConfigError> {
        source
            .components()
            .into_iter()
            .map(|descriptor| self.register(descriptor))
            .collect()
    }

    /// Starts reacting to the host.
    ///
    /// Connects every available frame phase, then, per descriptor in load
    /// order, connects its tag signals and attaches every entity already
    /// carrying the tag, in the host's discovery order.
    pub fn start(&self, singletons: Rc<dyn SingletonLookup>) -> Result<(), RuntimeError> {
        if self.state.started.replace(true) {
            return Err(RuntimeError::AlreadyStarted);
        }
        *self.state.singletons.borrow_mut() = singletons;

        for phase in FramePhase::ALL {
            let Some(signal) = self.state.host.phase(phase) else {
                continue;
            };
            let weak = Rc::downgrade(&self.state);
            let connection = signal.connect(move |dt| {
                if let Some(state) = weak.upgrade() {
                    Self::dispatch(&state, phase, *dt);
                }
            });
            self.state.connections.borrow_mut().add_connection(connection);
        }

        let ordered: Vec<Rc<Registered>> = self.state.ordered.borrow().clone();
        for registered in &ordered {
            Self::activate(&self.state, registered);
        }
        log::info!(
            "ComponentRegistry: started with {} component(s), {} active instance(s)",
            ordered.len(),
            self.total_active()
        );
        Ok(())
    }

    /// Disconnects from the host and tears down every active instance.
    pub fn shutdown(&self) {
        if self.state.stopped.replace(true) {
            return;
        }
        self.state.connections.borrow_mut().release();

        let ordered: Vec<Rc<Registered>> = self.state.ordered.borrow().clone();
        let mut torn = 0;
        for registered in ordered {
            let instances: Vec<Rc<ActiveInstance>> =
                registered.active.borrow_mut().drain(..).collect();
            torn += instances.len();
            for active in instances {
                active.teardown();
            }
        }
        log::info!("ComponentRegistry: shut down, {torn} instance(s) torn down");
    }

    /// Returns `true` between [`start`](Self::start) and [`shutdown`](Self::shutdown).
    pub fn is_running(&self) -> bool {
        self.state.started.get() && !self.state.stopped.get()
    }

    /// Attaches `tag`'s component to `entity`, as if the tag had just been added.
    ///
    /// Returns `true` if an instance is active afterwards. Attaching an already
    /// active pair is a no-op.
    pub fn attach(&self, tag: &str, entity: EntityId) -> bool {
        let Some(registered) = self.state.by_tag.borrow().get(tag).cloned() else {
            return false;
        };
        Self::attach_entity(&self.state, &registered, entity);
        registered.find(entity).is_some()
    }

    /// Tears down `tag`'s instance on `entity`, as if the tag had just been
    /// removed. Returns `false` if there was nothing to tear down.
    pub fn detach(&self, tag: &str, entity: EntityId) -> bool {
        let Some(registered) = self.state.by_tag.borrow().get(tag).cloned() else {
            return false;
        };
        Self::detach_entity(&registered, entity)
    }

    /// Number of active instances for `tag`.
    pub fn active_count(&self, tag: &str) -> usize {
        self.state
            .by_tag
            .borrow()
            .get(tag)
            .map_or(0, |registered| registered.active.borrow().len())
    }

    /// Entities with an active instance for `tag`, in attach order.
    pub fn instances_of(&self, tag: &str) -> Vec<EntityId> {
        self.state
            .by_tag
            .borrow()
            .get(tag)
            .map(|registered| {
                registered
                    .active
                    .borrow()
                    .iter()
                    .map(|active| active.entity())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The live instance of `tag` on `entity`, if active.
    pub fn instance(&self, tag: &str, entity: EntityId) -> Option<Instance> {
        let registered = self.state.by_tag.borrow().get(tag).cloned()?;
        registered.find(entity).map(|active| active.instance().clone())
    }

    /// Every registered tag, in processing order.
    pub fn tags(&self) -> Vec<String> {
        self.state
            .ordered
            .borrow()
            .iter()
            .map(|registered| registered.descriptor.tag().to_string())
            .collect()
    }

    /// Descriptor id registered for `tag`.
    pub fn descriptor_id(&self, tag: &str) -> Option<DescriptorId> {
        self.state.by_tag.borrow().get(tag).map(|registered| registered.id)
    }

    fn total_active(&self) -> usize {
        self.state
            .ordered
            .borrow()
            .iter()
            .map(|registered| registered.active.borrow().len())
            .sum()
    }

    fn activate(state: &Rc<State>, registered: &Rc<Registered>) {
        let tag = registered.descriptor.tag().to_string();

        let weak_state: Weak<State> = Rc::downgrade(state);
        let weak_entry: Weak<Registered> = Rc::downgrade(registered);
        let added = state.host.entity_added(&tag).connect(move |entity| {
            if let (Some(state), Some(registered)) = (weak_state.upgrade(), weak_entry.upgrade()) {
                Self::attach_entity(&state, &registered, *entity);
            }
        });

        let weak_entry: Weak<Registered> = Rc::downgrade(registered);
        let removed = state.host.entity_removed(&tag).connect(move |entity| {
            if let Some(registered) = weak_entry.upgrade() {
                Self::detach_entity(&registered, *entity);
            }
        });

        {
            let mut connections = state.connections.borrow_mut();
            connections.add_connection(added);
            connections.add_connection(removed);
        }

        for entity in state.host.tagged(&tag) {
            Self::attach_entity(state, registered, entity);
        }
    }

    fn attach_entity(state: &Rc<State>, registered: &Rc<Registered>, entity: EntityId) {
        let descriptor = &registered.descriptor;
        let tag = descriptor.tag();
        if registered.find(entity).is_some() {
            log::trace!("ComponentRegistry: '{tag}' already active on {entity}");
            return;
        }

        // Validating
        let host = state.host.as_ref();
        if !descriptor.admits(entity, host) {
            Self::reject(state, descriptor, entity, "failed its instance guard");
            return;
        }
        let ancestors = descriptor.ancestors();
        if !ancestors.is_empty()
            && !ancestors
                .iter()
                .any(|scope| host.is_descendant_of(entity, *scope))
        {
            Self::reject(state, descriptor, entity, "is outside every allowed ancestor");
            return;
        }

        // Defaults never overwrite a live attribute.
        let mut snapshot = host.attributes(entity);
        for (key, value) in descriptor.defaults() {
            if !snapshot.contains_key(key) {
                host.set_attribute(entity, key, value.clone());
                snapshot.insert(key.clone(), value.clone());
            }
        }

        let active = ActiveInstance::wire(tag, entity, &state.host, snapshot);
        let component = match descriptor.build(active.instance()) {
            Ok(component) => component,
            Err(error) => {
                log_hook_failure(active.label(), "constructor", &error);
                active.teardown();
                return;
            }
        };
        active.install(component);
        registered.active.borrow_mut().push(Rc::clone(&active));
        log::debug!("ComponentRegistry: attached '{}'", active.label());

        let singletons = Rc::clone(&*state.singletons.borrow());
        active.invoke("onStart", |component, instance| {
            component.on_start(instance, singletons.as_ref())
        });
    }

    fn detach_entity(registered: &Rc<Registered>, entity: EntityId) -> bool {
        let removed = {
            let mut active = registered.active.borrow_mut();
            active
                .iter()
                .position(|instance| instance.entity() == entity)
                .map(|index| active.remove(index))
        };
        match removed {
            Some(active) => {
                active.teardown();
                log::debug!("ComponentRegistry: detached '{}'", active.label());
                true
            }
            None => {
                log::trace!(
                    "ComponentRegistry: nothing to detach for '{}' on {entity}",
                    registered.descriptor.tag()
                );
                false
            }
        }
    }

    fn reject(state: &State, descriptor: &ComponentDescriptor, entity: EntityId, reason: &str) {
        if state.warn_on_rejection && !descriptor.ignores_flags() {
            log::warn!(
                "ComponentRegistry: {entity} {reason} for component '{}'; it stays unattached",
                descriptor.tag()
            );
        } else {
            log::trace!(
                "ComponentRegistry: {entity} rejected by '{}' ({reason})",
                descriptor.tag()
            );
        }
    }

    fn dispatch(state: &Rc<State>, phase: FramePhase, dt: f64) {
        let ordered: Vec<Rc<Registered>> = state
            .ordered
            .borrow()
            .iter()
            .filter(|registered| registered.descriptor.phases().contains(&phase))
            .cloned()
            .collect();

        let hook = hook_name(phase);
        for registered in ordered {
            let snapshot: Vec<Rc<ActiveInstance>> = registered.active.borrow().clone();
            for active in snapshot {
                active.invoke(hook, |component, instance| match phase {
                    FramePhase::PreSimulation => component.on_pre_simulation(instance, dt),
                    FramePhase::PostSimulation => component.on_post_simulation(instance, dt),
                    FramePhase::PreRender => component.on_pre_render(instance, dt),
                });
            }
        }
    }
}

impl std::fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("tags", &self.tags())
            .field("running", &self.is_running())
            .finish()
    }
}

fn hook_name(phase: FramePhase) -> &'static str {
    match phase {
        FramePhase::PreSimulation => "onPreSimulation",
        FramePhase::PostSimulation => "onPostSimulation",
        FramePhase::PreRender => "onPreRender",
    }
}
