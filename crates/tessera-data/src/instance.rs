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

//! Active component instances and their teardown.

use crate::attributes::Attributes;
use crate::component::Component;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};
use tessera_core::task::{call_isolated, log_hook_failure};
use tessera_core::{AttributeStore, AttributeValue, EntityId, Host, HookResult, Teardown};

/// What a component hook sees of the entity it decorates.
///
/// The instance refers to the entity; it never owns it.
#[derive(Clone)]
pub struct Instance {
    entity: EntityId,
    tag: Rc<str>,
    attributes: Attributes,
}

impl Instance {
    /// The decorated entity.
    pub fn entity(&self) -> EntityId {
        self.entity
    }

    /// Tag of the component this instance belongs to.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// The live attribute view.
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("entity", &self.entity)
            .field("tag", &self.tag)
            .finish()
    }
}

type Change = (String, Option<AttributeValue>);

/// One (entity, descriptor) attachment.
///
/// Hooks run while the component is mutably borrowed. Attribute changes that
/// arrive during a hook are queued and delivered once it returns; a teardown
/// requested during a hook completes once it returns.
pub(crate) struct ActiveInstance {
    instance: Instance,
    label: String,
    component: RefCell<Option<Box<dyn Component>>>,
    pending: RefCell<VecDeque<Change>>,
    subscriptions: RefCell<Teardown>,
    torn_down: Cell<bool>,
    destroy_deferred: Cell<bool>,
}

impl ActiveInstance {
    /// Creates the instance and wires one change subscription per mirrored key,
    /// plus one for keys the entity gains later.
    /// The component itself is installed later by [`install`](Self::install).
    pub(crate) fn wire(
        tag: &str,
        entity: EntityId,
        host: &Rc<dyn Host>,
        snapshot: tessera_core::AttributeMap,
    ) -> Rc<Self> {
        let attributes = Attributes::new(tag, entity, Rc::downgrade(host), snapshot);
        let active = Rc::new(Self {
            instance: Instance {
                entity,
                tag: Rc::from(tag),
                attributes,
            },
            label: format!("{tag}@{entity}"),
            component: RefCell::new(None),
            pending: RefCell::new(VecDeque::new()),
            subscriptions: RefCell::new(Teardown::new()),
            torn_down: Cell::new(false),
            destroy_deferred: Cell::new(false),
        });

        for key in active.instance.attributes.watched_keys() {
            Self::watch(&active, host.as_ref(), &key);
        }

        let weak_self = Rc::downgrade(&active);
        let weak_host = Rc::downgrade(host);
        active.instance.attributes.set_watcher(move |key| {
            if let (Some(active), Some(host)) = (weak_self.upgrade(), weak_host.upgrade()) {
                Self::watch(&active, host.as_ref(), key);
            }
        });

        // Keys that first appear on the entity after attach.
        let weak_self = Rc::downgrade(&active);
        let weak_host = Rc::downgrade(host);
        let connection = host.attributes_changed(entity).connect(move |(key, value)| {
            let (Some(active), Some(host)) = (weak_self.upgrade(), weak_host.upgrade()) else {
                return;
            };
            if active.torn_down.get() || !active.instance.attributes.start_watching(key) {
                return;
            }
            Self::watch(&active, host.as_ref(), key);
            active.external_change(key, value.clone());
        });
        active.subscriptions.borrow_mut().add_connection(connection);

        active
    }

    fn watch(this: &Rc<Self>, host: &dyn Host, key: &str) {
        let weak: Weak<Self> = Rc::downgrade(this);
        let owned_key = key.to_string();
        let connection = host
            .attribute_changed(this.instance.entity, key)
            .connect(move |value| {
                if let Some(active) = weak.upgrade() {
                    active.external_change(&owned_key, value.clone());
                }
            });
        this.subscriptions.borrow_mut().add_connection(connection);
    }

    pub(crate) fn install(&self, component: Box<dyn Component>) {
        *self.component.borrow_mut() = Some(component);
        self.drain_changes();
    }

    pub(crate) fn instance(&self) -> &Instance {
        &self.instance
    }

    pub(crate) fn entity(&self) -> EntityId {
        self.instance.entity
    }

    pub(crate) fn label(&self) -> &str {
        &self.label
    }

    /// Number of live attribute subscriptions.
    pub(crate) fn subscription_count(&self) -> usize {
        self.subscriptions.borrow().len()
    }

    fn external_change(&self, key: &str, value: Option<AttributeValue>) {
        if self.torn_down.get() {
            return;
        }
        self.instance.attributes.mirror(key, value.clone());
        self.pending.borrow_mut().push_back((key.to_string(), value));
        self.drain_changes();
    }

    fn drain_changes(&self) {
        loop {
            if self.torn_down.get() {
                self.pending.borrow_mut().clear();
                return;
            }
            // A hook is running; it drains when it returns.
            let Ok(mut slot) = self.component.try_borrow_mut() else {
                return;
            };
            let Some(component) = slot.as_mut() else {
                return;
            };
            let Some((key, value)) = self.pending.borrow_mut().pop_front() else {
                return;
            };
            let result = call_isolated(|| {
                component.on_attribute_changed(&self.instance, &key, value.as_ref())
            });
            drop(slot);
            if let Err(error) = result {
                log_hook_failure(&self.label, "onAttributeChanged", &error);
            }
            self.finish_deferred_teardown();
        }
    }

    /// Runs one hook with failures isolated, then delivers queued changes.
    pub(crate) fn invoke(
        &self,
        hook: &str,
        call: impl FnOnce(&mut dyn Component, &Instance) -> HookResult,
    ) {
        if self.torn_down.get() {
            return;
        }
        let result = {
            let Ok(mut slot) = self.component.try_borrow_mut() else {
                log::debug!("ComponentRegistry: skipped reentrant {hook} on '{}'", self.label);
                return;
            };
            let Some(component) = slot.as_mut() else {
                return;
            };
            call_isolated(|| call(component.as_mut(), &self.instance))
        };
        if let Err(error) = result {
            log_hook_failure(&self.label, hook, &error);
        }
        self.finish_deferred_teardown();
        self.drain_changes();
    }

    /// Releases subscriptions, calls `destroy`, then invalidates the view.
    ///
    /// Calling it again is a no-op.
    pub(crate) fn teardown(&self) {
        if self.torn_down.replace(true) {
            return;
        }
        self.subscriptions.borrow_mut().release();
        self.pending.borrow_mut().clear();

        if self.component.try_borrow_mut().is_err() {
            self.destroy_deferred.set(true);
            return;
        }
        self.destroy();
    }

    fn finish_deferred_teardown(&self) {
        if self.destroy_deferred.replace(false) {
            self.destroy();
        }
    }

    fn destroy(&self) {
        let taken = self.component.borrow_mut().take();
        if let Some(mut component) = taken {
            if let Err(error) = call_isolated(|| component.destroy(&self.instance)) {
                log_hook_failure(&self.label, "destroy", &error);
            }
        }
        self.instance.attributes.detach();
    }

    pub(crate) fn is_torn_down(&self) -> bool {
        self.torn_down.get()
    }
}
