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

//! An in-memory scene implementing every host contract.
//!
//! Entity slots are recycled through a free list with a generation counter, so
//! a handle to a despawned entity never aliases its successor. All signals are
//! fired after internal borrows are released, which lets handlers call back
//! into the host freely. Attribute signals are dropped from the scene once
//! their last handler disconnects.

use crate::frame::FrameDriver;
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::hash::Hash;
use std::rc::Rc;
use tessera_core::host::{AttributeStore, FrameSignals, SceneGraph, TagIndex};
use tessera_core::{AttributeMap, AttributeValue, EntityId, ExecutionRole, FramePhase, Signal};

#[derive(Debug, Default)]
struct EntityRecord {
    parent: Option<EntityId>,
    tags: BTreeSet<String>,
    attributes: AttributeMap,
}

#[derive(Debug, Default)]
struct SceneState {
    slots: Vec<(EntityId, Option<EntityRecord>)>,
    freed: Vec<u32>,
    /// Members of each tag, in the order the tag was added to them.
    members: HashMap<String, Vec<EntityId>>,
}

impl SceneState {
    fn record(&self, entity: EntityId) -> Option<&EntityRecord> {
        self.slots
            .get(entity.index as usize)
            .filter(|(slot, _)| *slot == entity)
            .and_then(|(_, record)| record.as_ref())
    }

    fn record_mut(&mut self, entity: EntityId) -> Option<&mut EntityRecord> {
        self.slots
            .get_mut(entity.index as usize)
            .filter(|(slot, _)| *slot == entity)
            .and_then(|(_, record)| record.as_mut())
    }

    fn allocate(&mut self, parent: Option<EntityId>) -> EntityId {
        let record = EntityRecord {
            parent,
            ..EntityRecord::default()
        };
        if let Some(index) = self.freed.pop() {
            let (slot, stored) = &mut self.slots[index as usize];
            slot.generation += 1;
            *stored = Some(record);
            *slot
        } else {
            let id = EntityId::new(self.slots.len() as u32, 0);
            self.slots.push((id, Some(record)));
            id
        }
    }
}

type SignalMap<K, T> = Rc<RefCell<HashMap<K, Signal<T>>>>;

/// A self-contained host: entities, tags, attributes, parenting and frames.
#[derive(Debug)]
pub struct MemoryHost {
    state: RefCell<SceneState>,
    added: RefCell<HashMap<String, Signal<EntityId>>>,
    removed: RefCell<HashMap<String, Signal<EntityId>>>,
    changed: SignalMap<(EntityId, String), Option<AttributeValue>>,
    entity_changed: SignalMap<EntityId, (String, Option<AttributeValue>)>,
    frames: FrameDriver,
}

impl MemoryHost {
    /// Creates an empty scene for a process running as `role`.
    #[must_use]
    pub fn new(role: ExecutionRole) -> Self {
        Self {
            state: RefCell::new(SceneState::default()),
            added: RefCell::new(HashMap::new()),
            removed: RefCell::new(HashMap::new()),
            changed: Rc::default(),
            entity_changed: Rc::default(),
            frames: FrameDriver::new(role),
        }
    }

    /// The frame driver used to step this scene.
    pub fn frames(&self) -> &FrameDriver {
        &self.frames
    }

    /// Creates a root entity.
    pub fn spawn(&self) -> EntityId {
        self.state.borrow_mut().allocate(None)
    }

    /// Creates an entity parented under `parent`.
    pub fn spawn_child(&self, parent: EntityId) -> EntityId {
        self.state.borrow_mut().allocate(Some(parent))
    }

    /// Returns `true` if `entity` refers to a live entity.
    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.state.borrow().record(entity).is_some()
    }

    /// Number of live entities.
    pub fn entity_count(&self) -> usize {
        self.state
            .borrow()
            .slots
            .iter()
            .filter(|(_, record)| record.is_some())
            .count()
    }

    /// Reparents `entity`. Passing `None` makes it a root.
    pub fn set_parent(&self, entity: EntityId, parent: Option<EntityId>) -> bool {
        match self.state.borrow_mut().record_mut(entity) {
            Some(record) => {
                record.parent = parent;
                true
            }
            None => false,
        }
    }

    /// The direct parent of `entity`.
    pub fn parent(&self, entity: EntityId) -> Option<EntityId> {
        self.state.borrow().record(entity).and_then(|r| r.parent)
    }

    /// Tags of `entity`, sorted by name.
    pub fn tags_of(&self, entity: EntityId) -> Vec<String> {
        self.state
            .borrow()
            .record(entity)
            .map(|r| r.tags.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Adds `tag` to `entity` and fires the tag's added signal.
    ///
    /// Returns `false` if the entity is dead or already carries the tag.
    pub fn add_tag(&self, entity: EntityId, tag: &str) -> bool {
        {
            let mut state = self.state.borrow_mut();
            let Some(record) = state.record_mut(entity) else {
                log::warn!("MemoryHost: cannot tag dead {entity} with '{tag}'");
                return false;
            };
            if !record.tags.insert(tag.to_string()) {
                return false;
            }
            state.members.entry(tag.to_string()).or_default().push(entity);
        }
        Self::signal_for(&self.added, tag.to_string()).fire(&entity);
        true
    }

    /// Removes `tag` from `entity` and fires the tag's removed signal.
    ///
    /// Returns `false` if the entity did not carry the tag.
    pub fn remove_tag(&self, entity: EntityId, tag: &str) -> bool {
        {
            let mut state = self.state.borrow_mut();
            let Some(record) = state.record_mut(entity) else {
                return false;
            };
            if !record.tags.remove(tag) {
                return false;
            }
            if let Some(members) = state.members.get_mut(tag) {
                members.retain(|member| *member != entity);
            }
        }
        Self::signal_for(&self.removed, tag.to_string()).fire(&entity);
        true
    }

    /// Clears one attribute, notifying its change signal with `None`.
    pub fn remove_attribute(&self, entity: EntityId, key: &str) -> bool {
        let removed = self
            .state
            .borrow_mut()
            .record_mut(entity)
            .and_then(|record| record.attributes.remove(key))
            .is_some();
        if removed {
            self.notify_attribute(entity, key, None);
        }
        removed
    }

    /// Removes every tag of `entity` (firing removed signals), then frees it.
    pub fn despawn(&self, entity: EntityId) -> bool {
        for tag in self.tags_of(entity) {
            self.remove_tag(entity, &tag);
        }

        {
            let mut state = self.state.borrow_mut();
            let Some((_, record)) = state
                .slots
                .get_mut(entity.index as usize)
                .filter(|(slot, _)| *slot == entity)
            else {
                return false;
            };
            if record.take().is_none() {
                return false;
            }
            state.freed.push(entity.index);
        }

        self.changed
            .borrow_mut()
            .retain(|(owner, _), _| *owner != entity);
        self.entity_changed.borrow_mut().remove(&entity);
        log::trace!("MemoryHost: despawned {entity}");
        true
    }

    /// Fires every frame phase available in this role. See [`FrameDriver::step`].
    pub fn step(&self, dt: f64) {
        self.frames.step(dt);
    }

    /// Fires every frame phase and lets local tasks run between phases.
    pub async fn run_frame(&self, dt: f64) {
        self.frames.run_frame(dt).await;
    }

    fn signal_for<K, T>(map: &RefCell<HashMap<K, Signal<T>>>, key: K) -> Signal<T>
    where
        K: std::hash::Hash + Eq,
        T: 'static,
    {
        map.borrow_mut().entry(key).or_default().clone()
    }

    /// Like `signal_for`, but the entry removes itself from `map` when its
    /// last handler disconnects.
    fn pruned_signal_for<K, T>(map: &SignalMap<K, T>, key: K) -> Signal<T>
    where
        K: Hash + Eq + Clone + 'static,
        T: 'static,
    {
        let mut entries = map.borrow_mut();
        if let Some(signal) = entries.get(&key) {
            return signal.clone();
        }

        let signal = Signal::new();
        let weak = Rc::downgrade(map);
        let owner = key.clone();
        signal.on_empty(move || {
            let Some(map) = weak.upgrade() else {
                return;
            };
            let Ok(mut entries) = map.try_borrow_mut() else {
                return;
            };
            if entries
                .get(&owner)
                .is_some_and(|signal| signal.connection_count() == 0)
            {
                entries.remove(&owner);
            }
        });
        entries.insert(key, signal.clone());
        signal
    }

    /// Number of attribute signals currently held, per key and per entity.
    pub fn attribute_signal_count(&self) -> usize {
        self.changed.borrow().len() + self.entity_changed.borrow().len()
    }

    fn notify_attribute(&self, entity: EntityId, key: &str, value: Option<AttributeValue>) {
        let signal = self
            .changed
            .borrow()
            .get(&(entity, key.to_string()))
            .cloned();
        if let Some(signal) = signal {
            signal.fire(&value);
        }

        let signal = self.entity_changed.borrow().get(&entity).cloned();
        if let Some(signal) = signal {
            signal.fire(&(key.to_string(), value));
        }
    }
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new(ExecutionRole::default())
    }
}

impl TagIndex for MemoryHost {
    fn tagged(&self, tag: &str) -> Vec<EntityId> {
        self.state
            .borrow()
            .members
            .get(tag)
            .cloned()
            .unwrap_or_default()
    }

    fn has_tag(&self, entity: EntityId, tag: &str) -> bool {
        self.state
            .borrow()
            .record(entity)
            .is_some_and(|record| record.tags.contains(tag))
    }

    fn entity_added(&self, tag: &str) -> Signal<EntityId> {
        Self::signal_for(&self.added, tag.to_string())
    }

    fn entity_removed(&self, tag: &str) -> Signal<EntityId> {
        Self::signal_for(&self.removed, tag.to_string())
    }
}

impl AttributeStore for MemoryHost {
    fn get_attribute(&self, entity: EntityId, key: &str) -> Option<AttributeValue> {
        self.state
            .borrow()
            .record(entity)
            .and_then(|record| record.attributes.get(key).cloned())
    }

    fn set_attribute(&self, entity: EntityId, key: &str, value: AttributeValue) {
        {
            let mut state = self.state.borrow_mut();
            let Some(record) = state.record_mut(entity) else {
                log::warn!("MemoryHost: ignoring attribute '{key}' on dead {entity}");
                return;
            };
            if record.attributes.get(key) == Some(&value) {
                return;
            }
            record.attributes.insert(key.to_string(), value.clone());
        }
        self.notify_attribute(entity, key, Some(value));
    }

    fn attributes(&self, entity: EntityId) -> AttributeMap {
        self.state
            .borrow()
            .record(entity)
            .map(|record| record.attributes.clone())
            .unwrap_or_default()
    }

    fn attribute_changed(&self, entity: EntityId, key: &str) -> Signal<Option<AttributeValue>> {
        Self::pruned_signal_for(&self.changed, (entity, key.to_string()))
    }

    fn attributes_changed(&self, entity: EntityId) -> Signal<(String, Option<AttributeValue>)> {
        Self::pruned_signal_for(&self.entity_changed, entity)
    }
}

impl SceneGraph for MemoryHost {
    fn is_descendant_of(&self, entity: EntityId, ancestor: EntityId) -> bool {
        let state = self.state.borrow();
        let mut current = state.record(entity).and_then(|r| r.parent);
        // A cycle can only be as long as the slot table.
        let mut budget = state.slots.len();
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            if budget == 0 {
                return false;
            }
            budget -= 1;
            current = state.record(parent).and_then(|r| r.parent);
        }
        false
    }
}

impl FrameSignals for MemoryHost {
    fn phase(&self, phase: FramePhase) -> Option<Signal<f64>> {
        self.frames.phase(phase)
    }
}
