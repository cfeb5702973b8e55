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

//! Contracts for the services the embedding application provides.
//!
//! The runtime never owns entities, tags, or attributes. It consumes them
//! through these traits, so any scene backend (an engine world, a test double,
//! the in-memory host in `tessera-infra`) can drive it.

use crate::entity::EntityId;
use crate::phase::FramePhase;
use crate::signal::Signal;
use crate::value::{AttributeMap, AttributeValue};

/// Maps tags to the entities carrying them, with membership notifications.
pub trait TagIndex {
    /// Every entity currently tagged with `tag`, in discovery order.
    fn tagged(&self, tag: &str) -> Vec<EntityId>;

    /// Returns `true` if `entity` carries `tag`.
    fn has_tag(&self, entity: EntityId, tag: &str) -> bool;

    /// Fired after `tag` is added to an entity.
    fn entity_added(&self, tag: &str) -> Signal<EntityId>;

    /// Fired after `tag` is removed from an entity.
    fn entity_removed(&self, tag: &str) -> Signal<EntityId>;
}

/// Per-entity key/value attributes with change notifications.
pub trait AttributeStore {
    /// Reads one attribute.
    fn get_attribute(&self, entity: EntityId, key: &str) -> Option<AttributeValue>;

    /// Writes one attribute, notifying its change signal if the value differs.
    fn set_attribute(&self, entity: EntityId, key: &str, value: AttributeValue);

    /// A snapshot of every attribute of `entity`.
    fn attributes(&self, entity: EntityId) -> AttributeMap;

    /// Fired with the new value (or `None` when cleared) whenever `key` changes on `entity`.
    fn attribute_changed(&self, entity: EntityId, key: &str) -> Signal<Option<AttributeValue>>;

    /// Fired with `(key, new value)` whenever any attribute of `entity`
    /// changes, after the per-key signal for that change.
    fn attributes_changed(&self, entity: EntityId) -> Signal<(String, Option<AttributeValue>)>;
}

/// Parent/child relationships between entities.
pub trait SceneGraph {
    /// Returns `true` if `entity` sits anywhere below `ancestor`.
    fn is_descendant_of(&self, entity: EntityId, ancestor: EntityId) -> bool;
}

/// The per-frame events delivered by the host's main loop.
pub trait FrameSignals {
    /// The signal for `phase`, carrying the frame delta in seconds.
    ///
    /// Returns `None` when the phase does not exist in this process, e.g.
    /// [`FramePhase::PreRender`] on a server.
    fn phase(&self, phase: FramePhase) -> Option<Signal<f64>>;
}

/// Everything the runtime needs from its host, as one object.
pub trait Host: TagIndex + AttributeStore + SceneGraph + FrameSignals {}

impl<T: TagIndex + AttributeStore + SceneGraph + FrameSignals> Host for T {}
