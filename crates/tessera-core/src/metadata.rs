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

//! A side table of opaque metadata attached to registered descriptors.
//!
//! Descriptor owners never see this table. The registries write an entry once,
//! at registration, and read it back when sorting or validating.

use crate::entity::DescriptorId;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;

/// Metadata key holding the descriptor's [`Identity`].
pub const IDENTIFIER: &str = "identifier";
/// Metadata key holding the descriptor's load order.
pub const LOAD_ORDER: &str = "loadOrder";

/// What kind of descriptor an entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Identity {
    /// A long-lived, uniquely named system.
    Singleton,
    /// Per-entity behavior driven by a tag.
    Component,
}

impl Identity {
    /// The identifier string stored for this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Identity::Singleton => "@singleton",
            Identity::Component => "@component",
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single metadata value.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    /// The descriptor kind.
    Identity(Identity),
    /// A load order; `None` means "infinite", sorting after every explicit order.
    LoadOrder(Option<i64>),
    /// Free-form text for anything else.
    Text(String),
}

/// Side table keyed by descriptor id.
#[derive(Debug, Default)]
pub struct MetadataStore {
    entries: RefCell<HashMap<DescriptorId, HashMap<&'static str, MetadataValue>>>,
}

impl MetadataStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key` on `descriptor`, replacing any previous value.
    pub fn define(&self, descriptor: DescriptorId, key: &'static str, value: MetadataValue) {
        self.entries
            .borrow_mut()
            .entry(descriptor)
            .or_default()
            .insert(key, value);
    }

    /// Reads `key` from `descriptor`.
    pub fn get(&self, descriptor: DescriptorId, key: &str) -> Option<MetadataValue> {
        self.entries
            .borrow()
            .get(&descriptor)
            .and_then(|entry| entry.get(key))
            .cloned()
    }

    /// Returns `true` if `descriptor` has a value for `key`.
    pub fn has(&self, descriptor: DescriptorId, key: &str) -> bool {
        self.entries
            .borrow()
            .get(&descriptor)
            .is_some_and(|entry| entry.contains_key(key))
    }

    /// Writes the identity and load order of a freshly registered descriptor.
    pub fn tag(&self, descriptor: DescriptorId, identity: Identity, load_order: Option<i64>) {
        self.define(descriptor, IDENTIFIER, MetadataValue::Identity(identity));
        self.define(descriptor, LOAD_ORDER, MetadataValue::LoadOrder(load_order));
    }

    /// Reads back the identity written by [`tag`](Self::tag).
    pub fn identity(&self, descriptor: DescriptorId) -> Option<Identity> {
        match self.get(descriptor, IDENTIFIER) {
            Some(MetadataValue::Identity(identity)) => Some(identity),
            _ => None,
        }
    }

    /// Reads back the load order written by [`tag`](Self::tag).
    ///
    /// Unknown descriptors and descriptors without an explicit order both
    /// report `None`.
    pub fn load_order(&self, descriptor: DescriptorId) -> Option<i64> {
        match self.get(descriptor, LOAD_ORDER) {
            Some(MetadataValue::LoadOrder(order)) => order,
            _ => None,
        }
    }

    /// Sorts descriptor ids by ascending load order.
    ///
    /// Ids without an explicit order sort last; ties keep discovery order,
    /// which is the id order.
    pub fn sort_by_load_order(&self, ids: &mut [DescriptorId]) {
        ids.sort_by_key(|id| self.order_key(*id));
    }

    /// The key [`sort_by_load_order`](Self::sort_by_load_order) sorts by.
    pub fn order_key(&self, descriptor: DescriptorId) -> (bool, i64, DescriptorId) {
        let order = self.load_order(descriptor);
        (order.is_none(), order.unwrap_or(0), descriptor)
    }

    /// Drops every entry for `descriptor`.
    pub fn forget(&self, descriptor: DescriptorId) {
        self.entries.borrow_mut().remove(&descriptor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_and_read_back() {
        let store = MetadataStore::new();
        let id = DescriptorId::next();
        store.tag(id, Identity::Singleton, Some(3));

        assert_eq!(store.identity(id), Some(Identity::Singleton));
        assert_eq!(store.load_order(id), Some(3));
        assert!(store.has(id, IDENTIFIER));
        assert_eq!(Identity::Component.to_string(), "@component");
    }

    #[test]
    fn test_unknown_descriptor_has_nothing() {
        let store = MetadataStore::new();
        let id = DescriptorId::next();
        assert_eq!(store.identity(id), None);
        assert!(!store.has(id, LOAD_ORDER));
    }

    #[test]
    fn test_load_order_sort_is_stable_and_infinite_last() {
        let store = MetadataStore::new();
        let orders = [Some(3), Some(1), Some(1), None];
        let ids: Vec<DescriptorId> = orders
            .iter()
            .map(|order| {
                let id = DescriptorId::next();
                store.tag(id, Identity::Singleton, *order);
                id
            })
            .collect();

        let mut sorted = ids.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        store.sort_by_load_order(&mut sorted);

        assert_eq!(sorted, vec![ids[1], ids[2], ids[0], ids[3]]);
    }

    #[test]
    fn test_forget_removes_entry() {
        let store = MetadataStore::new();
        let id = DescriptorId::next();
        store.define(id, "note", MetadataValue::Text("x".into()));
        store.forget(id);
        assert_eq!(store.get(id, "note"), None);
    }
}
