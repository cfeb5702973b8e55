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

//! Places the registry can pull singleton descriptors from on demand.

use crate::descriptor::SingletonDescriptor;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Something that can produce singleton descriptors by name.
///
/// Sources are consulted when a singleton is looked up before it was
/// registered, and in bulk by `register_discovered`.
pub trait SingletonSource {
    /// Builds the descriptor named `name`, if this source provides it.
    fn find(&self, name: &str) -> Option<SingletonDescriptor>;

    /// Every name this source provides, sorted.
    fn names(&self) -> Vec<String>;
}

/// A singleton registered at link time with [`inventory::submit!`].
///
/// ```ignore
/// inventory::submit! {
///     tessera_control::SingletonEntry { name: "Scoreboard", build: scoreboard }
/// }
/// ```
pub struct SingletonEntry {
    /// Name of the descriptor `build` returns.
    pub name: &'static str,
    /// Builds the descriptor.
    pub build: fn() -> SingletonDescriptor,
}

inventory::collect!(SingletonEntry);

/// The [`SingletonSource`] backed by every [`SingletonEntry`] linked into the binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct StaticSingletons;

impl SingletonSource for StaticSingletons {
    fn find(&self, name: &str) -> Option<SingletonDescriptor> {
        inventory::iter::<SingletonEntry>()
            .find(|entry| entry.name == name)
            .map(|entry| (entry.build)())
    }

    fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = inventory::iter::<SingletonEntry>()
            .map(|entry| entry.name.to_string())
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

/// A source assembled at runtime from named builder closures.
#[derive(Default, Clone)]
pub struct SingletonTable {
    builders: BTreeMap<String, Rc<dyn Fn() -> SingletonDescriptor>>,
}

impl SingletonTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a builder under `name`, replacing any previous one.
    #[must_use]
    pub fn with(
        mut self,
        name: impl Into<String>,
        build: impl Fn() -> SingletonDescriptor + 'static,
    ) -> Self {
        self.builders.insert(name.into(), Rc::new(build));
        self
    }
}

impl SingletonSource for SingletonTable {
    fn find(&self, name: &str) -> Option<SingletonDescriptor> {
        self.builders.get(name).map(|build| build())
    }

    fn names(&self) -> Vec<String> {
        self.builders.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_builds_by_name() {
        let table = SingletonTable::new()
            .with("Zeta", || SingletonDescriptor::new("Zeta", ()).build())
            .with("Alpha", || SingletonDescriptor::new("Alpha", ()).build());

        assert_eq!(table.names(), vec!["Alpha".to_string(), "Zeta".to_string()]);
        assert_eq!(table.find("Alpha").map(|d| d.name().to_string()), Some("Alpha".into()));
        assert!(table.find("Missing").is_none());
    }
}
