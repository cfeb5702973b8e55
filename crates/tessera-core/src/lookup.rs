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

//! A read-only view of the singleton table handed to lifecycle hooks.
//!
//! Components and singleton hooks look their peers up by name through this
//! trait. The concrete registry lives in `tessera-control`, which keeps this
//! crate and `tessera-data` free of any dependency on it.

use std::any::Any;
use std::rc::Rc;

/// Name-keyed lookup of singleton instances.
pub trait SingletonLookup {
    /// Returns the instance registered under `name`, resolving it lazily if
    /// the implementation supports that.
    fn find(&self, name: &str) -> Option<Rc<dyn Any>>;

    /// Names of every singleton currently registered.
    fn names(&self) -> Vec<String>;
}

impl dyn SingletonLookup + '_ {
    /// Looks up `name` and downcasts its instance to `T`.
    ///
    /// Returns `None` if the singleton does not exist or has another type.
    pub fn get<T: 'static>(&self, name: &str) -> Option<Rc<T>> {
        self.find(name).and_then(|instance| instance.downcast::<T>().ok())
    }
}

/// A lookup with nothing in it.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyLookup;

impl SingletonLookup for EmptyLookup {
    fn find(&self, _name: &str) -> Option<Rc<dyn Any>> {
        None
    }

    fn names(&self) -> Vec<String> {
        Vec::new()
    }
}
