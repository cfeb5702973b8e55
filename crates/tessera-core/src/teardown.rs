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

//! A scoped bundle of resources released together.

use crate::signal::Connection;

enum Resource {
    Connection(Connection),
    Task(Box<dyn FnOnce()>),
}

/// Owns signal connections and cleanup callbacks until it is released.
///
/// Resources are released in the order they were added. Releasing twice is a
/// no-op, and dropping a `Teardown` releases whatever is still held.
#[derive(Default)]
pub struct Teardown {
    resources: Vec<Resource>,
}

impl Teardown {
    /// Creates an empty bundle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes ownership of a connection; it is disconnected on release.
    pub fn add_connection(&mut self, connection: Connection) {
        self.resources.push(Resource::Connection(connection));
    }

    /// Registers a callback to run on release.
    pub fn add_task(&mut self, task: impl FnOnce() + 'static) {
        self.resources.push(Resource::Task(Box::new(task)));
    }

    /// Number of resources still held.
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Returns `true` if nothing is held.
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Releases every held resource.
    pub fn release(&mut self) {
        for resource in self.resources.drain(..) {
            match resource {
                Resource::Connection(mut connection) => connection.disconnect(),
                Resource::Task(task) => task(),
            }
        }
    }
}

impl Drop for Teardown {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Teardown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Teardown")
            .field("resources", &self.resources.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::Signal;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    #[test]
    fn test_release_disconnects_and_runs_tasks_in_order() {
        let signal = Signal::<()>::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        let mut teardown = Teardown::new();
        teardown.add_connection(signal.connect(|_| {}));
        let o = Rc::clone(&order);
        teardown.add_task(move || o.borrow_mut().push("first"));
        let o = Rc::clone(&order);
        teardown.add_task(move || o.borrow_mut().push("second"));
        assert_eq!(teardown.len(), 3);

        teardown.release();
        assert!(teardown.is_empty());
        assert_eq!(signal.connection_count(), 0);
        assert_eq!(*order.borrow(), vec!["first", "second"]);
    }

    #[test]
    fn test_drop_releases_once() {
        let runs = Rc::new(Cell::new(0));
        {
            let mut teardown = Teardown::new();
            let r = Rc::clone(&runs);
            teardown.add_task(move || r.set(r.get() + 1));
            teardown.release();
        }
        assert_eq!(runs.get(), 1);
    }
}
