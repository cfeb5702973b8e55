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

//! Single-threaded callback signals, the shape every host notification takes.
//!
//! A [`Signal`] is a cheap, clonable handle to a shared list of handlers.
//! Connecting returns a [`Connection`] that can later be disconnected. Firing
//! snapshots the handler list first, so handlers are free to connect or
//! disconnect (including themselves) while a delivery is in progress.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

struct Slot<T> {
    id: u64,
    live: Rc<Cell<bool>>,
    handler: Rc<dyn Fn(&T)>,
}

struct Slots<T> {
    next_id: u64,
    entries: Vec<Slot<T>>,
    on_empty: Option<Rc<dyn Fn()>>,
}

/// A multicast notification delivered synchronously to every connected handler.
pub struct Signal<T: 'static> {
    slots: Rc<RefCell<Slots<T>>>,
}

impl<T: 'static> Signal<T> {
    /// Creates a signal with no handlers.
    pub fn new() -> Self {
        Self {
            slots: Rc::new(RefCell::new(Slots {
                next_id: 0,
                entries: Vec::new(),
                on_empty: None,
            })),
        }
    }

    /// Connects a handler. It stays connected until the returned
    /// [`Connection`] is disconnected; dropping the connection does not
    /// disconnect it.
    pub fn connect(&self, handler: impl Fn(&T) + 'static) -> Connection {
        let live = Rc::new(Cell::new(true));
        let id = {
            let mut slots = self.slots.borrow_mut();
            let id = slots.next_id;
            slots.next_id += 1;
            slots.entries.push(Slot {
                id,
                live: Rc::clone(&live),
                handler: Rc::new(handler),
            });
            id
        };

        let weak: Weak<RefCell<Slots<T>>> = Rc::downgrade(&self.slots);
        Connection {
            live,
            release: Some(Box::new(move || {
                let Some(slots) = weak.upgrade() else {
                    return;
                };
                let emptied = {
                    let mut slots = slots.borrow_mut();
                    slots.entries.retain(|slot| slot.id != id);
                    slots
                        .entries
                        .is_empty()
                        .then(|| slots.on_empty.clone())
                        .flatten()
                };
                if let Some(callback) = emptied {
                    callback();
                }
            })),
        }
    }

    /// Delivers `value` to every handler connected at the time of the call.
    ///
    /// A handler disconnected by an earlier handler of the same delivery is
    /// skipped.
    pub fn fire(&self, value: &T) {
        let snapshot: Vec<(Rc<Cell<bool>>, Rc<dyn Fn(&T)>)> = self
            .slots
            .borrow()
            .entries
            .iter()
            .map(|slot| (Rc::clone(&slot.live), Rc::clone(&slot.handler)))
            .collect();

        for (live, handler) in snapshot {
            if live.get() {
                handler(value);
            }
        }
    }

    /// Registers `callback` to run whenever a disconnect leaves the signal
    /// without handlers. Replaces any earlier callback.
    pub fn on_empty(&self, callback: impl Fn() + 'static) {
        self.slots.borrow_mut().on_empty = Some(Rc::new(callback));
    }

    /// Returns the number of connected handlers.
    pub fn connection_count(&self) -> usize {
        self.slots.borrow().entries.len()
    }
}

impl<T: 'static> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            slots: Rc::clone(&self.slots),
        }
    }
}

impl<T: 'static> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("connections", &self.connection_count())
            .finish()
    }
}

/// Handle to a connected signal handler.
pub struct Connection {
    live: Rc<Cell<bool>>,
    release: Option<Box<dyn FnOnce()>>,
}

impl Connection {
    /// Disconnects the handler. Calling this more than once is a no-op.
    pub fn disconnect(&mut self) {
        self.live.set(false);
        if let Some(release) = self.release.take() {
            release();
        }
    }

    /// Returns `true` while the handler is still connected.
    pub fn is_connected(&self) -> bool {
        self.live.get()
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("connected", &self.is_connected())
            .finish()
    }
}
