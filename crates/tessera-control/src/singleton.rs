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

//! A singleton after it has been accepted by the registry.

use crate::descriptor::{DeclaredHook, Handler, HookArgs, SingletonDescriptor};
use std::any::Any;
use std::fmt;
use std::rc::Rc;
use tessera_core::{DescriptorId, FramePhase, HookFuture, SingletonLookup};

/// A registered singleton: its identity, state, and declared hooks.
pub struct Singleton {
    id: DescriptorId,
    name: String,
    load_order: Option<i64>,
    instance: Rc<dyn Any>,
    hooks: Vec<DeclaredHook>,
}

impl Singleton {
    pub(crate) fn from_descriptor(id: DescriptorId, descriptor: SingletonDescriptor) -> Self {
        Self {
            id,
            name: descriptor.name,
            load_order: descriptor.load_order,
            instance: descriptor.instance,
            hooks: descriptor.hooks,
        }
    }

    /// Identity of the descriptor in the metadata store.
    pub fn id(&self) -> DescriptorId {
        self.id
    }

    /// The unique name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Explicit load order, if any.
    pub fn load_order(&self) -> Option<i64> {
        self.load_order
    }

    /// The singleton's state, downcast to `T`.
    pub fn instance<T: 'static>(&self) -> Option<Rc<T>> {
        Rc::clone(&self.instance).downcast::<T>().ok()
    }

    /// The singleton's state, untyped.
    pub fn instance_any(&self) -> Rc<dyn Any> {
        Rc::clone(&self.instance)
    }

    /// Returns `true` if a hook named `name` was declared.
    pub fn has_hook(&self, name: &str) -> bool {
        self.hooks.iter().any(|hook| hook.name == name)
    }

    /// Declared hook names, in declaration order.
    pub fn hook_names(&self) -> Vec<&str> {
        self.hooks.iter().map(|hook| hook.name.as_str()).collect()
    }

    pub(crate) fn hooks(&self) -> &[DeclaredHook] {
        &self.hooks
    }

    /// Calls the custom hook `topic` with `args`.
    ///
    /// Returns `None` if no custom hook of that name exists. The returned
    /// future is not isolated; run it through a barrier or a pool.
    pub fn invoke_custom(&self, topic: &str, args: HookArgs) -> Option<HookFuture> {
        self.hooks.iter().find_map(|hook| match &hook.handler {
            Handler::Custom(handler) if hook.name == topic => Some(handler(args.clone())),
            _ => None,
        })
    }

    pub(crate) fn init_hook(&self, peers: Rc<dyn SingletonLookup>) -> Option<HookFuture> {
        self.hooks.iter().find_map(|hook| match &hook.handler {
            Handler::Init(handler) => Some(handler(Rc::clone(&peers))),
            _ => None,
        })
    }

    pub(crate) fn start_hook(&self) -> Option<HookFuture> {
        self.hooks.iter().find_map(|hook| match &hook.handler {
            Handler::Start(handler) => Some(handler()),
            _ => None,
        })
    }

    pub(crate) fn frame_hook(&self, phase: FramePhase) -> Option<Rc<dyn Fn(f64) -> HookFuture>> {
        self.hooks.iter().find_map(|hook| match &hook.handler {
            Handler::Frame(declared, handler) if *declared == phase => Some(Rc::clone(handler)),
            _ => None,
        })
    }
}

impl fmt::Debug for Singleton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Singleton")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("load_order", &self.load_order)
            .field("hooks", &self.hook_names())
            .finish()
    }
}
