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

//! Singleton descriptors and the builder that declares their hooks.
//!
//! Hooks are declared explicitly as `(name, handler)` pairs. Each handler
//! closes over a shared handle to the singleton's state, so hooks of the same
//! singleton see the same instance.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::rc::Rc;
use tessera_core::phase::topics;
use tessera_core::task::{self, HookFuture};
use tessera_core::{AttributeValue, ExecutionRole, FramePhase, HookResult, SingletonLookup};

/// Positional arguments passed to a custom hook.
pub type HookArgs = Vec<AttributeValue>;

/// A type-erased hook body.
#[derive(Clone)]
pub(crate) enum Handler {
    /// `onInit`, handed the peer registry.
    Init(Rc<dyn Fn(Rc<dyn SingletonLookup>) -> HookFuture>),
    /// `onStart`.
    Start(Rc<dyn Fn() -> HookFuture>),
    /// A continuous hook, handed the frame delta.
    Frame(FramePhase, Rc<dyn Fn(f64) -> HookFuture>),
    /// Any other `on*` topic.
    Custom(Rc<dyn Fn(HookArgs) -> HookFuture>),
}

/// One declared hook.
#[derive(Clone)]
pub(crate) struct DeclaredHook {
    pub(crate) name: String,
    /// Explicit role restriction set with `on_for`.
    pub(crate) role: Option<ExecutionRole>,
    pub(crate) handler: Handler,
}

impl DeclaredHook {
    /// The only role this hook may be registered under, if any.
    pub(crate) fn required_role(&self) -> Option<ExecutionRole> {
        match &self.handler {
            Handler::Frame(phase, _) => self.role.or(phase.required_role()),
            _ => self.role,
        }
    }
}

/// The declaration of a long-lived, uniquely named system.
///
/// Built with [`SingletonDescriptor::new`] and handed to the registry, which
/// validates it.
#[derive(Clone)]
pub struct SingletonDescriptor {
    pub(crate) name: String,
    pub(crate) load_order: Option<i64>,
    pub(crate) realm: Option<ExecutionRole>,
    pub(crate) instance: Rc<dyn Any>,
    pub(crate) hooks: Vec<DeclaredHook>,
}

impl SingletonDescriptor {
    /// Starts declaring a singleton named `name` whose state is `instance`.
    pub fn new<T: 'static>(name: impl Into<String>, instance: T) -> SingletonBuilder<T> {
        SingletonBuilder {
            instance: Rc::new(instance),
            name: name.into(),
            load_order: None,
            realm: None,
            hooks: Vec::new(),
        }
    }

    /// The unique name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Explicit load order, `None` sorting last.
    pub fn load_order(&self) -> Option<i64> {
        self.load_order
    }

    /// The only role this singleton exists in, if scoped.
    pub fn realm(&self) -> Option<ExecutionRole> {
        self.realm
    }

    /// Declared hook names, in declaration order.
    pub fn hook_names(&self) -> Vec<&str> {
        self.hooks.iter().map(|hook| hook.name.as_str()).collect()
    }
}

impl fmt::Debug for SingletonDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingletonDescriptor")
            .field("name", &self.name)
            .field("load_order", &self.load_order)
            .field("realm", &self.realm)
            .field("hooks", &self.hook_names())
            .finish()
    }
}

/// Typed builder for a [`SingletonDescriptor`].
///
/// Every hook receives a shared handle to the singleton's state first.
pub struct SingletonBuilder<T: 'static> {
    instance: Rc<T>,
    name: String,
    load_order: Option<i64>,
    realm: Option<ExecutionRole>,
    hooks: Vec<DeclaredHook>,
}

impl<T: 'static> SingletonBuilder<T> {
    /// Sets the startup order; lower runs first, unset runs last.
    #[must_use]
    pub fn load_order(mut self, order: i64) -> Self {
        self.load_order = Some(order);
        self
    }

    /// Scopes the singleton to one execution role.
    #[must_use]
    pub fn realm(mut self, role: ExecutionRole) -> Self {
        self.realm = Some(role);
        self
    }

    fn push(mut self, name: &str, role: Option<ExecutionRole>, handler: Handler) -> Self {
        self.hooks.push(DeclaredHook {
            name: name.to_string(),
            role,
            handler,
        });
        self
    }

    /// Declares `onInit`, run in the first startup barrier with the peer registry.
    #[must_use]
    pub fn on_init<F, Fut>(self, hook: F) -> Self
    where
        F: Fn(Rc<T>, Rc<dyn SingletonLookup>) -> Fut + 'static,
        Fut: Future<Output = HookResult> + 'static,
    {
        let this = Rc::clone(&self.instance);
        let handler = Handler::Init(Rc::new(move |peers| task::boxed(hook(Rc::clone(&this), peers))));
        self.push(topics::ON_INIT, None, handler)
    }

    /// Declares `onStart`, run in the second startup barrier.
    #[must_use]
    pub fn on_start<F, Fut>(self, hook: F) -> Self
    where
        F: Fn(Rc<T>) -> Fut + 'static,
        Fut: Future<Output = HookResult> + 'static,
    {
        let this = Rc::clone(&self.instance);
        let handler = Handler::Start(Rc::new(move || task::boxed(hook(Rc::clone(&this)))));
        self.push(topics::ON_START, None, handler)
    }

    fn frame<F, Fut>(self, phase: FramePhase, hook: F) -> Self
    where
        F: Fn(Rc<T>, f64) -> Fut + 'static,
        Fut: Future<Output = HookResult> + 'static,
    {
        let this = Rc::clone(&self.instance);
        let handler = Handler::Frame(
            phase,
            Rc::new(move |dt| task::boxed(hook(Rc::clone(&this), dt))),
        );
        self.push(phase.singleton_topic(), None, handler)
    }

    /// Declares `onTick`, run after every simulation step.
    #[must_use]
    pub fn on_tick<F, Fut>(self, hook: F) -> Self
    where
        F: Fn(Rc<T>, f64) -> Fut + 'static,
        Fut: Future<Output = HookResult> + 'static,
    {
        self.frame(FramePhase::PostSimulation, hook)
    }

    /// Declares `onPhysics`, run before every simulation step.
    #[must_use]
    pub fn on_physics<F, Fut>(self, hook: F) -> Self
    where
        F: Fn(Rc<T>, f64) -> Fut + 'static,
        Fut: Future<Output = HookResult> + 'static,
    {
        self.frame(FramePhase::PreSimulation, hook)
    }

    /// Declares `onRender`, run before every rendered frame. Client only.
    #[must_use]
    pub fn on_render<F, Fut>(self, hook: F) -> Self
    where
        F: Fn(Rc<T>, f64) -> Fut + 'static,
        Fut: Future<Output = HookResult> + 'static,
    {
        self.frame(FramePhase::PreRender, hook)
    }

    /// Declares a custom hook other singletons can subscribe to by name.
    ///
    /// The name must start with `on` and must not be a built-in hook name.
    #[must_use]
    pub fn on<F, Fut>(self, name: &str, hook: F) -> Self
    where
        F: Fn(Rc<T>, HookArgs) -> Fut + 'static,
        Fut: Future<Output = HookResult> + 'static,
    {
        self.custom(name, None, hook)
    }

    /// Declares a custom hook that only exists in `role`.
    #[must_use]
    pub fn on_for<F, Fut>(self, role: ExecutionRole, name: &str, hook: F) -> Self
    where
        F: Fn(Rc<T>, HookArgs) -> Fut + 'static,
        Fut: Future<Output = HookResult> + 'static,
    {
        self.custom(name, Some(role), hook)
    }

    fn custom<F, Fut>(self, name: &str, role: Option<ExecutionRole>, hook: F) -> Self
    where
        F: Fn(Rc<T>, HookArgs) -> Fut + 'static,
        Fut: Future<Output = HookResult> + 'static,
    {
        let this = Rc::clone(&self.instance);
        let handler = Handler::Custom(Rc::new(move |args| task::boxed(hook(Rc::clone(&this), args))));
        self.push(name, role, handler)
    }

    /// Finishes the declaration.
    pub fn build(self) -> SingletonDescriptor {
        SingletonDescriptor {
            name: self.name,
            load_order: self.load_order,
            realm: self.realm,
            instance: self.instance,
            hooks: self.hooks,
        }
    }
}

impl<T: 'static> From<SingletonBuilder<T>> for SingletonDescriptor {
    fn from(builder: SingletonBuilder<T>) -> Self {
        builder.build()
    }
}

/// Checks the structural rules a descriptor's hooks must follow.
pub(crate) fn validate_hooks(descriptor: &SingletonDescriptor) -> Result<(), String> {
    let mut seen: Vec<&str> = Vec::with_capacity(descriptor.hooks.len());
    for hook in &descriptor.hooks {
        let name = hook.name.as_str();
        if name.len() <= topics::HOOK_PREFIX.len() || !name.starts_with(topics::HOOK_PREFIX) {
            return Err(format!("hook '{name}' must be named '{}<Something>'", topics::HOOK_PREFIX));
        }
        if seen.contains(&name) {
            return Err(format!("hook '{name}' is declared more than once"));
        }
        if matches!(hook.handler, Handler::Custom(_)) && topics::is_builtin(name) {
            return Err(format!("custom hook '{name}' reuses a built-in hook name"));
        }
        seen.push(name);
    }
    Ok(())
}
