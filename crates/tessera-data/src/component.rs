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

//! Component behavior and the descriptors that bind it to a tag.

use crate::instance::Instance;
use std::fmt;
use std::rc::Rc;
use tessera_core::{
    AttributeMap, AttributeValue, EntityId, FramePhase, HookResult, Host, SingletonLookup,
    TagIndex,
};

/// Per-entity behavior attached while the entity carries a tag.
///
/// Every hook is optional. Hooks run with failures isolated: an `Err` or a
/// panic is logged against the component's tag and entity and never reaches
/// other instances or the frame loop.
///
/// Frame hooks are only called for the phases declared on the descriptor with
/// [`ComponentDescriptor::on_phase`].
pub trait Component {
    /// Called once, right after the instance becomes active.
    fn on_start(&mut self, instance: &Instance, singletons: &dyn SingletonLookup) -> HookResult {
        let _ = (instance, singletons);
        Ok(())
    }

    /// Called when a mirrored attribute changes, whoever changed it.
    fn on_attribute_changed(
        &mut self,
        instance: &Instance,
        key: &str,
        value: Option<&AttributeValue>,
    ) -> HookResult {
        let _ = (instance, key, value);
        Ok(())
    }

    /// Called on every [`FramePhase::PreSimulation`] delivery.
    fn on_pre_simulation(&mut self, instance: &Instance, dt: f64) -> HookResult {
        let _ = (instance, dt);
        Ok(())
    }

    /// Called on every [`FramePhase::PostSimulation`] delivery.
    fn on_post_simulation(&mut self, instance: &Instance, dt: f64) -> HookResult {
        let _ = (instance, dt);
        Ok(())
    }

    /// Called on every [`FramePhase::PreRender`] delivery. Client only.
    fn on_pre_render(&mut self, instance: &Instance, dt: f64) -> HookResult {
        let _ = (instance, dt);
        Ok(())
    }

    /// Called once when the instance is torn down, after its attribute
    /// subscriptions are released.
    fn destroy(&mut self, instance: &Instance) -> HookResult {
        let _ = instance;
        Ok(())
    }
}

/// A component with no behavior of its own. Attaching it still mirrors
/// attributes and applies defaults.
#[derive(Debug, Default, Clone, Copy)]
pub struct Passive;

impl Component for Passive {}

/// Decides whether a tagged entity may receive the component.
pub type InstanceGuard = Rc<dyn Fn(EntityId, &dyn Host) -> bool>;

/// Builds the behavior of a freshly validated instance.
pub type ComponentFactory = Rc<dyn Fn(&Instance) -> anyhow::Result<Box<dyn Component>>>;

/// Binds a [`Component`] to a tag, along with its attachment rules.
#[derive(Clone)]
pub struct ComponentDescriptor {
    tag: String,
    defaults: AttributeMap,
    guard: Option<InstanceGuard>,
    ancestors: Vec<EntityId>,
    ignore_flags: bool,
    load_order: Option<i64>,
    phases: Vec<FramePhase>,
    factory: ComponentFactory,
}

impl ComponentDescriptor {
    /// Creates a descriptor whose instances are built by `factory`.
    ///
    /// The factory runs after the attribute view is wired, so it may read the
    /// merged attributes. A failing factory leaves the entity unattached.
    pub fn new<C, F>(tag: impl Into<String>, factory: F) -> Self
    where
        C: Component + 'static,
        F: Fn(&Instance) -> anyhow::Result<C> + 'static,
    {
        let factory: ComponentFactory =
            Rc::new(move |instance: &Instance| {
                Ok(Box::new(factory(instance)?) as Box<dyn Component>)
            });
        Self {
            tag: tag.into(),
            defaults: AttributeMap::new(),
            guard: None,
            ancestors: Vec::new(),
            ignore_flags: false,
            load_order: None,
            phases: Vec::new(),
            factory,
        }
    }

    /// Creates a descriptor without a constructor; instances are [`Passive`].
    pub fn passive(tag: impl Into<String>) -> Self {
        Self::new(tag, |_| Ok(Passive))
    }

    /// Adds a default attribute. It is written to the entity on attach only
    /// if the entity does not already have a value for `key`.
    #[must_use]
    pub fn with_default(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.defaults.insert(key.into(), value.into());
        self
    }

    /// Replaces the guard. The default guard only checks that the entity
    /// carries the descriptor's tag.
    #[must_use]
    pub fn with_guard(mut self, guard: impl Fn(EntityId, &dyn Host) -> bool + 'static) -> Self {
        self.guard = Some(Rc::new(guard));
        self
    }

    /// Restricts attachment to descendants of `scope`. Several scopes may be
    /// listed; being below any one of them is enough.
    #[must_use]
    pub fn with_ancestor(mut self, scope: EntityId) -> Self {
        self.ancestors.push(scope);
        self
    }

    /// Silences guard and ancestry rejection warnings for this component.
    #[must_use]
    pub fn ignore_flags(mut self) -> Self {
        self.ignore_flags = true;
        self
    }

    /// Sets the order in which the component is enumerated at startup.
    #[must_use]
    pub fn with_load_order(mut self, order: i64) -> Self {
        self.load_order = Some(order);
        self
    }

    /// Subscribes the component's instances to a frame phase.
    #[must_use]
    pub fn on_phase(mut self, phase: FramePhase) -> Self {
        if !self.phases.contains(&phase) {
            self.phases.push(phase);
        }
        self
    }

    /// The tag that drives attachment.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Default attributes merged on attach.
    pub fn defaults(&self) -> &AttributeMap {
        &self.defaults
    }

    /// Required ancestor scopes. Empty means unrestricted.
    pub fn ancestors(&self) -> &[EntityId] {
        &self.ancestors
    }

    /// Whether soft diagnostics are silenced.
    pub fn ignores_flags(&self) -> bool {
        self.ignore_flags
    }

    /// Explicit load order, `None` sorting last.
    pub fn load_order(&self) -> Option<i64> {
        self.load_order
    }

    /// Declared frame phases.
    pub fn phases(&self) -> &[FramePhase] {
        &self.phases
    }

    /// Runs the guard (or the default tag check) for `entity`.
    pub(crate) fn admits(&self, entity: EntityId, host: &dyn Host) -> bool {
        match &self.guard {
            Some(guard) => guard(entity, host),
            None => host.has_tag(entity, &self.tag),
        }
    }

    pub(crate) fn build(&self, instance: &Instance) -> anyhow::Result<Box<dyn Component>> {
        (self.factory)(instance)
    }
}

impl fmt::Debug for ComponentDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDescriptor")
            .field("tag", &self.tag)
            .field("defaults", &self.defaults)
            .field("guarded", &self.guard.is_some())
            .field("ancestors", &self.ancestors)
            .field("ignore_flags", &self.ignore_flags)
            .field("load_order", &self.load_order)
            .field("phases", &self.phases)
            .finish()
    }
}

/// A discovery layer able to hand over component descriptors.
pub trait ComponentSource {
    /// Every descriptor this source knows about.
    fn components(&self) -> Vec<ComponentDescriptor>;
}

/// A component registered at link time with [`inventory::submit!`].
///
/// ```ignore
/// inventory::submit! {
///     tessera_data::ComponentEntry { tag: "Spinner", build: spinner_descriptor }
/// }
/// ```
pub struct ComponentEntry {
    /// Tag of the descriptor, used to order discovery.
    pub tag: &'static str,
    /// Builds the descriptor.
    pub build: fn() -> ComponentDescriptor,
}

inventory::collect!(ComponentEntry);

/// The [`ComponentSource`] backed by every [`ComponentEntry`] linked into the binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct StaticComponents;

impl ComponentSource for StaticComponents {
    fn components(&self) -> Vec<ComponentDescriptor> {
        let mut entries: Vec<&ComponentEntry> = inventory::iter::<ComponentEntry>().collect();
        entries.sort_by_key(|entry| entry.tag);
        entries.into_iter().map(|entry| (entry.build)()).collect()
    }
}
