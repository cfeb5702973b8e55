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

//! The process-wide runtime context.

use std::cell::{Cell, Ref, RefCell};
use std::rc::Rc;
use std::time::Duration;
use tessera_control::{
    LifecycleOrchestrator, RuntimeConfig, Singleton, SingletonDescriptor, SingletonListeners,
    SingletonRegistry, SingletonSource, StartupReport,
};
use tessera_core::{
    ConfigError, DescriptorId, Host, MetadataStore, RuntimeError, SingletonLookup,
};
use tessera_data::{ComponentDescriptor, ComponentRegistry, ComponentSource};
use tessera_telemetry::TelemetryService;

/// Where a [`Tessera`] context is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeState {
    /// Accepting registrations; `startup` has not been called.
    Registering,
    /// `startup` completed; frame hooks and tag signals are live.
    Running,
    /// `shutdown` was called.
    Stopped,
}

/// One runtime instance: configuration, host services, both registries, and
/// the startup sequence.
///
/// Created once at process start and passed explicitly to whatever needs it.
pub struct Tessera {
    config: RuntimeConfig,
    host: Rc<dyn Host>,
    metadata: Rc<MetadataStore>,
    singletons: SingletonRegistry,
    components: ComponentRegistry,
    orchestrator: LifecycleOrchestrator,
    telemetry: Option<RefCell<TelemetryService>>,
    state: Cell<RuntimeState>,
}

impl Tessera {
    /// Creates a runtime bound to `host`.
    ///
    /// When `config.profile_hooks` is set, frame and start hooks are timed and
    /// aggregated by a [`TelemetryService`].
    pub fn new(config: RuntimeConfig, host: Rc<dyn Host>) -> Self {
        let metadata = Rc::new(MetadataStore::new());
        let listeners = Rc::new(SingletonListeners::new());
        let singletons = SingletonRegistry::new(config.role, Rc::clone(&metadata), listeners);
        let components = ComponentRegistry::new(
            Rc::clone(&host),
            config.role,
            Rc::clone(&metadata),
            config.warn_on_rejection,
        );

        let mut orchestrator = LifecycleOrchestrator::new(singletons.clone(), Rc::clone(&host));
        let telemetry = if config.profile_hooks {
            let (service, sink) =
                TelemetryService::with_capacity(config.profile_buffer_size, Duration::from_secs(1));
            orchestrator = orchestrator.with_profiler(sink);
            Some(RefCell::new(service))
        } else {
            None
        };

        log::info!("Tessera: runtime created (role={})", config.role);
        Self {
            config,
            host,
            metadata,
            singletons,
            components,
            orchestrator,
            telemetry,
            state: Cell::new(RuntimeState::Registering),
        }
    }

    /// The configuration this runtime was created with.
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// The host services.
    pub fn host(&self) -> &Rc<dyn Host> {
        &self.host
    }

    /// The shared descriptor metadata.
    pub fn metadata(&self) -> &Rc<MetadataStore> {
        &self.metadata
    }

    /// The singleton registry.
    pub fn singletons(&self) -> &SingletonRegistry {
        &self.singletons
    }

    /// The component registry.
    pub fn components(&self) -> &ComponentRegistry {
        &self.components
    }

    /// The startup orchestrator.
    pub fn orchestrator(&self) -> &LifecycleOrchestrator {
        &self.orchestrator
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RuntimeState {
        self.state.get()
    }

    /// Registers a singleton.
    pub fn register_singleton(
        &self,
        descriptor: impl Into<SingletonDescriptor>,
    ) -> Result<Rc<Singleton>, ConfigError> {
        self.singletons.register(descriptor)
    }

    /// Registers a component.
    pub fn register_component(
        &self,
        descriptor: ComponentDescriptor,
    ) -> Result<DescriptorId, ConfigError> {
        self.components.register(descriptor)
    }

    /// Returns the singleton named `name`, loading it from a source if needed.
    pub fn get_singleton(&self, name: &str) -> Result<Rc<Singleton>, ConfigError> {
        self.singletons.get(name)
    }

    /// The typed state of the singleton named `name`.
    ///
    /// Returns `None` if the singleton cannot be resolved or holds another type.
    pub fn singleton<T: 'static>(&self, name: &str) -> Option<Rc<T>> {
        let lookup: &dyn SingletonLookup = &self.singletons;
        lookup.get::<T>(name)
    }

    /// Adds a source consulted for singletons that are looked up before being
    /// registered.
    pub fn add_singleton_source(&self, source: Rc<dyn SingletonSource>) {
        self.singletons.add_source(source);
    }

    /// Registers every discovered singleton, then every component `components`
    /// offers.
    pub fn register_discovered(&self, components: &dyn ComponentSource) -> Result<(), ConfigError> {
        let singletons = self.singletons.register_discovered()?;
        let tags = self.components.register_from(components)?;
        log::info!(
            "Tessera: discovered {} singleton(s) and {} component(s)",
            singletons.len(),
            tags.len()
        );
        Ok(())
    }

    /// Runs the singleton startup sequence, then starts the component engine.
    ///
    /// Components start after every singleton `onStart` has completed.
    /// Calling this more than once fails with [`RuntimeError::AlreadyStarted`].
    pub async fn startup(&self) -> Result<StartupReport, RuntimeError> {
        let report = self.orchestrator.startup().await?;
        let peers: Rc<dyn SingletonLookup> = Rc::new(self.singletons.clone());
        self.components.start(peers)?;
        self.state.set(RuntimeState::Running);
        self.flush();
        Ok(report)
    }

    /// Delivers deferred listener notifications.
    pub fn flush(&self) -> usize {
        self.orchestrator.flush()
    }

    /// Drains pending profiling samples. Returns how many were ingested.
    pub fn tick_telemetry(&self) -> usize {
        self.telemetry
            .as_ref()
            .map_or(0, |service| service.borrow_mut().tick())
    }

    /// The profiling aggregator, if profiling is enabled.
    pub fn telemetry(&self) -> Option<Ref<'_, TelemetryService>> {
        self.telemetry.as_ref().map(RefCell::borrow)
    }

    /// Disconnects every frame and tag signal, tears down every active
    /// component instance, and releases idle execution contexts.
    pub fn shutdown(&self) {
        if self.state.replace(RuntimeState::Stopped) == RuntimeState::Stopped {
            return;
        }
        log::info!("Tessera: shutting down...");
        self.orchestrator.shutdown();
        self.components.shutdown();
        if let Some(service) = &self.telemetry {
            let mut service = service.borrow_mut();
            service.tick();
            service.log_summary();
        }
        log::info!("Tessera: shutdown complete.");
    }
}

impl Drop for Tessera {
    fn drop(&mut self) {
        if self.state.get() == RuntimeState::Running {
            self.shutdown();
        }
    }
}

impl std::fmt::Debug for Tessera {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tessera")
            .field("role", &self.config.role)
            .field("state", &self.state.get())
            .field("singletons", &self.singletons.len())
            .field("components", &self.components.tags())
            .finish()
    }
}
