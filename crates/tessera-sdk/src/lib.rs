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

//! The public-facing SDK for the Tessera runtime.
//!
//! Applications create one [`Tessera`] context at process start, register
//! their singletons and components on it, and call
//! [`startup`](Tessera::startup) once from inside a `tokio` `LocalSet`.

pub mod runtime;

pub use runtime::{RuntimeState, Tessera};
pub use tessera_control as control;
pub use tessera_core as core;
pub use tessera_data as data;
pub use tessera_infra as infra;
pub use tessera_telemetry as telemetry;

/// Everything a descriptor author usually needs.
pub mod prelude {
    pub use crate::runtime::{RuntimeState, Tessera};
    pub use tessera_control::{
        HookArgs, RuntimeConfig, Singleton, SingletonDescriptor, SingletonEntry, SingletonSource,
        SingletonTable, StartupReport, StaticSingletons,
    };
    pub use tessera_core::{
        AttributeValue, ConfigError, EntityId, ExecutionRole, FramePhase, Host, HookResult,
        RuntimeError, SingletonLookup,
    };
    pub use tessera_data::{
        Attributes, Component, ComponentDescriptor, ComponentEntry, ComponentSource, Instance,
        Passive, StaticComponents,
    };
    pub use tessera_infra::MemoryHost;
    pub use tessera_telemetry::init_logging;
}
