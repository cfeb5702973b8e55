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

//! # Tessera Core
//!
//! Foundational crate containing the identifiers, primitives, and interface
//! contracts shared by the singleton registry, the component attachment
//! engine, and the lifecycle orchestrator.
//!
//! Nothing in here knows about concrete descriptors: the registries in
//! `tessera-control` and `tessera-data` are built on top of these pieces.

#![warn(missing_docs)]

pub mod entity;
pub mod error;
pub mod host;
pub mod listener;
pub mod lookup;
pub mod metadata;
pub mod phase;
pub mod pool;
pub mod signal;
pub mod task;
pub mod teardown;
pub mod telemetry;
pub mod value;

pub use entity::{DescriptorId, EntityId};
pub use error::{AttributeError, ConfigError, RuntimeError};
pub use host::{AttributeStore, FrameSignals, Host, SceneGraph, TagIndex};
pub use listener::ListenerRegistry;
pub use lookup::{EmptyLookup, SingletonLookup};
pub use metadata::{Identity, MetadataStore};
pub use phase::{ExecutionRole, FramePhase};
pub use pool::{ExecutionPool, PendingRun};
pub use signal::{Connection, Signal};
pub use task::{HookFuture, HookResult};
pub use teardown::Teardown;
pub use value::{AttributeMap, AttributeValue};
