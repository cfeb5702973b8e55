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

//! # Tessera Control
//!
//! Long-lived, uniquely named systems and the sequence that brings them up.
//!
//! A [`SingletonDescriptor`] declares a singleton's state and hooks. The
//! [`SingletonRegistry`] validates descriptors against the process role,
//! publishes their hooks as listener topics, and loads missing singletons
//! lazily from [`SingletonSource`]s. The [`LifecycleOrchestrator`] runs the
//! one-shot startup and then drives the continuous hooks from the host's
//! frame signals.

#![warn(missing_docs)]

pub mod config;
pub mod descriptor;
pub mod discovery;
pub mod orchestrator;
pub mod registry;
pub mod singleton;

pub use config::RuntimeConfig;
pub use descriptor::{HookArgs, SingletonBuilder, SingletonDescriptor};
pub use discovery::{SingletonEntry, SingletonSource, SingletonTable, StaticSingletons};
pub use orchestrator::{BindingInfo, LifecycleOrchestrator, StartupReport};
pub use registry::{SingletonListeners, SingletonRegistry};
pub use singleton::Singleton;
