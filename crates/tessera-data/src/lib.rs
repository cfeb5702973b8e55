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

//! # Tessera Data
//!
//! Per-entity component behavior driven by the host's tag index.
//!
//! A [`ComponentDescriptor`] binds a [`Component`] factory to a tag. The
//! [`ComponentRegistry`] watches that tag: when an entity gains it, the entity
//! is validated against the descriptor's guard and ancestor scopes, default
//! attributes are merged in, a live [`Attributes`] view is wired, and the
//! component is built and started. When the tag goes away the instance is torn
//! down and its view stops working.

#![warn(missing_docs)]

pub mod attributes;
pub mod component;
pub mod instance;
pub mod registry;

pub use attributes::Attributes;
pub use component::{
    Component, ComponentDescriptor, ComponentEntry, ComponentSource, Passive, StaticComponents,
};
pub use instance::Instance;
pub use registry::ComponentRegistry;
