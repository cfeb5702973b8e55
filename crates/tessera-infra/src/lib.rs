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

//! # Tessera Infra
//!
//! Concrete implementations of the host contracts defined in
//! `tessera_core::host`.
//!
//! The runtime is meant to be embedded in an application that already owns a
//! scene. This crate provides a self-contained, in-memory stand-in for that
//! application: an entity table with tags, attributes and parenting, plus a
//! manual frame driver. It backs the sandbox and the integration tests.

#![warn(missing_docs)]

pub mod frame;
pub mod scene;

pub use frame::FrameDriver;
pub use scene::MemoryHost;
