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

//! Defines the hierarchy of error types surfaced to callers of the runtime.
//!
//! Only structural mistakes live here. Failures raised *inside* user hooks are
//! `anyhow` errors that get caught, logged, and reported, never returned.

use crate::entity::EntityId;
use crate::phase::ExecutionRole;
use thiserror::Error;

/// A mistake in how a descriptor was declared or registered.
///
/// Configuration errors are fatal for the registration that raised them and
/// are never downgraded to diagnostics, even for components that set
/// `ignore_flags`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The descriptor has no identity (empty singleton name or component tag).
    #[error("{kind} descriptor has an empty identity")]
    EmptyIdentity {
        /// `"singleton"` or `"component"`.
        kind: &'static str,
    },
    /// A singleton with the same name is already registered.
    #[error("singleton '{0}' is already registered")]
    DuplicateSingleton(String),
    /// A component with the same tag is already registered.
    #[error("component tag '{0}' is already registered")]
    DuplicateComponent(String),
    /// The descriptor breaks a structural rule (bad hook name, duplicate hook, ...).
    #[error("malformed descriptor '{identity}': {reason}")]
    Malformed {
        /// Name or tag of the offending descriptor.
        identity: String,
        /// What is wrong with it.
        reason: String,
    },
    /// A hook restricted to one role was declared on a descriptor registered under the other.
    #[error("'{identity}' declares {hook}, which only exists in the {required} role (current role: {actual})")]
    RoleRestrictedHook {
        /// Name of the offending descriptor.
        identity: String,
        /// The restricted hook.
        hook: String,
        /// The only role the hook is valid in.
        required: ExecutionRole,
        /// The role of the current process.
        actual: ExecutionRole,
    },
    /// A descriptor scoped to one role was requested or registered from the other.
    #[error("'{identity}' belongs to the {required} role and cannot be used from the {actual} role")]
    RoleMismatch {
        /// Name of the offending descriptor.
        identity: String,
        /// The role the descriptor is scoped to.
        required: ExecutionRole,
        /// The role of the current process.
        actual: ExecutionRole,
    },
    /// No singleton with this name is registered or discoverable.
    #[error("singleton '{0}' is not registered and no discovery source provides it")]
    UnknownSingleton(String),
}

/// A misuse of the runtime's lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    /// `startup()` was called more than once.
    #[error("startup() has already been called for this runtime")]
    AlreadyStarted,
    /// A registration error surfaced during startup.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// An error raised by a live attribute view.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttributeError {
    /// The component instance owning the view has been torn down.
    #[error("component '{tag}' on {entity} has been torn down; its attributes are no longer accessible")]
    Detached {
        /// Tag of the torn-down component.
        tag: String,
        /// Entity the component decorated.
        entity: EntityId,
    },
}
