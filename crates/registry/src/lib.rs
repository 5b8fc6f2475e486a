//! # GridScript Capability Registry
//!
//! Host capabilities (functions, constants and events) that scripts may use.
//!
//! ## Lifecycle
//! - Providers register their members explicitly with a [`RegistryBuilder`]
//! - Members with types scripts cannot represent are logged and skipped
//! - [`RegistryBuilder::build`] freezes everything into an immutable [`Registry`]
//!
//! The built registry is never mutated again, so any number of compilations
//! can read it concurrently through a shared reference.

pub mod error;
pub mod context;
pub mod descriptor;
pub mod registry;
pub mod manifest;
pub mod providers;

pub use error::{ScriptError, Result};
pub use context::{ChatLine, ScriptContext};
pub use descriptor::{
    ApiFn, ConstantDescriptor, EventDescriptor, ExecutionMeta, FunctionDescriptor, HostType,
};
pub use registry::{
    ApiConstant, ApiEvent, ApiFunction, Bucket, CapabilityProvider, FunctionId, MemberKind,
    Registry, RegistryBuilder, Rejection, RejectReason, Visibility,
};
pub use manifest::CapabilityManifest;
