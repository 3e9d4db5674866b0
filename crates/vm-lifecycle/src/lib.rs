//! VM lifecycle engine
//!
//! Drives KubeVirt VirtualMachines through start, stop and delete from a
//! declarative desired spec, one request/response exchange per call:
//!
//! - [`lifecycle::LifecycleEngine`] maps a desired spec and prior state onto
//!   gateway calls
//! - [`plan`] computes in-place updates over the fields the engine owns
//! - [`reconciler`] projects remote objects into [`vm_spec::VmStatus`]
//! - [`request`] is the document-in/document-out surface of the binary

pub mod config;
pub mod error;
pub mod lifecycle;
#[cfg(test)]
mod lifecycle_test;
mod overflow;
pub mod plan;
pub mod reconciler;
pub mod request;
mod timeout;

pub use config::{ConfigError, EngineConfig, Timeouts};
pub use error::{EngineError, Operation};
pub use lifecycle::LifecycleEngine;
pub use plan::ChangePlan;
pub use request::{Request, Response, handle};
