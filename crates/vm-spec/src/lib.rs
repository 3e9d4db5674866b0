//! KubeVirt VM desired-state records
//!
//! Typed records exchanged with the declarative front-end: the desired
//! configuration of one virtual machine, the lifecycle verbs it may carry,
//! and the status record handed back after every engine call.

pub mod affinity;
pub mod desired;
pub mod device;
pub mod error;
pub mod identity;
pub mod network;
pub mod status;
pub mod toleration;
pub mod transition;

pub use affinity::*;
pub use desired::*;
pub use device::*;
pub use error::SpecError;
pub use identity::ObjectKey;
pub use network::*;
pub use status::*;
pub use toleration::*;
pub use transition::*;
