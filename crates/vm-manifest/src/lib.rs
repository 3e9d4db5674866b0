//! KubeVirt VirtualMachine manifests
//!
//! The typed manifest tree, remote objects, the manifest builder, cloud-init
//! placement and field patches. Nothing in this crate performs I/O.

pub mod builder;
pub mod cloud_init;
pub mod error;
pub mod node;
pub mod object;
pub mod patch;

pub use builder::{BuildOptions, BuiltManifest, build};
pub use cloud_init::{CloudInitPlacement, OverflowSecret};
pub use error::ManifestError;
pub use node::{ManifestNode, subset_diff};
pub use object::{ObjectMetadata, RemoteObject};
pub use patch::ManifestPatch;
pub use vm_spec::ObjectKey;
