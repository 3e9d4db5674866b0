//! KubeVirt client
//!
//! The narrow gateway the lifecycle engine uses to read and write KubeVirt
//! VirtualMachines and the Secrets holding overflowed cloud-init data.
//!
//! # Example
//!
//! ```no_run
//! use kubevirt_client::{KubeVirtClient, KubeVirtClientTrait};
//! use vm_spec::ObjectKey;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = KubeVirtClient::try_default().await?;
//! let vm = client.get_vm(&ObjectKey::new("default", "w1")).await?;
//! println!("running: {:?}", vm.running());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
#[path = "trait.rs"]
pub mod kubevirt_trait;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use client::KubeVirtClient;
pub use error::KubeVirtError;
pub use kubevirt_trait::KubeVirtClientTrait;
#[cfg(any(test, feature = "test-util"))]
pub use mock::{CallKind, MockCall, MockKubeVirtClient};
