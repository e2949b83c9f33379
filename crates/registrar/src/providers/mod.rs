//! Provider adapters.
//!
//! Each adapter formats contact/address data into the shape its registrar's
//! API expects and maps provider failures into the generic
//! [`RegistrarError`](crate::error::RegistrarError) variants.

pub mod godaddy;
pub mod namecheap;
pub mod namecom;
pub mod sandbox;

pub use godaddy::{GodaddyConfig, GodaddyRegistrar};
pub use namecheap::{NamecheapConfig, NamecheapRegistrar};
pub use namecom::{NamecomConfig, NamecomRegistrar};
pub use sandbox::SandboxRegistrar;

use std::time::Duration;

/// Registrar-adjacent calls use short explicit timeouts so a hung provider
/// cannot indefinitely occupy the worker.
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(8);
