//! Auth-domain identifiers, delegation targets, and delegated token models.

pub mod id;
pub mod target;
pub mod token;

pub use id::*;
pub use target::*;
pub use token::{delegated::*, secret::*};
