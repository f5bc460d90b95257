//! Delegated token payloads and the redacting secret wrapper they carry.

pub mod delegated;
pub mod secret;
