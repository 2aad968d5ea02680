//! Courier integrations: external tracking providers.

pub mod la_poste;

pub use la_poste::LaPosteClient;
