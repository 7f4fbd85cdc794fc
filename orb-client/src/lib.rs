pub mod client;
pub mod domain;

pub use client::{OrbClient, OrbError, DEFAULT_BASE_URL};
