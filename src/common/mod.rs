//! Common types, traits and configuration shared across the client

pub mod config;
pub mod traits;
pub mod types;

pub use config::{ClientConfig, ConfigLoader};
pub use traits::*;
pub use types::*;
