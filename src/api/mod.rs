//! Backend API client
//!
//! Wire models, endpoint paths and the reqwest-based transport.

pub mod client;
pub mod models;
pub mod routes;

pub use client::{HttpTransport, TransportError};
pub use models::BetCall;
