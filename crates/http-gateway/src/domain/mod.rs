//! Gateway domain: configuration, errors and forwarded payloads.

pub mod config;
pub mod error;
pub mod payload;
