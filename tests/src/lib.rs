//! # Pubsub Gateway Test Suite
//!
//! Cross-crate flows: HTTP router -> request engine -> in-memory bus ->
//! responder task, and back.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── fixtures.rs       # Responder tasks on the in-memory bus
//! └── integration/
//!     ├── flows.rs      # Engine over the bus
//!     └── http_flows.rs # HTTP routes over the bus
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p gateway-tests
//! cargo test -p gateway-tests integration::http_flows::
//! ```

#![allow(dead_code)]

pub mod fixtures;
pub mod integration;
