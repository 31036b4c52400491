//! # Forkmesh Test Suite
//!
//! Unified test crate for flows that span more than one subsystem crate.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/      # Cross-crate choreography
//!     ├── fork_flow.rs  # fork → handshake → pipe wiring
//!     └── pipe_flow.rs  # pipe streaming across process boundaries
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p fm-tests
//!
//! # By category
//! cargo test -p fm-tests integration::
//! ```

#![allow(unused_imports)]
#![allow(dead_code)]

pub mod integration;
