//! Integration test crate for Subloop.
//!
//! This crate has no library code. It only contains integration tests
//! that exercise end-to-end flows across multiple workspace crates
//! against an in-memory database, without a running daemon.
//!
//! Run all integration tests:
//! ```sh
//! cargo test -p subloop-integration-tests
//! ```
