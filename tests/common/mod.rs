//! Shared test utilities for integration tests.
//!
//! This module provides:
//! - Redis testcontainer setup
//! - Key seeding and inspection helpers

pub mod containers;

pub use containers::*;
