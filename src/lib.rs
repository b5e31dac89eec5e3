//! Parking PoC library
//!
//! Exposes the lot engine for integration testing and binary reuse.

pub mod domain;
pub mod infra;
pub mod io;
pub mod services;
