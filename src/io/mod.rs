//! IO modules - external system interfaces
//!
//! This module contains all external IO operations:
//! - `http` - JSON HTTP front end over the lot manager
//! - `query` - URL query string parsing
//! - `prometheus` - Prometheus text exposition for lot metrics

pub mod http;
pub mod prometheus;
pub mod query;

// Re-export commonly used types
pub use http::{handle_request, start_http_server, HttpContext};
