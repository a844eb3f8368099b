//! Domain types
//!
//! - Route identity and targets
//! - Value marshaling for route data and results

pub mod codec;
pub mod route;
