//! Navigation core
//!
//! - Navigation intents and the surface they run against
//! - The command router and its actor
//! - The result bus and result job de-duplication

pub mod intent;
pub mod result_bus;
pub mod result_jobs;
pub mod router;
pub mod surface;
