//! Service wiring
//!
//! - [`navigator::Navigator`]: the injectable bundle of router, result bus and jobs

pub mod navigator;
