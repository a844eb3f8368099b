//! # Navigator - navigation command routing and result handoff
//!
//! The navigation core of a screen-based application, detached from any UI
//! toolkit:
//!
//! - **Intents** (`core::intent`): deferred units of navigation work
//! - **Router** (`core::router`): queues intents while no surface is attached,
//!   flushes them in order once one is, and runs every intent on one thread
//! - **Result bus** (`core::result_bus`): key-addressed, single-shot or sticky
//!   handoff of results from a later screen to an earlier one
//! - **Result jobs** (`core::result_jobs`): at most one result wait per
//!   (consumer, key)
//!
//! ## Example Usage
//!
//! ```rust
//! use navigator::{BackStackSurface, Config, Navigator};
//!
//! # #[tokio::main]
//! # async fn main() -> navigator::Result<()> {
//! let (navigator, runtime) = Navigator::new(&Config::default())?;
//!
//! // Nothing is attached yet, so this waits in the queue
//! navigator.router().go_to("products");
//!
//! let surface = BackStackSurface::new();
//! navigator.router().attach(surface.clone());
//! navigator.router().settled().await;
//! assert_eq!(surface.stack().len(), 1);
//!
//! runtime.shutdown().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`core`] - intents, router, result bus and jobs
//! - [`domain`] - routes, targets and value marshaling
//! - [`infrastructure`] - configuration, CLI, result storage, reference surface
//! - [`integration`] - the [`Navigator`] service bundle
//! - [`utils`] - logging, panic handling and paths

pub mod core;
pub mod domain;
pub mod infrastructure;
pub mod integration;
pub mod utils;

// Re-exports for convenience
pub use crate::core::intent::{IntentKind, NavAction, NavigationIntent};
pub use crate::core::result_bus::ResultBus;
pub use crate::core::result_jobs::{JobId, ResultJobs};
pub use crate::core::router::{AttachmentId, CommandRouter, RouterService};
pub use crate::core::surface::{NavError, NavOptions, Surface};
pub use domain::route::{Route, RouteKey, Target};
pub use infrastructure::back_stack::BackStackSurface;
pub use infrastructure::config::Config;
pub use integration::navigator::{Navigator, NavigatorRuntime};

/// Result type used throughout the library
pub type Result<T> = color_eyre::eyre::Result<T>;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
