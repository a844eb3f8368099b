use crate::domain::{
    codec::CodecError,
    route::{RouteKey, Target},
};

/// Failures reported by a surface while executing an intent.
///
/// The router never propagates these; they are logged and the intent is dropped.
#[derive(Debug, thiserror::Error)]
pub enum NavError {
    #[error("navigation destination \"{0}\" cannot be found")]
    DestinationNotFound(RouteKey),
    #[error("destination \"{0}\" is not on the back stack")]
    NotInBackStack(RouteKey),
    #[error("surface is not ready: {0}")]
    InvalidState(String),
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Which entry `pop_up_to` stops at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PopTarget {
    /// The bottom of the back stack
    Root,
    Route(RouteKey),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopUpTo {
    pub destination: PopTarget,
    pub inclusive: bool,
}

/// Options applied by the surface around a `navigate` call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavOptions {
    pub pop_up_to: Option<PopUpTo>,
}

impl NavOptions {
    /// Pop everything, including the root, before navigating
    pub fn clearing_stack() -> Self {
        Self {
            pop_up_to: Some(PopUpTo {
                destination: PopTarget::Root,
                inclusive: true,
            }),
        }
    }

    /// Pop back to `route` (kept on the stack) before navigating
    pub fn pop_up_to(route: RouteKey) -> Self {
        Self {
            pop_up_to: Some(PopUpTo {
                destination: PopTarget::Route(route),
                inclusive: false,
            }),
        }
    }
}

/// The live navigation host an attached router drives.
///
/// Implementations are moved onto the router thread on attach and dropped on
/// detach, so they are never touched after being detached.
pub trait Surface: Send + 'static {
    fn navigate(&mut self, target: &Target, options: &NavOptions) -> Result<(), NavError>;

    /// Pop the top entry. Returns `false` when already at the root.
    fn navigate_up(&mut self) -> Result<bool, NavError>;

    /// Pop entries above `target` (and `target` itself when `inclusive`).
    /// Returns `false` when nothing was popped.
    fn pop_back_stack(&mut self, target: &Target, inclusive: bool) -> Result<bool, NavError>;

    fn current_destination(&self) -> Option<RouteKey>;

    fn previous_destination(&self) -> Option<RouteKey>;
}
