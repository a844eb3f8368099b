//! In-memory back stack surface
//!
//! Stands in for the UI framework's navigation host in tests and in the demo
//! binary. Clones share the same stack, so a handle kept outside the router can
//! observe what the attached copy did.

use std::{
    collections::HashSet,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    thread,
};

use crate::core::surface::{NavError, NavOptions, PopTarget, Surface};
use crate::domain::route::{RouteKey, Target};

/// One call made on the surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceOp {
    Navigate(Target),
    NavigateUp,
    PopBackStack { route: RouteKey, inclusive: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceCall {
    pub op: SurfaceOp,
    /// Name of the thread the call ran on
    pub thread: Option<String>,
}

#[derive(Debug, Default)]
struct BackStack {
    entries: Vec<Target>,
    routes: Option<HashSet<RouteKey>>,
    calls: Vec<SurfaceCall>,
}

impl BackStack {
    fn record(&mut self, op: SurfaceOp) {
        self.calls.push(SurfaceCall {
            op,
            thread: thread::current().name().map(str::to_string),
        });
    }

    fn position(&self, route: &RouteKey) -> Option<usize> {
        self.entries
            .iter()
            .rposition(|entry| entry.route() == route)
    }
}

#[derive(Debug, Clone, Default)]
pub struct BackStackSurface {
    inner: Arc<Mutex<BackStack>>,
}

impl BackStackSurface {
    /// Empty stack accepting any destination
    pub fn new() -> Self {
        Self::default()
    }

    /// Stack whose routing table only knows `routes`
    pub fn with_routes<I, R>(routes: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<RouteKey>,
    {
        let surface = Self::new();
        surface.lock().routes = Some(routes.into_iter().map(Into::into).collect());
        surface
    }

    /// Stack already showing `start`, as a host does after composing its start destination
    pub fn with_start(start: impl Into<Target>) -> Self {
        let surface = Self::new();
        surface.lock().entries.push(start.into());
        surface
    }

    fn lock(&self) -> MutexGuard<'_, BackStack> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn stack(&self) -> Vec<Target> {
        self.lock().entries.clone()
    }

    pub fn calls(&self) -> Vec<SurfaceCall> {
        self.lock().calls.clone()
    }
}

impl Surface for BackStackSurface {
    fn navigate(&mut self, target: &Target, options: &NavOptions) -> Result<(), NavError> {
        let mut stack = self.lock();
        if stack
            .routes
            .as_ref()
            .is_some_and(|routes| !routes.contains(target.route()))
        {
            return Err(NavError::DestinationNotFound(target.route().clone()));
        }
        stack.record(SurfaceOp::Navigate(target.clone()));

        if let Some(pop) = &options.pop_up_to {
            let keep = match &pop.destination {
                PopTarget::Root if pop.inclusive => 0,
                PopTarget::Root => stack.entries.len().min(1),
                PopTarget::Route(route) => {
                    let index = stack
                        .position(route)
                        .ok_or_else(|| NavError::NotInBackStack(route.clone()))?;
                    if pop.inclusive {
                        index
                    } else {
                        index + 1
                    }
                }
            };
            stack.entries.truncate(keep);
        }
        stack.entries.push(target.clone());
        Ok(())
    }

    fn navigate_up(&mut self) -> Result<bool, NavError> {
        let mut stack = self.lock();
        stack.record(SurfaceOp::NavigateUp);
        if stack.entries.len() <= 1 {
            return Ok(false);
        }
        stack.entries.pop();
        Ok(true)
    }

    fn pop_back_stack(&mut self, target: &Target, inclusive: bool) -> Result<bool, NavError> {
        let mut stack = self.lock();
        stack.record(SurfaceOp::PopBackStack {
            route: target.route().clone(),
            inclusive,
        });
        let Some(index) = stack.position(target.route()) else {
            return Ok(false);
        };
        let keep = if inclusive { index } else { index + 1 };
        let popped = keep < stack.entries.len();
        stack.entries.truncate(keep);
        Ok(popped)
    }

    fn current_destination(&self) -> Option<RouteKey> {
        self.lock().entries.last().map(|entry| entry.route().clone())
    }

    fn previous_destination(&self) -> Option<RouteKey> {
        let stack = self.lock();
        let len = stack.entries.len();
        (len >= 2).then(|| stack.entries[len - 2].route().clone())
    }
}
