use std::thread;

use color_eyre::eyre::{eyre, Result};
use futures::stream::BoxStream;
use serde::{de::DeserializeOwned, Serialize};
use tokio_util::sync::CancellationToken;

use crate::core::{
    result_bus::ResultBus,
    result_jobs::{JobId, ResultJobs},
    router::{CommandRouter, RouterService},
};
use crate::domain::{
    codec,
    route::{Route, Target},
};
use crate::infrastructure::config::Config;

/// Navigation services handed to screens.
///
/// Built once per process by the host and passed around by clone; there is no
/// global instance, so tests can build as many isolated navigators as they need.
#[derive(Clone, Debug)]
pub struct Navigator {
    router: CommandRouter,
    results: ResultBus,
    jobs: ResultJobs,
}

/// Owns the router thread; stops it on [`NavigatorRuntime::shutdown`] or drop
#[derive(Debug)]
pub struct NavigatorRuntime {
    cancel_token: CancellationToken,
    thread: Option<thread::JoinHandle<()>>,
}

impl NavigatorRuntime {
    pub async fn shutdown(mut self) -> Result<()> {
        self.cancel_token.cancel();
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        tokio::task::spawn_blocking(move || thread.join())
            .await?
            .map_err(|_| eyre!("Router thread panicked"))
    }
}

impl Drop for NavigatorRuntime {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

impl Navigator {
    /// Build the services and start the router thread
    pub fn new(config: &Config) -> Result<(Self, NavigatorRuntime)> {
        let results = ResultBus::new();
        let (router, cancel_token, service) =
            RouterService::new(results.clone(), config.router.clone());
        let (thread, router_runtime) = service.spawn()?;
        log::info!("Navigator started on thread {}", config.router.main_thread_name);

        let navigator = Self {
            router,
            results,
            jobs: ResultJobs::with_runtime(router_runtime),
        };
        let runtime = NavigatorRuntime {
            cancel_token,
            thread: Some(thread),
        };
        Ok((navigator, runtime))
    }

    pub fn router(&self) -> &CommandRouter {
        &self.router
    }

    pub fn results(&self) -> &ResultBus {
        &self.results
    }

    pub fn jobs(&self) -> &ResultJobs {
        &self.jobs
    }

    fn target_of<R: Route>(route: &R) -> Option<Target> {
        match Target::of(route) {
            Ok(target) => Some(target),
            Err(e) => {
                log::error!("Cannot navigate to {}: {e}", R::NAME);
                None
            }
        }
    }

    pub fn navigate<R: Route>(&self, route: &R) {
        if let Some(target) = Self::target_of(route) {
            self.router.go_to(target);
        }
    }

    pub fn navigate_clearing_stack<R: Route>(&self, route: &R) {
        if let Some(target) = Self::target_of(route) {
            self.router.go_to_clearing_stack(target);
        }
    }

    pub fn go_back_and_navigate<R: Route>(&self, route: &R) {
        if let Some(target) = Self::target_of(route) {
            self.router.go_back_and_go_to(target);
        }
    }

    /// Go back, leaving `result` under `key` for an earlier screen
    pub fn go_back_with<T: Serialize + ?Sized>(
        &self,
        key: &str,
        result: &T,
        target: Option<Target>,
    ) {
        match codec::encode_value(result) {
            Ok(value) => self.router.go_back_with_result(key, value, target),
            Err(e) => log::error!("Dropping result for key {key}: {e}"),
        }
    }

    pub fn observe_result<T>(&self, key: &str, single_shot: bool) -> BoxStream<'static, Option<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.results.subscribe_as(key, single_shot)
    }

    /// Wait for the result under `key` on behalf of `consumer`, replacing any
    /// wait the same consumer already has on that key.
    ///
    /// Callable from any thread; `on_result` runs on the router thread.
    pub fn get_result<T, F>(&self, consumer: &str, key: &str, on_result: F) -> JobId
    where
        T: DeserializeOwned + Send + 'static,
        F: FnOnce(T) + Send + 'static,
    {
        self.jobs.get_result(&self.results, consumer, key, on_result)
    }

    /// Drop every wait `consumer` has, e.g. when its screen is destroyed
    pub fn release_consumer(&self, consumer: &str) -> usize {
        self.jobs.cancel_consumer(consumer)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use serde::Deserialize;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    use super::*;
    use crate::infrastructure::back_stack::BackStackSurface;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Products;

    impl Route for Products {
        const NAME: &'static str = "products";
        const CARRIES_DATA: bool = false;
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Filter {
        category: String,
    }

    impl Route for Filter {
        const NAME: &'static str = "filter";
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct PriceRange {
        min: u32,
        max: u32,
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_typed_navigation_and_result() -> Result<()> {
        let (navigator, runtime) = Navigator::new(&Config::default())?;
        let surface = BackStackSurface::new();
        navigator.router().attach(surface.clone());

        navigator.navigate(&Products);
        navigator.navigate(&Filter {
            category: "laptops".to_string(),
        });
        navigator.router().settled().await;

        let top = surface.stack().last().cloned();
        assert_eq!(
            top.and_then(|target| target.args::<Filter>()),
            Some(Filter {
                category: "laptops".to_string()
            })
        );

        let (tx, mut rx) = mpsc::unbounded_channel();
        navigator.get_result::<PriceRange, _>("ProductsScreen", "FILTER_RESULT", move |range| {
            let _ = tx.send(range);
        });
        navigator.go_back_with("FILTER_RESULT", &PriceRange { min: 10, max: 50 }, None);

        let received = timeout(Duration::from_secs(2), rx.recv()).await?;
        assert_eq!(received, Some(PriceRange { min: 10, max: 50 }));
        assert_eq!(surface.stack().len(), 1);

        runtime.shutdown().await?;
        Ok(())
    }

    #[test]
    fn test_get_result_from_thread_without_runtime() -> Result<()> {
        let (navigator, runtime) = Navigator::new(&Config::default())?;
        let (tx, rx) = std::sync::mpsc::channel();
        navigator.get_result::<u32, _>("ProductsScreen", "PAGE", move |page| {
            let _ = tx.send((page, thread::current().name().map(str::to_string)));
        });
        navigator.results().deposit("PAGE", "3");

        let (page, thread_name) = rx.recv_timeout(Duration::from_secs(2))?;
        assert_eq!(page, 3);
        assert_eq!(thread_name.as_deref(), Some("navigator-main"));

        drop(runtime);
        Ok(())
    }
}
