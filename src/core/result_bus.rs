use std::sync::Arc;

use futures::{
    stream::{self, BoxStream},
    StreamExt,
};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::watch;

use crate::domain::codec::{self, CodecError};
use crate::infrastructure::result_store::{ResultEntry, ResultStore};

/// Key-addressed handoff of results from a later screen back to an earlier one.
///
/// Cloning is cheap; clones share the same store.
#[derive(Debug, Clone, Default)]
pub struct ResultBus {
    store: Arc<ResultStore>,
}

struct Subscription {
    key: String,
    single_shot: bool,
    /// `None` only while the subscription is being dropped
    rx: Option<watch::Receiver<Option<ResultEntry>>>,
    store: Arc<ResultStore>,
    started: bool,
}

impl Subscription {
    async fn next(&mut self) -> Option<Option<String>> {
        let rx = self.rx.as_mut()?;
        if self.started {
            rx.changed().await.ok()?;
        }
        self.started = true;

        let current = rx.borrow_and_update().clone();
        let emitted = match current {
            Some(entry) if self.single_shot => {
                // None when another single-shot subscriber took it first
                self.store
                    .take(&self.key, entry.seq())
                    .then_some(entry.value)
            }
            Some(entry) => Some(entry.value),
            None => None,
        };
        Some(emitted)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        drop(self.rx.take());
        self.store.release(&self.key);
    }
}

impl ResultBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deposit(&self, key: &str, value: impl Into<String>) {
        let seq = self.store.insert(key, value.into());
        log::debug!("Deposited result for key {key} (seq {seq})");
    }

    pub fn deposit_as<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
    ) -> Result<(), CodecError> {
        self.deposit(key, codec::encode_value(value)?);
        Ok(())
    }

    /// Remove a result without observing it
    pub fn delete(&self, key: &str) -> bool {
        let existed = self.store.delete(key);
        if existed {
            log::debug!("Deleted result for key {key}");
        }
        existed
    }

    /// Non-consuming read of the current value
    pub fn peek(&self, key: &str) -> Option<String> {
        self.store.get(key).map(|entry| entry.value)
    }

    /// Observe `key`: emits the current state first, then each change.
    ///
    /// With `single_shot`, an observed value is removed from the bus, so any
    /// other observer sees `None` for it.
    pub fn subscribe(&self, key: &str, single_shot: bool) -> BoxStream<'static, Option<String>> {
        let subscription = Subscription {
            key: key.to_string(),
            single_shot,
            rx: Some(self.store.watch(key)),
            store: Arc::clone(&self.store),
            started: false,
        };
        stream::unfold(subscription, |mut sub| async move {
            let item = sub.next().await?;
            Some((item, sub))
        })
        .boxed()
    }

    /// Typed [`ResultBus::subscribe`]; undecodable values are emitted as `None`
    pub fn subscribe_as<T>(&self, key: &str, single_shot: bool) -> BoxStream<'static, Option<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.subscribe(key, single_shot)
            .map(|raw| raw.and_then(|raw| codec::decode_value(&raw)))
            .boxed()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use serde::Deserialize;
    use tokio::time::timeout;

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct PriceRange {
        min: u32,
        max: u32,
    }

    const WAIT: Duration = Duration::from_secs(2);

    #[tokio::test]
    async fn test_subscribe_emits_absent_then_value() {
        let bus = ResultBus::new();
        let mut results = bus.subscribe("FILTER_RESULT", false);

        assert_eq!(results.next().await, Some(None));

        bus.deposit("FILTER_RESULT", "{\"min\":10,\"max\":50}");
        let next = timeout(WAIT, results.next()).await.ok().flatten();
        assert_eq!(next, Some(Some("{\"min\":10,\"max\":50}".to_string())));
    }

    #[tokio::test]
    async fn test_single_shot_consumes_entry() {
        let bus = ResultBus::new();
        bus.deposit("key", "value");

        let mut first = bus.subscribe("key", true);
        assert_eq!(first.next().await, Some(Some("value".to_string())));
        assert_eq!(bus.peek("key"), None);

        let mut second = bus.subscribe("key", true);
        assert_eq!(second.next().await, Some(None));
    }

    #[tokio::test]
    async fn test_sticky_read_keeps_entry() {
        let bus = ResultBus::new();
        bus.deposit("key", "value");

        let mut first = bus.subscribe("key", false);
        assert_eq!(first.next().await, Some(Some("value".to_string())));

        let mut second = bus.subscribe("key", false);
        assert_eq!(second.next().await, Some(Some("value".to_string())));
        assert_eq!(bus.peek("key"), Some("value".to_string()));
    }

    #[tokio::test]
    async fn test_new_deposit_after_consumption_is_visible() {
        let bus = ResultBus::new();
        bus.deposit("key", "v1");
        let mut first = bus.subscribe("key", true);
        assert_eq!(first.next().await, Some(Some("v1".to_string())));

        bus.deposit("key", "v2");
        let mut second = bus.subscribe("key", true);
        assert_eq!(second.next().await, Some(Some("v2".to_string())));
    }

    #[tokio::test]
    async fn test_concurrent_single_shot_delivers_once() {
        let bus = ResultBus::new();
        let mut a = bus.subscribe("key", true);
        let mut b = bus.subscribe("key", true);
        assert_eq!(a.next().await, Some(None));
        assert_eq!(b.next().await, Some(None));

        bus.deposit("key", "value");
        let from_a = timeout(WAIT, a.next()).await.ok().flatten().flatten();
        let from_b = timeout(WAIT, b.next()).await.ok().flatten().flatten();

        let delivered: Vec<_> = [from_a, from_b].into_iter().flatten().collect();
        assert_eq!(delivered, vec!["value".to_string()]);
    }

    #[tokio::test]
    async fn test_typed_round_trip() -> Result<(), CodecError> {
        let bus = ResultBus::new();
        bus.deposit_as("FILTER_RESULT", &PriceRange { min: 10, max: 50 })?;

        let mut results = bus.subscribe_as::<PriceRange>("FILTER_RESULT", true);
        assert_eq!(
            results.next().await,
            Some(Some(PriceRange { min: 10, max: 50 }))
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_typed_decode_failure_is_absent() {
        let bus = ResultBus::new();
        bus.deposit("FILTER_RESULT", "not json");

        let mut results = bus.subscribe_as::<PriceRange>("FILTER_RESULT", true);
        assert_eq!(results.next().await, Some(None));
    }

    #[tokio::test]
    async fn test_delete_clears_without_observing() {
        let bus = ResultBus::new();
        bus.deposit("key", "value");
        assert!(bus.delete("key"));
        assert!(bus.is_empty());

        let mut results = bus.subscribe("key", true);
        assert_eq!(results.next().await, Some(None));
    }

    #[tokio::test]
    async fn test_dropped_subscriptions_leave_no_slots() {
        let bus = ResultBus::new();
        for i in 0..20 {
            let mut results = bus.subscribe(&format!("KEY_{i}"), false);
            assert_eq!(results.next().await, Some(None));
        }

        bus.deposit("PAGE", "2");
        let mut results = bus.subscribe("PAGE", true);
        assert_eq!(results.next().await, Some(Some("2".to_string())));
        drop(results);

        assert_eq!(bus.store.slot_count(), 0);
    }
}
