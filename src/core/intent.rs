use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
    time::Instant,
};

use strum::Display;

use crate::core::surface::{NavError, Surface};
use crate::domain::route::Target;

static NEXT_INTENT_ID: AtomicU64 = AtomicU64::new(1);

/// Creation stamp of an intent, unique and increasing within the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IntentId(u64);

impl IntentId {
    fn next() -> Self {
        Self(NEXT_INTENT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for IntentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub type CustomAction = Box<dyn FnOnce(&mut dyn Surface) -> Result<(), NavError> + Send>;

/// What an intent does to the surface
pub enum NavAction {
    GoTo(Target),
    GoBack,
    GoBackTo {
        target: Target,
        inclusive: bool,
    },
    GoToClearingStack(Target),
    /// Replace the current destination with `target`
    GoBackAndGoTo(Target),
    /// Deposit `value` under `key`, then pop to `target` (or one step back)
    GoBackWithResult {
        key: String,
        value: String,
        target: Option<Target>,
    },
    Custom(CustomAction),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum IntentKind {
    GoTo,
    GoBack,
    GoBackTo,
    GoToClearingStack,
    GoBackAndGoTo,
    GoBackWithResult,
    Custom,
}

impl NavAction {
    pub fn kind(&self) -> IntentKind {
        match self {
            NavAction::GoTo(_) => IntentKind::GoTo,
            NavAction::GoBack => IntentKind::GoBack,
            NavAction::GoBackTo { .. } => IntentKind::GoBackTo,
            NavAction::GoToClearingStack(_) => IntentKind::GoToClearingStack,
            NavAction::GoBackAndGoTo(_) => IntentKind::GoBackAndGoTo,
            NavAction::GoBackWithResult { .. } => IntentKind::GoBackWithResult,
            NavAction::Custom(_) => IntentKind::Custom,
        }
    }
}

impl fmt::Debug for NavAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NavAction::GoTo(target) => f.debug_tuple("GoTo").field(target).finish(),
            NavAction::GoBack => f.write_str("GoBack"),
            NavAction::GoBackTo { target, inclusive } => f
                .debug_struct("GoBackTo")
                .field("target", target)
                .field("inclusive", inclusive)
                .finish(),
            NavAction::GoToClearingStack(target) => {
                f.debug_tuple("GoToClearingStack").field(target).finish()
            }
            NavAction::GoBackAndGoTo(target) => {
                f.debug_tuple("GoBackAndGoTo").field(target).finish()
            }
            NavAction::GoBackWithResult { key, target, .. } => f
                .debug_struct("GoBackWithResult")
                .field("key", key)
                .field("target", target)
                .finish_non_exhaustive(),
            NavAction::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// A queued unit of navigation work, consumed exactly once
pub struct NavigationIntent {
    id: IntentId,
    created_at: Instant,
    action: NavAction,
}

impl NavigationIntent {
    pub fn new(action: NavAction) -> Self {
        Self {
            id: IntentId::next(),
            created_at: Instant::now(),
            action,
        }
    }

    pub fn go_to(target: impl Into<Target>) -> Self {
        Self::new(NavAction::GoTo(target.into()))
    }

    pub fn go_back() -> Self {
        Self::new(NavAction::GoBack)
    }

    pub fn go_back_to(target: impl Into<Target>, inclusive: bool) -> Self {
        Self::new(NavAction::GoBackTo {
            target: target.into(),
            inclusive,
        })
    }

    pub fn go_to_clearing_stack(target: impl Into<Target>) -> Self {
        Self::new(NavAction::GoToClearingStack(target.into()))
    }

    pub fn go_back_and_go_to(target: impl Into<Target>) -> Self {
        Self::new(NavAction::GoBackAndGoTo(target.into()))
    }

    pub fn go_back_with_result(
        key: impl Into<String>,
        value: impl Into<String>,
        target: Option<Target>,
    ) -> Self {
        Self::new(NavAction::GoBackWithResult {
            key: key.into(),
            value: value.into(),
            target,
        })
    }

    pub fn custom<F>(action: F) -> Self
    where
        F: FnOnce(&mut dyn Surface) -> Result<(), NavError> + Send + 'static,
    {
        Self::new(NavAction::Custom(Box::new(action)))
    }

    pub fn id(&self) -> IntentId {
        self.id
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn kind(&self) -> IntentKind {
        self.action.kind()
    }

    pub fn action(&self) -> &NavAction {
        &self.action
    }

    pub fn into_action(self) -> NavAction {
        self.action
    }
}

impl PartialEq for NavigationIntent {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for NavigationIntent {}

impl fmt::Debug for NavigationIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NavigationIntent")
            .field("id", &self.id)
            .field("action", &self.action)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use rstest::*;

    use super::*;

    #[test]
    fn test_identical_intents_are_distinct() {
        let first = NavigationIntent::go_to("products");
        let second = NavigationIntent::go_to("products");
        assert_ne!(first, second);
        assert!(first.id() < second.id());
        assert!(first.created_at() <= second.created_at());
    }

    #[rstest]
    #[case(NavigationIntent::go_to("products"), IntentKind::GoTo)]
    #[case(NavigationIntent::go_back(), IntentKind::GoBack)]
    #[case(NavigationIntent::go_back_to("products", true), IntentKind::GoBackTo)]
    #[case(NavigationIntent::go_to_clearing_stack("login"), IntentKind::GoToClearingStack)]
    #[case(NavigationIntent::go_back_and_go_to("users"), IntentKind::GoBackAndGoTo)]
    #[case(
        NavigationIntent::go_back_with_result("FILTER_RESULT", "{}", None),
        IntentKind::GoBackWithResult
    )]
    #[case(NavigationIntent::custom(|_| Ok(())), IntentKind::Custom)]
    fn test_intent_kind(#[case] intent: NavigationIntent, #[case] expected: IntentKind) {
        assert_eq!(intent.kind(), expected);
    }

    #[test]
    fn test_result_value_is_not_debug_printed() {
        let intent = NavigationIntent::go_back_with_result("TOKEN", "secret-value", None);
        let printed = format!("{intent:?}");
        assert!(printed.contains("TOKEN"));
        assert!(!printed.contains("secret-value"));
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(IntentKind::GoBackWithResult.to_string(), "GoBackWithResult");
    }
}
