use std::{
    any::Any,
    collections::VecDeque,
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    thread,
};

use color_eyre::eyre::{Result, WrapErr};
use tokio::{
    runtime::Handle,
    sync::{mpsc, oneshot},
};
use tokio_util::sync::CancellationToken;

use crate::core::{
    intent::{NavAction, NavigationIntent},
    result_bus::ResultBus,
    surface::{NavError, NavOptions, Surface},
};
use crate::domain::route::Target;
use crate::infrastructure::config::RouterConfig;

/// Generation number handed out by [`CommandRouter::attach`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttachmentId(u64);

enum RouterOp {
    Submit(NavigationIntent),
    Attach {
        id: AttachmentId,
        surface: Box<dyn Surface>,
    },
    /// `None` detaches whatever is attached
    Detach(Option<AttachmentId>),
    PendingLen(oneshot::Sender<usize>),
    Settle(oneshot::Sender<()>),
}

/// Caller-side handle of the navigation command router.
///
/// Every method only posts to the router actor, so it never blocks and can be
/// called from any thread. Intents run on the router thread, in submission
/// order, against whichever surface is attached at the time.
#[derive(Clone)]
pub struct CommandRouter {
    op_tx: mpsc::UnboundedSender<RouterOp>,
    attached: Arc<AtomicBool>,
    next_attachment: Arc<AtomicU64>,
}

impl fmt::Debug for CommandRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRouter")
            .field("attached", &self.is_attached())
            .field("stopped", &self.op_tx.is_closed())
            .finish()
    }
}

impl CommandRouter {
    fn post(&self, op: RouterOp) -> bool {
        self.op_tx.send(op).is_ok()
    }

    pub fn submit(&self, intent: NavigationIntent) {
        let (id, kind) = (intent.id(), intent.kind());
        if !self.post(RouterOp::Submit(intent)) {
            log::warn!("Router stopped; dropping {kind} intent {id}");
        }
    }

    pub fn go_to(&self, target: impl Into<Target>) {
        self.submit(NavigationIntent::go_to(target));
    }

    pub fn go_back(&self) {
        self.submit(NavigationIntent::go_back());
    }

    pub fn go_back_to(&self, target: impl Into<Target>, inclusive: bool) {
        self.submit(NavigationIntent::go_back_to(target, inclusive));
    }

    pub fn go_to_clearing_stack(&self, target: impl Into<Target>) {
        self.submit(NavigationIntent::go_to_clearing_stack(target));
    }

    pub fn go_back_and_go_to(&self, target: impl Into<Target>) {
        self.submit(NavigationIntent::go_back_and_go_to(target));
    }

    /// The result is deposited when the intent executes, not now
    pub fn go_back_with_result(
        &self,
        key: impl Into<String>,
        value: impl Into<String>,
        target: Option<Target>,
    ) {
        self.submit(NavigationIntent::go_back_with_result(key, value, target));
    }

    pub fn run<F>(&self, action: F)
    where
        F: FnOnce(&mut dyn Surface) -> Result<(), NavError> + Send + 'static,
    {
        self.submit(NavigationIntent::custom(action));
    }

    /// Attach `surface`, replacing any surface that is still attached.
    ///
    /// Pending intents are flushed onto it before any intent submitted later.
    pub fn attach(&self, surface: impl Surface) -> AttachmentId {
        let id = AttachmentId(self.next_attachment.fetch_add(1, Ordering::Relaxed));
        if !self.post(RouterOp::Attach {
            id,
            surface: Box::new(surface),
        }) {
            log::warn!("Router stopped; surface {id:?} was not attached");
        }
        id
    }

    pub fn detach(&self) {
        self.post(RouterOp::Detach(None));
    }

    /// Detach only if `id` is still the attached surface
    pub fn release(&self, id: AttachmentId) {
        self.post(RouterOp::Detach(Some(id)));
    }

    /// Attachment state as of the last attach/detach the router processed
    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::SeqCst)
    }

    /// Number of intents waiting for a surface; 0 if the router has stopped
    pub async fn pending_len(&self) -> usize {
        let (tx, rx) = oneshot::channel();
        if !self.post(RouterOp::PendingLen(tx)) {
            return 0;
        }
        rx.await.unwrap_or(0)
    }

    /// Resolves once every operation posted before this call has been processed
    pub async fn settled(&self) {
        let (tx, rx) = oneshot::channel();
        if self.post(RouterOp::Settle(tx)) {
            let _ = rx.await;
        }
    }
}

struct ActiveSurface {
    id: AttachmentId,
    surface: Box<dyn Surface>,
}

/// The router actor: sole owner of the pending queue and the attached surface
pub struct RouterService {
    config: RouterConfig,
    results: ResultBus,
    op_rx: mpsc::UnboundedReceiver<RouterOp>,
    cancel_token: CancellationToken,
    attached: Arc<AtomicBool>,
    active: Option<ActiveSurface>,
    pending: VecDeque<NavigationIntent>,
}

pub type NewRouterService = (
    CommandRouter,     // handle for callers
    CancellationToken, // shutdown signal
    RouterService,
);

impl RouterService {
    pub fn new(results: ResultBus, config: RouterConfig) -> NewRouterService {
        let (op_tx, op_rx) = mpsc::unbounded_channel();
        let cancel_token = CancellationToken::new();
        let attached = Arc::new(AtomicBool::new(false));

        let router = CommandRouter {
            op_tx,
            attached: Arc::clone(&attached),
            next_attachment: Arc::new(AtomicU64::new(1)),
        };
        let service = Self {
            config,
            results,
            op_rx,
            cancel_token: cancel_token.clone(),
            attached,
            active: None,
            pending: VecDeque::new(),
        };
        (router, cancel_token, service)
    }

    /// Run the actor on its own named thread with a single-threaded runtime.
    ///
    /// The returned handle spawns onto that runtime, so tasks spawned through it
    /// run on the router thread for as long as the router is running.
    pub fn spawn(self) -> Result<(thread::JoinHandle<()>, Handle)> {
        let name = self.config.main_thread_name.clone();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .wrap_err("Failed to build router runtime")?;
        let handle = runtime.handle().clone();
        let thread = thread::Builder::new()
            .name(name.clone())
            .spawn(move || runtime.block_on(self.run()))
            .wrap_err_with(|| format!("Failed to spawn router thread {name}"))?;
        Ok((thread, handle))
    }

    /// Main actor loop; ends on cancellation or when every handle is dropped
    pub async fn run(mut self) {
        log::info!("Router started");
        loop {
            tokio::select! {
                op = self.op_rx.recv() => match op {
                    Some(op) => self.handle_op(op),
                    None => {
                        log::info!("All router handles dropped");
                        break;
                    }
                },

                _ = self.cancel_token.cancelled() => {
                    log::info!("Router received cancellation signal");
                    break;
                }
            }
        }
        let undeposited = self.shutdown();
        if !undeposited.is_empty() {
            log::warn!("{} results were never deposited", undeposited.len());
        }
    }

    fn handle_op(&mut self, op: RouterOp) {
        match op {
            RouterOp::Submit(intent) => self.submit(intent),
            RouterOp::Attach { id, surface } => self.attach(id, surface),
            RouterOp::Detach(id) => self.detach(id),
            RouterOp::PendingLen(reply) => {
                let _ = reply.send(self.pending.len());
            }
            RouterOp::Settle(reply) => {
                let _ = reply.send(());
            }
        }
    }

    fn submit(&mut self, intent: NavigationIntent) {
        if self.active.is_some() {
            self.execute(intent);
            return;
        }
        log::debug!("No surface attached; queueing {} intent {}", intent.kind(), intent.id());
        self.pending.push_back(intent);
        if self.pending.len() > self.config.pending_warn_threshold {
            log::warn!(
                "{} navigation intents waiting for a surface",
                self.pending.len()
            );
        }
    }

    fn attach(&mut self, id: AttachmentId, surface: Box<dyn Surface>) {
        if let Some(previous) = self.active.take() {
            log::info!("Surface {:?} replaced by {id:?} without detach", previous.id);
        }
        self.active = Some(ActiveSurface { id, surface });
        self.attached.store(true, Ordering::SeqCst);
        log::info!("Surface {id:?} attached");

        if self.pending.is_empty() {
            return;
        }
        log::debug!("Executing {} pending intents", self.pending.len());
        while let Some(intent) = self.pending.pop_front() {
            self.execute(intent);
        }
    }

    fn detach(&mut self, id: Option<AttachmentId>) {
        let Some(active) = &self.active else {
            return;
        };
        if id.is_some_and(|id| id != active.id) {
            log::debug!("Ignoring release of stale surface {id:?}");
            return;
        }
        log::info!("Surface {:?} detached", active.id);
        self.active = None;
        self.attached.store(false, Ordering::SeqCst);
    }

    fn execute(&mut self, intent: NavigationIntent) {
        let Some(active) = self.active.as_mut() else {
            self.pending.push_back(intent);
            return;
        };
        let (id, kind) = (intent.id(), intent.kind());
        log::debug!("Executing {kind} intent {id}");
        let surface = active.surface.as_mut();
        let (results, config) = (&self.results, &self.config);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            apply(intent.into_action(), surface, results, config)
        }));
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::warn!("Navigation {kind} intent {id} failed: {e}"),
            Err(payload) => log::error!(
                "Navigation {kind} intent {id} panicked: {}",
                panic_message(payload.as_ref())
            ),
        }
    }

    /// Stop accepting operations and drop everything still waiting.
    ///
    /// Returns the result keys of `GoBackWithResult` intents that never ran.
    fn shutdown(&mut self) -> Vec<String> {
        self.op_rx.close();
        while let Ok(op) = self.op_rx.try_recv() {
            match op {
                RouterOp::Submit(intent) => self.pending.push_back(intent),
                RouterOp::Attach { id, .. } => {
                    log::debug!("Router stopping; surface {id:?} not attached");
                }
                RouterOp::Detach(_) => {}
                RouterOp::PendingLen(reply) => {
                    let _ = reply.send(self.pending.len());
                }
                RouterOp::Settle(reply) => {
                    let _ = reply.send(());
                }
            }
        }

        self.active = None;
        self.attached.store(false, Ordering::SeqCst);
        let mut undeposited = Vec::new();
        for intent in self.pending.drain(..) {
            match intent.action() {
                NavAction::GoBackWithResult { key, .. } => {
                    log::warn!(
                        "Dropping pending intent {}; result {key} was never deposited",
                        intent.id()
                    );
                    undeposited.push(key.clone());
                }
                _ => log::debug!("Dropping pending {} intent {}", intent.kind(), intent.id()),
            }
        }
        log::info!("Router stopped");
        undeposited
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// Carry out one action against the attached surface
fn apply(
    action: NavAction,
    surface: &mut dyn Surface,
    results: &ResultBus,
    config: &RouterConfig,
) -> Result<(), NavError> {
    match action {
        NavAction::GoTo(target) => {
            if config.skip_duplicate_destination
                && surface.current_destination().as_ref() == Some(target.route())
            {
                log::debug!("Already at {}; skipping navigation", target.route());
                return Ok(());
            }
            surface.navigate(&target, &NavOptions::default())
        }
        NavAction::GoBack => {
            if !surface.navigate_up()? {
                log::debug!("Back stack is already at its root");
            }
            Ok(())
        }
        NavAction::GoBackTo { target, inclusive } => {
            if !surface.pop_back_stack(&target, inclusive)? {
                log::debug!("Nothing popped going back to {}", target.route());
            }
            Ok(())
        }
        NavAction::GoToClearingStack(target) => {
            surface.navigate(&target, &NavOptions::clearing_stack())
        }
        NavAction::GoBackAndGoTo(target) => {
            let options = surface
                .previous_destination()
                .map(NavOptions::pop_up_to)
                .unwrap_or_default();
            surface.navigate(&target, &options)
        }
        NavAction::GoBackWithResult { key, value, target } => {
            results.deposit(&key, value);
            match target {
                Some(target) => surface.pop_back_stack(&target, false).map(|_| ()),
                None => surface.navigate_up().map(|_| ()),
            }
        }
        NavAction::Custom(action) => action(surface),
    }
}
