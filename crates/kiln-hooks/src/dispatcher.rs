use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::{debug, warn};

use crate::context::HookContext;
use crate::error::{HookError, HookResult};
use crate::event::HookEvent;
use crate::handler::HookHandler;

/// A post-hook handler that failed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HookFailure {
    pub handler: String,
    pub reason: String,
}

/// Outcome of running the post-handlers of one event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PostHookReport {
    pub event: HookEvent,
    pub failures: Vec<HookFailure>,
}

impl PostHookReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Routes lifecycle events to registered handlers.
///
/// Handlers for one event run sequentially in registration order. The
/// handler list is snapshotted before the first handler is awaited, so
/// registering a handler mid-dispatch affects only later dispatches.
#[derive(Default)]
pub struct HookDispatcher {
    handlers: RwLock<HashMap<HookEvent, Vec<Arc<dyn HookHandler>>>>,
}

impl HookDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler for `event`.
    pub fn register(&self, event: HookEvent, handler: Arc<dyn HookHandler>) {
        debug!(event = %event, handler = handler.name(), "hook registered");
        self.handlers
            .write()
            .expect("lock poisoned")
            .entry(event)
            .or_default()
            .push(handler);
    }

    /// Append one handler for several events.
    pub fn register_all(&self, events: impl IntoIterator<Item = HookEvent>, handler: Arc<dyn HookHandler>) {
        for event in events {
            self.register(event, Arc::clone(&handler));
        }
    }

    /// Number of handlers registered for `event`.
    pub fn handler_count(&self, event: HookEvent) -> usize {
        self.handlers
            .read()
            .expect("lock poisoned")
            .get(&event)
            .map_or(0, Vec::len)
    }

    fn snapshot(&self, event: HookEvent) -> Vec<Arc<dyn HookHandler>> {
        self.handlers
            .read()
            .expect("lock poisoned")
            .get(&event)
            .cloned()
            .unwrap_or_default()
    }

    /// Run pre-handlers. The first failure stops dispatch and is returned as
    /// [`HookError::Aborted`]; later handlers do not run.
    pub async fn run_pre(&self, event: HookEvent, ctx: &HookContext) -> HookResult<()> {
        for handler in self.snapshot(event) {
            if let Err(e) = handler.handle(event, ctx).await {
                warn!(event = %event, handler = handler.name(), error = %e, "pre-hook aborted operation");
                return Err(HookError::Aborted {
                    event,
                    handler: handler.name().to_string(),
                    reason: e.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Run every post-handler, collecting failures instead of stopping.
    pub async fn run_post(&self, event: HookEvent, ctx: &HookContext) -> PostHookReport {
        let mut failures = Vec::new();
        for handler in self.snapshot(event) {
            if let Err(e) = handler.handle(event, ctx).await {
                warn!(event = %event, handler = handler.name(), error = %e, "post-hook failed");
                failures.push(HookFailure {
                    handler: handler.name().to_string(),
                    reason: e.to_string(),
                });
            }
        }
        PostHookReport { event, failures }
    }
}

impl std::fmt::Debug for HookDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let map = self.handlers.read().expect("lock poisoned");
        let mut events: Vec<String> = map.keys().map(HookEvent::name).collect();
        events.sort();
        f.debug_struct("HookDispatcher").field("events", &events).finish()
    }
}
