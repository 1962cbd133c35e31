//! Lifecycle hooks for kiln.
//!
//! Every mutating or network operation of a scope is wrapped by a pair of
//! events, `pre-<op>` and `post-<op>`. Pre-handlers can veto the operation;
//! post-handlers observe its result and cannot undo it.
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use kiln_hooks::{FnHook, HookContext, HookDispatcher, HookError, HookEvent, Operation};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let hooks = HookDispatcher::new();
//! hooks.register(
//!     Operation::Export.pre(),
//!     Arc::new(FnHook::new("freeze", |_: HookEvent, _: &HookContext| {
//!         Err(HookError::Rejected("exports are frozen".into()))
//!     })),
//! );
//! let ctx = HookContext::new("home").with_remote("origin");
//! assert!(hooks.run_pre(Operation::Export.pre(), &ctx).await.is_err());
//! # });
//! ```

pub mod context;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod handler;

pub use context::HookContext;
pub use dispatcher::{HookDispatcher, HookFailure, PostHookReport};
pub use error::{HookError, HookResult};
pub use event::{HookEvent, HookPhase, Operation};
pub use handler::{FnHook, HookHandler, HookLog, ProcessHook, RecordingHook, HOOK_EVENT_ENV, HOOK_SCOPE_ENV};
