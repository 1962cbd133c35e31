use std::process::Stdio;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::context::HookContext;
use crate::error::{HookError, HookResult};
use crate::event::HookEvent;

/// Environment variable carrying the event name to external hook commands.
pub const HOOK_EVENT_ENV: &str = "KILN_HOOK_EVENT";
/// Environment variable carrying the scope name to external hook commands.
pub const HOOK_SCOPE_ENV: &str = "KILN_SCOPE";

/// A lifecycle hook handler.
///
/// Returning an error from a pre-event aborts the operation; errors from
/// post-events are reported but the operation stays committed.
#[async_trait]
pub trait HookHandler: Send + Sync {
    /// Name used in logs and error reports.
    fn name(&self) -> &str;

    async fn handle(&self, event: HookEvent, ctx: &HookContext) -> HookResult<()>;
}

// ---------------------------------------------------------------------------
// FnHook
// ---------------------------------------------------------------------------

/// Adapts a synchronous closure into a handler.
pub struct FnHook<F> {
    name: String,
    f: F,
}

impl<F> FnHook<F>
where
    F: Fn(HookEvent, &HookContext) -> HookResult<()> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

#[async_trait]
impl<F> HookHandler for FnHook<F>
where
    F: Fn(HookEvent, &HookContext) -> HookResult<()> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, event: HookEvent, ctx: &HookContext) -> HookResult<()> {
        (self.f)(event, ctx)
    }
}

// ---------------------------------------------------------------------------
// ProcessHook
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ProcessPayload<'a> {
    event: HookEvent,
    #[serde(flatten)]
    context: &'a HookContext,
}

/// Runs an external command for each event.
///
/// The command line is split on whitespace; the first word is the program.
/// The event and context are written to the command's stdin as one JSON
/// object, and the event name is also exported in [`HOOK_EVENT_ENV`]. A
/// non-zero exit status is a failure.
pub struct ProcessHook {
    name: String,
    command: String,
}

impl ProcessHook {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

#[async_trait]
impl HookHandler for ProcessHook {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, event: HookEvent, ctx: &HookContext) -> HookResult<()> {
        let mut words = self.command.split_whitespace();
        let program = words
            .next()
            .ok_or_else(|| HookError::Rejected(format!("hook '{}' has an empty command", self.name)))?;
        let payload = serde_json::to_vec(&ProcessPayload {
            event,
            context: ctx,
        })?;

        let spawn_err = |source| HookError::Spawn {
            command: self.command.clone(),
            source,
        };
        let mut child = Command::new(program)
            .args(words)
            .env(HOOK_EVENT_ENV, event.name())
            .env(HOOK_SCOPE_ENV, &ctx.scope)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(spawn_err)?;

        if let Some(mut stdin) = child.stdin.take() {
            // A command that exits without reading its input is not an error.
            if let Err(e) = stdin.write_all(&payload).await {
                debug!(hook = %self.name, error = %e, "hook command closed stdin early");
            }
        }
        let output = child.wait_with_output().await.map_err(spawn_err)?;
        if output.status.success() {
            return Ok(());
        }
        Err(HookError::Process {
            command: self.command.clone(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// RecordingHook
// ---------------------------------------------------------------------------

/// Shared log of `"{handler}:{event}"` entries written by [`RecordingHook`].
pub type HookLog = Arc<Mutex<Vec<String>>>;

/// Records every invocation into a shared log, optionally failing.
pub struct RecordingHook {
    name: String,
    log: HookLog,
    fail_with: Option<String>,
}

impl RecordingHook {
    pub fn new(name: impl Into<String>, log: HookLog) -> Self {
        Self {
            name: name.into(),
            log,
            fail_with: None,
        }
    }

    /// Fail every invocation with `reason` after recording it.
    pub fn failing(mut self, reason: impl Into<String>) -> Self {
        self.fail_with = Some(reason.into());
        self
    }

    pub fn new_log() -> HookLog {
        Arc::new(Mutex::new(Vec::new()))
    }
}

#[async_trait]
impl HookHandler for RecordingHook {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, event: HookEvent, _ctx: &HookContext) -> HookResult<()> {
        self.log
            .lock()
            .expect("lock poisoned")
            .push(format!("{}:{event}", self.name));
        match &self.fail_with {
            Some(reason) => Err(HookError::Rejected(reason.clone())),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Operation;

    #[tokio::test]
    async fn fn_hook_runs_closure() {
        let hook = FnHook::new("deny-export", |event: HookEvent, ctx: &HookContext| {
            if event == Operation::Export.pre() && ctx.remote.as_deref() == Some("prod") {
                Err(HookError::Rejected("no exports to prod".into()))
            } else {
                Ok(())
            }
        });
        let ctx = HookContext::new("home").with_remote("prod");
        assert!(hook.handle(Operation::Export.pre(), &ctx).await.is_err());
        assert!(hook.handle(Operation::Import.pre(), &ctx).await.is_ok());
        assert_eq!(hook.name(), "deny-export");
    }

    #[tokio::test]
    async fn recording_hook_records_then_fails() {
        let log = RecordingHook::new_log();
        let hook = RecordingHook::new("h1", log.clone()).failing("nope");
        let err = hook
            .handle(Operation::Tag.pre(), &HookContext::new("s"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "nope");
        assert_eq!(*log.lock().unwrap(), vec!["h1:pre-tag".to_string()]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn process_hook_success_and_failure() {
        let ctx = HookContext::new("home").with_ids(["home/button@0.0.1"]);
        let ok = ProcessHook::new("ok", "true");
        ok.handle(Operation::Export.post(), &ctx).await.unwrap();

        let bad = ProcessHook::new("bad", "false");
        let err = bad.handle(Operation::Export.post(), &ctx).await.unwrap_err();
        assert!(matches!(err, HookError::Process { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn process_hook_missing_program() {
        let hook = ProcessHook::new("missing", "/definitely/not/a/kiln/hook");
        let err = hook
            .handle(Operation::Import.post(), &HookContext::new("s"))
            .await
            .unwrap_err();
        assert!(matches!(err, HookError::Spawn { .. }));
    }

    #[tokio::test]
    async fn process_hook_empty_command() {
        let hook = ProcessHook::new("empty", "   ");
        assert!(hook
            .handle(Operation::Tag.post(), &HookContext::new("s"))
            .await
            .is_err());
    }
}
