use crate::event::HookEvent;

/// Errors from hook handlers and the dispatcher.
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    /// A handler refused the operation.
    #[error("{0}")]
    Rejected(String),

    /// A pre-hook failed; the operation must not proceed.
    #[error("{event} hook '{handler}' aborted the operation: {reason}")]
    Aborted {
        event: HookEvent,
        handler: String,
        reason: String,
    },

    /// An external hook command exited unsuccessfully.
    #[error("hook command '{command}' failed ({status}): {stderr}")]
    Process {
        command: String,
        status: String,
        stderr: String,
    },

    /// An external hook command could not be started.
    #[error("failed to run hook command '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("hook context serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unknown hook event: {0}")]
    UnknownEvent(String),
}

/// Result alias for hook operations.
pub type HookResult<T> = Result<T, HookError>;
