use std::fmt;

use kiln_hooks::HookError;
use kiln_store::StoreError;
use kiln_sync::SyncError;
use kiln_types::TypeError;
use thiserror::Error;

/// Coarse classification of a [`ScopeError`], for callers that branch on
/// the kind of failure rather than its details.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Integrity,
    CyclicSymlink,
    Validation,
    Transient,
    HookAbort,
    Remote,
    Storage,
    Config,
}

#[derive(Debug, Error)]
pub enum ScopeError {
    #[error("component not found: {0}")]
    NotFound(String),

    #[error("integrity check failed for {id}: {reason}")]
    Integrity { id: String, reason: String },

    #[error("symlink chain from {id} exceeds {max_hops} hops")]
    CyclicSymlink { id: String, max_hops: usize },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("transient failure after {attempts} attempts: {source}")]
    Transient {
        attempts: u32,
        #[source]
        source: SyncError,
    },

    #[error("aborted by hook: {0}")]
    HookAbort(#[from] HookError),

    #[error("remote error: {0}")]
    Sync(#[from] SyncError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("invalid identifier: {0}")]
    Type(#[from] TypeError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Any of the above, tagged with the operation and target it came from.
    #[error("{op} {target}: {source}")]
    Operation {
        op: &'static str,
        target: String,
        #[source]
        source: Box<ScopeError>,
    },
}

impl ScopeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Integrity { .. } => ErrorKind::Integrity,
            Self::CyclicSymlink { .. } => ErrorKind::CyclicSymlink,
            Self::Validation(_) | Self::Type(_) => ErrorKind::Validation,
            Self::Transient { .. } => ErrorKind::Transient,
            Self::HookAbort(_) => ErrorKind::HookAbort,
            Self::Sync(e) if e.is_transient() => ErrorKind::Transient,
            Self::Sync(SyncError::Verification { .. }) => ErrorKind::Integrity,
            Self::Sync(_) => ErrorKind::Remote,
            Self::Store(StoreError::NotFound(_)) => ErrorKind::NotFound,
            Self::Store(
                StoreError::Conflict { .. }
                | StoreError::IdMismatch { .. }
                | StoreError::CorruptObject { .. },
            ) => ErrorKind::Integrity,
            Self::Store(_) | Self::Io(_) => ErrorKind::Storage,
            Self::Config(_) => ErrorKind::Config,
            Self::Operation { source, .. } => source.kind(),
        }
    }

    /// Tag the error with the operation and target it belongs to. Errors
    /// that already carry context are returned unchanged.
    pub fn context(self, op: &'static str, target: impl fmt::Display) -> Self {
        match self {
            Self::Operation { .. } => self,
            other => Self::Operation {
                op,
                target: target.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// The error without its operation context.
    pub fn root(&self) -> &ScopeError {
        match self {
            Self::Operation { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Attach operation context to any result whose error converts into
/// [`ScopeError`].
pub trait OpContext<T> {
    fn op_context(self, op: &'static str, target: impl fmt::Display) -> ScopeResult<T>;
}

impl<T, E: Into<ScopeError>> OpContext<T> for Result<T, E> {
    fn op_context(self, op: &'static str, target: impl fmt::Display) -> ScopeResult<T> {
        self.map_err(|e| e.into().context(op, target))
    }
}

pub type ScopeResult<T> = Result<T, ScopeError>;

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_types::ObjectId;

    #[test]
    fn kind_maps_lower_layers() {
        let conflict = ScopeError::from(StoreError::Conflict {
            id: ObjectId::new("a/b@0.0.1"),
            kind: kiln_store::ObjectKind::Version,
        });
        assert_eq!(conflict.kind(), ErrorKind::Integrity);

        let timeout = ScopeError::from(SyncError::Timeout(std::time::Duration::from_secs(1)));
        assert_eq!(timeout.kind(), ErrorKind::Transient);

        let missing = ScopeError::from(StoreError::NotFound(ObjectId::new("x")));
        assert_eq!(missing.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn context_wraps_once_and_keeps_kind() {
        let err = ScopeError::NotFound("home/button".into())
            .context("log", "home/button")
            .context("import", "ignored");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "log home/button: component not found: home/button");
        assert!(matches!(err.root(), ScopeError::NotFound(_)));
    }

    #[test]
    fn op_context_on_results() {
        let r: Result<(), StoreError> = Err(StoreError::EmptyId);
        let err = r.op_context("tag", "home/x").unwrap_err();
        assert!(err.to_string().starts_with("tag home/x:"));
        assert_eq!(err.kind(), ErrorKind::Storage);
    }
}
