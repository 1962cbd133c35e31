use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What a hook handler is told about the operation it wraps.
///
/// `result` is empty for pre-events and holds the operation's outcome for
/// post-events.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HookContext {
    /// Name of the scope running the operation.
    pub scope: String,
    /// Component identifiers or object ids involved.
    pub ids: Vec<String>,
    /// Remote name, for network operations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

impl HookContext {
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            ..Self::default()
        }
    }

    pub fn with_ids<I, T>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: ToString,
    {
        self.ids = ids.into_iter().map(|id| id.to_string()).collect();
        self
    }

    pub fn with_remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = Some(remote.into());
        self
    }

    pub fn with_result(mut self, result: Value) -> Self {
        self.result = Some(result);
        self
    }
}
