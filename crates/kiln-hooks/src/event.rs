use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::HookError;

/// Whether an event fires before or after its operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HookPhase {
    Pre,
    Post,
}

/// Operations wrapped by a pre/post event pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operation {
    Tag,
    TagAll,
    Import,
    Export,
    SendObjects,
    ReceiveObjects,
    DeprecateRemote,
    RemoveRemote,
    /// Deleting a component's versions and the symlinks that reach them.
    Remove,
}

impl Operation {
    pub const ALL: [Operation; 9] = [
        Self::Tag,
        Self::TagAll,
        Self::Import,
        Self::Export,
        Self::SendObjects,
        Self::ReceiveObjects,
        Self::DeprecateRemote,
        Self::RemoveRemote,
        Self::Remove,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tag => "tag",
            Self::TagAll => "tag-all",
            Self::Import => "import",
            Self::Export => "export",
            Self::SendObjects => "send-objects",
            Self::ReceiveObjects => "receive-objects",
            Self::DeprecateRemote => "deprecate-remote",
            Self::RemoveRemote => "remove-remote",
            Self::Remove => "remove",
        }
    }

    pub fn pre(&self) -> HookEvent {
        HookEvent::new(*self, HookPhase::Pre)
    }

    pub fn post(&self) -> HookEvent {
        HookEvent::new(*self, HookPhase::Post)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named lifecycle point, e.g. `pre-tag` or `post-receive-objects`.
///
/// The set of events is closed: every [`Operation`] has exactly one `pre-`
/// and one `post-` event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HookEvent {
    pub operation: Operation,
    pub phase: HookPhase,
}

impl HookEvent {
    pub const fn new(operation: Operation, phase: HookPhase) -> Self {
        Self { operation, phase }
    }

    /// Every event, pre before post, in operation order.
    pub fn all() -> impl Iterator<Item = HookEvent> {
        Operation::ALL
            .into_iter()
            .flat_map(|op| [op.pre(), op.post()])
    }

    pub fn is_pre(&self) -> bool {
        self.phase == HookPhase::Pre
    }

    /// Wire name such as `pre-tag`.
    pub fn name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for HookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = match self.phase {
            HookPhase::Pre => "pre",
            HookPhase::Post => "post",
        };
        write!(f, "{phase}-{}", self.operation)
    }
}

impl FromStr for HookEvent {
    type Err = HookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (phase, rest) = if let Some(rest) = s.strip_prefix("pre-") {
            (HookPhase::Pre, rest)
        } else if let Some(rest) = s.strip_prefix("post-") {
            (HookPhase::Post, rest)
        } else {
            return Err(HookError::UnknownEvent(s.to_string()));
        };
        Operation::ALL
            .into_iter()
            .find(|op| op.as_str() == rest)
            .map(|op| HookEvent::new(op, phase))
            .ok_or_else(|| HookError::UnknownEvent(s.to_string()))
    }
}

impl TryFrom<String> for HookEvent {
    type Error = HookError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<HookEvent> for String {
    fn from(e: HookEvent) -> Self {
        e.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_names_are_closed_set() {
        let names: Vec<String> = HookEvent::all().map(|e| e.name()).collect();
        assert_eq!(
            names,
            vec![
                "pre-tag",
                "post-tag",
                "pre-tag-all",
                "post-tag-all",
                "pre-import",
                "post-import",
                "pre-export",
                "post-export",
                "pre-send-objects",
                "post-send-objects",
                "pre-receive-objects",
                "post-receive-objects",
                "pre-deprecate-remote",
                "post-deprecate-remote",
                "pre-remove-remote",
                "post-remove-remote",
                "pre-remove",
                "post-remove",
            ]
        );
    }

    #[test]
    fn parse_roundtrip() {
        for event in HookEvent::all() {
            assert_eq!(event.name().parse::<HookEvent>().unwrap(), event);
        }
    }

    #[test]
    fn parse_rejects_unknown() {
        for bad in ["tag", "pre-", "pre-merge", "during-tag", "post-tagall", "pre-remove-"] {
            assert!(bad.parse::<HookEvent>().is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn pre_and_post_pair() {
        let op = Operation::SendObjects;
        assert!(op.pre().is_pre());
        assert!(!op.post().is_pre());
        assert_eq!(op.pre().operation, op.post().operation);
    }
}
