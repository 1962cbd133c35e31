use serde::{Deserialize, Serialize};

use kiln_store::StoredObject;
use kiln_types::{BitId, ObjectId};

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;

/// All message types in the kiln protocol.
///
/// Every exchange is one request answered by one response:
/// `Hello -> HelloAck`, `FetchRequest -> FetchResponse`,
/// `PutRequest -> PutResponse`. Either side may answer with `Error`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum KilnMessage {
    Hello { version: u32, scope: String },
    HelloAck { version: u32, scope: String },
    FetchRequest { ids: Vec<BitId> },
    FetchResponse { items: Vec<FetchItem> },
    PutRequest { objects: Vec<StoredObject> },
    PutResponse { results: Vec<PutResult> },
    Error { code: u32, message: String },
}

/// Answer for one requested identifier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FetchItem {
    /// The objects needed to materialize `requested`: any symlinks followed,
    /// the component version, and its sources.
    Found {
        requested: BitId,
        objects: Vec<StoredObject>,
    },
    Missing { requested: BitId },
}

impl FetchItem {
    pub fn requested(&self) -> &BitId {
        match self {
            Self::Found { requested, .. } | Self::Missing { requested } => requested,
        }
    }
}

/// Why the receiving side refused an object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RejectReason {
    /// A different object already exists under the id.
    Conflict,
    /// The object did not parse or its content does not match its id.
    Malformed,
    /// A receive hook vetoed the batch.
    HookRejected,
    /// The receiving store failed.
    Storage,
}

impl RejectReason {
    pub fn code(&self) -> u32 {
        match self {
            Self::Conflict => error_codes::CONFLICT,
            Self::Malformed => error_codes::BAD_REQUEST,
            Self::HookRejected => error_codes::HOOK_REJECTED,
            Self::Storage => error_codes::INTERNAL,
        }
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Conflict => "conflict",
            Self::Malformed => "malformed",
            Self::HookRejected => "hook-rejected",
            Self::Storage => "storage",
        };
        f.write_str(s)
    }
}

/// Per-object answer to a `PutRequest`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PutResult {
    /// The object is persisted on the receiving side.
    Accepted { id: ObjectId },
    Rejected {
        id: ObjectId,
        reason: RejectReason,
        detail: String,
    },
}

impl PutResult {
    pub fn id(&self) -> &ObjectId {
        match self {
            Self::Accepted { id } | Self::Rejected { id, .. } => id,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

impl KilnMessage {
    pub fn type_tag(&self) -> u8 {
        match self {
            Self::Hello { .. } => 1,
            Self::HelloAck { .. } => 2,
            Self::FetchRequest { .. } => 3,
            Self::FetchResponse { .. } => 4,
            Self::PutRequest { .. } => 5,
            Self::PutResponse { .. } => 6,
            Self::Error { .. } => 255,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Hello { .. } => "Hello",
            Self::HelloAck { .. } => "HelloAck",
            Self::FetchRequest { .. } => "FetchRequest",
            Self::FetchResponse { .. } => "FetchResponse",
            Self::PutRequest { .. } => "PutRequest",
            Self::PutResponse { .. } => "PutResponse",
            Self::Error { .. } => "Error",
        }
    }

    pub fn error(code: u32, message: impl Into<String>) -> Self {
        Self::Error {
            code,
            message: message.into(),
        }
    }
}

/// Codes carried by `KilnMessage::Error` and `RejectReason::code`.
pub mod error_codes {
    pub const BAD_REQUEST: u32 = 400;
    pub const HOOK_REJECTED: u32 = 403;
    pub const NOT_FOUND: u32 = 404;
    pub const CONFLICT: u32 = 409;
    pub const VERSION_MISMATCH: u32 = 426;
    pub const INTERNAL: u32 = 500;
}
