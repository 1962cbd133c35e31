use thiserror::Error;

use crate::version::{ReleaseType, Version};

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid component id {id:?}: {reason}")]
    InvalidId { id: String, reason: String },

    #[error("invalid name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    #[error("invalid version: {0}")]
    InvalidVersion(String),

    #[error("invalid release type: {0} (expected patch, minor or major)")]
    InvalidReleaseType(String),

    #[error("no {release} release after {version}: version number overflows")]
    VersionOverflow { version: Version, release: ReleaseType },
}
