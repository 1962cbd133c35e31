//! Object storage for kiln.
//!
//! Every persisted entity is a [`StoredObject`]: an id, a kind tag and the
//! serialized bytes. Typed access goes through [`BitObject`], the closed set
//! of object kinds:
//!
//! - [`Source`] -- file contents, addressed by content hash
//! - [`ComponentVersion`] -- an immutable tagged snapshot, `scope/name@version`
//! - [`Symlink`] -- indirection to the scope that now owns `scope/name`
//!
//! # Storage Backends
//!
//! All backends implement the [`ObjectStore`] trait:
//!
//! - [`InMemoryObjectStore`] -- map-based store for tests and embedding
//! - [`FsObjectStore`] -- one file per object, staged and renamed into place
//!
//! # Rules
//!
//! 1. Versions and sources are never overwritten with different content.
//! 2. Symlinks are replaced last-writer-wins.
//! 3. Re-writing identical bytes is a no-op.
//! 4. The store never interprets object contents on write.

pub mod error;
pub mod fs;
pub mod memory;
pub mod object;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use fs::FsObjectStore;
pub use memory::InMemoryObjectStore;
pub use object::{
    BitObject, ComponentVersion, ObjectKind, Source, SourceFileRef, StoredObject, Symlink,
    VersionLog,
};
pub use traits::{check_overwrite, ObjectIds, ObjectStore, PutOutcome};
