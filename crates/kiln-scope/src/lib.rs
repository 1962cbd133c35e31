//! # kiln-scope
//!
//! The scope engine: a named aggregate of an object store, a catalog, a
//! remote registry and a hook dispatcher, with the operations that move
//! components through it.
//!
//! ```
//! # let rt = tokio::runtime::Runtime::new().unwrap();
//! # rt.block_on(async {
//! use kiln_scope::{Scope, TagRequest};
//! use kiln_types::BitId;
//!
//! let scope = Scope::in_memory("acme").unwrap();
//! scope
//!     .tag(TagRequest::new("button", "first cut").file("index.js", b"export {}".to_vec()))
//!     .await
//!     .unwrap();
//! let log = scope.log(&BitId::parse("button").unwrap()).unwrap();
//! assert_eq!(log[0].version.to_string(), "0.0.1");
//! # });
//! ```

pub mod api;
pub mod catalog;
pub mod config;
pub mod endpoint;
pub mod error;
mod persist;
pub mod remotes;
pub mod resolver;
pub mod scope;
pub mod tag;

pub use api::get_component_logs;
pub use catalog::{Catalog, CatalogEntry, CATALOG_FILE};
pub use config::{HooksConfig, ScopeConfig, CONFIG_FILE};
pub use endpoint::{loopback_remote, ScopeEndpoint};
pub use error::{ErrorKind, OpContext, ScopeError, ScopeResult};
pub use remotes::{RemoteEntry, RemoteRegistry, REMOTES_FILE};
pub use resolver::{Resolved, Resolver};
pub use scope::{ExportReport, ImportReport, RejectedObject, RemoveReport, Scope};
pub use tag::{LogEntry, NewVersion, SourceFile, TagRequest};
