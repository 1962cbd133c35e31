//! Foundation types for kiln.
//!
//! This crate provides the identity and versioning types shared by every
//! other kiln crate.
//!
//! # Key Types
//!
//! - [`BitId`] — Component identifier: `[scope/]name[@version]`
//! - [`ComponentKey`] — A fully scoped `(scope, name)` pair, the unit of history
//! - [`Version`] — Semantic version of a tagged component
//! - [`ReleaseType`] — Which version component a tag bumps
//! - [`ObjectId`] — Store key of any persisted object

pub mod error;
pub mod identity;
pub mod names;
pub mod object;
pub mod version;

pub use error::TypeError;
pub use identity::{BitId, ComponentKey, VersionSpec, LATEST, SCOPE_DELIMITER, VERSION_DELIMITER};
pub use names::{validate_component_name, validate_remote_name, validate_scope_name};
pub use object::ObjectId;
pub use version::{ReleaseType, Version};
