//! Content hashing for kiln.
//!
//! Source blobs are addressed by the domain-separated BLAKE3 digest of their
//! contents. The filesystem store names object files by a plain digest of
//! the object id.

pub mod hasher;

pub use hasher::ContentHasher;
