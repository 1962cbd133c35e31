//! Remote transfer for kiln.
//!
//! Moves component objects between scopes. A [`Remote`] wraps a
//! [`RemoteTransport`]; the serving scope implements [`RequestHandler`].
//! Everything fetched passes through [`SyncVerifier`] before it is stored.

pub mod error;
pub mod remote;
pub mod transport;
pub mod verifier;

pub use error::{SyncError, SyncResult};
pub use remote::Remote;
pub use transport::{
    serve_stream, LoopbackTransport, RemoteTransport, RequestHandler, StreamTransport,
    TransportStats, DEFAULT_REQUEST_TIMEOUT,
};
pub use verifier::{FetchedComponent, SyncVerifier};
