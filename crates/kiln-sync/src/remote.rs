use std::sync::Arc;

use tracing::debug;

use kiln_protocol::{FetchItem, KilnMessage, PutResult, PROTOCOL_VERSION};
use kiln_store::StoredObject;
use kiln_types::BitId;

use crate::error::{SyncError, SyncResult};
use crate::transport::RemoteTransport;

/// A named remote scope reachable through a transport.
#[derive(Clone)]
pub struct Remote {
    name: String,
    transport: Arc<dyn RemoteTransport>,
}

impl Remote {
    pub fn new(name: impl Into<String>, transport: Arc<dyn RemoteTransport>) -> Self {
        Self {
            name: name.into(),
            transport,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    async fn call(&self, msg: KilnMessage) -> SyncResult<KilnMessage> {
        debug!(remote = %self.name, message = msg.type_name(), "sending request");
        match self.transport.request(msg).await? {
            KilnMessage::Error { code, message } => Err(SyncError::Remote { code, message }),
            other => Ok(other),
        }
    }

    /// Exchange protocol versions. Returns the remote's scope name.
    pub async fn hello(&self, local_scope: &str) -> SyncResult<String> {
        let msg = KilnMessage::Hello {
            version: PROTOCOL_VERSION,
            scope: local_scope.to_string(),
        };
        match self.call(msg).await? {
            KilnMessage::HelloAck { version, scope } if version == PROTOCOL_VERSION => Ok(scope),
            KilnMessage::HelloAck { version, .. } => Err(SyncError::VersionMismatch {
                local: PROTOCOL_VERSION,
                remote: version,
            }),
            other => Err(unexpected("HelloAck", &other)),
        }
    }

    /// Ask the remote for the objects behind each identifier.
    pub async fn fetch(&self, ids: &[BitId]) -> SyncResult<Vec<FetchItem>> {
        let msg = KilnMessage::FetchRequest { ids: ids.to_vec() };
        match self.call(msg).await? {
            KilnMessage::FetchResponse { items } => Ok(items),
            other => Err(unexpected("FetchResponse", &other)),
        }
    }

    /// Send objects to the remote. Returns one result per object.
    pub async fn put(&self, objects: Vec<StoredObject>) -> SyncResult<Vec<PutResult>> {
        match self.call(KilnMessage::PutRequest { objects }).await? {
            KilnMessage::PutResponse { results } => Ok(results),
            other => Err(unexpected("PutResponse", &other)),
        }
    }
}

impl std::fmt::Debug for Remote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Remote").field("name", &self.name).finish()
    }
}

fn unexpected(expected: &'static str, got: &KilnMessage) -> SyncError {
    SyncError::UnexpectedResponse {
        expected,
        got: got.type_name(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use kiln_protocol::error_codes;

    use crate::transport::{LoopbackTransport, RequestHandler};

    struct Fixed(KilnMessage);

    #[async_trait]
    impl RequestHandler for Fixed {
        async fn handle(&self, _msg: KilnMessage) -> KilnMessage {
            self.0.clone()
        }
    }

    fn remote(reply: KilnMessage) -> Remote {
        Remote::new("origin", Arc::new(LoopbackTransport::new(Arc::new(Fixed(reply)))))
    }

    #[tokio::test]
    async fn hello_returns_remote_scope() {
        let r = remote(KilnMessage::HelloAck {
            version: PROTOCOL_VERSION,
            scope: "acme".into(),
        });
        assert_eq!(r.hello("home").await.unwrap(), "acme");
    }

    #[tokio::test]
    async fn hello_version_mismatch() {
        let r = remote(KilnMessage::HelloAck {
            version: PROTOCOL_VERSION + 1,
            scope: "acme".into(),
        });
        assert!(matches!(
            r.hello("home").await,
            Err(SyncError::VersionMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn error_reply_becomes_remote_error() {
        let r = remote(KilnMessage::error(error_codes::INTERNAL, "disk full"));
        let err = r.fetch(&[BitId::parse("acme/x").unwrap()]).await.unwrap_err();
        assert!(matches!(err, SyncError::Remote { code: 500, .. }));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn wrong_reply_type() {
        let r = remote(KilnMessage::FetchResponse { items: vec![] });
        assert!(matches!(
            r.put(vec![]).await,
            Err(SyncError::UnexpectedResponse { expected: "PutResponse", .. })
        ));
    }
}
