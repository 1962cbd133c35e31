//! Serving side of the remote protocol for a [`Scope`].

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, warn};

use kiln_hooks::Operation;
use kiln_protocol::{error_codes, FetchItem, KilnMessage, PutResult, RejectReason, PROTOCOL_VERSION};
use kiln_store::{BitObject, ObjectKind, StoreError, StoredObject};
use kiln_sync::{LoopbackTransport, Remote, RequestHandler};
use kiln_types::{BitId, ObjectId};

use crate::error::{ErrorKind, ScopeResult};
use crate::resolver::Resolved;
use crate::scope::Scope;

/// Answers fetch and put requests from peers against a local scope.
pub struct ScopeEndpoint {
    scope: Arc<Scope>,
}

impl ScopeEndpoint {
    pub fn new(scope: Arc<Scope>) -> Self {
        Self { scope }
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    fn hello(&self, version: u32, peer: &str) -> KilnMessage {
        if version != PROTOCOL_VERSION {
            return KilnMessage::error(
                error_codes::VERSION_MISMATCH,
                format!("protocol {version} not supported, expected {PROTOCOL_VERSION}"),
            );
        }
        debug!(scope = self.scope.name(), peer, "hello");
        KilnMessage::HelloAck {
            version: PROTOCOL_VERSION,
            scope: self.scope.name().to_string(),
        }
    }

    async fn fetch(&self, ids: Vec<BitId>) -> KilnMessage {
        let ctx = self.scope.hook_context().with_ids(&ids);
        if let Err(e) = self.scope.hooks().run_pre(Operation::SendObjects.pre(), &ctx).await {
            return KilnMessage::error(error_codes::HOOK_REJECTED, e.to_string());
        }

        let mut items = Vec::with_capacity(ids.len());
        let mut sent = 0usize;
        for id in ids {
            let resolved = match self.scope.resolver().resolve(&id) {
                Ok(resolved) => resolved,
                Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::CyclicSymlink) => {
                    debug!(op = "send-objects", id = %id, error = %e, "not served");
                    items.push(FetchItem::Missing { requested: id });
                    continue;
                }
                Err(e) => return KilnMessage::error(error_codes::INTERNAL, e.to_string()),
            };
            match self.collect(&resolved) {
                Ok(objects) => {
                    sent += objects.len();
                    items.push(FetchItem::Found {
                        requested: id,
                        objects,
                    });
                }
                Err(e) => return KilnMessage::error(error_codes::INTERNAL, e.to_string()),
            }
        }

        let ctx = ctx.with_result(json!({ "objects": sent }));
        self.scope.run_post(Operation::SendObjects.post(), &ctx).await;
        KilnMessage::FetchResponse { items }
    }

    /// Objects a peer needs for `resolved`: sources, the version, then the
    /// symlinks that led to it.
    fn collect(&self, resolved: &Resolved) -> ScopeResult<Vec<StoredObject>> {
        let store = self.scope.store();
        let mut objects = Vec::new();
        for id in resolved.object_ids() {
            objects.push(store.get(&id)?);
        }
        for link in &resolved.symlinks {
            objects.push(BitObject::Symlink(link.clone()).to_stored_object()?);
        }
        Ok(objects)
    }

    async fn receive(&self, objects: Vec<StoredObject>) -> KilnMessage {
        let ctx = self
            .scope
            .hook_context()
            .with_ids(objects.iter().map(|o| &o.id));
        if let Err(e) = self.scope.hooks().run_pre(Operation::ReceiveObjects.pre(), &ctx).await {
            let results = objects
                .into_iter()
                .map(|o| PutResult::Rejected {
                    id: o.id,
                    reason: RejectReason::HookRejected,
                    detail: e.to_string(),
                })
                .collect();
            return KilnMessage::PutResponse { results };
        }

        let results = self.write_received(&objects);
        let accepted: Vec<&ObjectId> = results
            .iter()
            .filter(|r| r.is_accepted())
            .map(PutResult::id)
            .collect();
        let ctx = ctx.with_result(json!({ "accepted": accepted }));
        self.scope.run_post(Operation::ReceiveObjects.post(), &ctx).await;
        KilnMessage::PutResponse { results }
    }

    /// Store received objects: sources first, then versions, then symlinks.
    /// A version is accepted only if all of its sources are stored.
    fn write_received(&self, objects: &[StoredObject]) -> Vec<PutResult> {
        let store = self.scope.store();
        let catalog = self.scope.catalog();
        let mut results: Vec<Option<PutResult>> = vec![None; objects.len()];
        let mut decoded: Vec<(usize, BitObject)> = Vec::with_capacity(objects.len());

        for (i, obj) in objects.iter().enumerate() {
            match BitObject::from_stored_object(obj) {
                Ok(parsed) => decoded.push((i, parsed)),
                Err(e) => results[i] = Some(rejected(&obj.id, RejectReason::Malformed, e.to_string())),
            }
        }
        decoded.sort_by_key(|(_, obj)| match obj.kind() {
            ObjectKind::Source => 0,
            ObjectKind::Version => 1,
            ObjectKind::Symlink => 2,
        });

        let mut stored_sources: BTreeSet<ObjectId> = BTreeSet::new();
        for (i, parsed) in decoded {
            let obj = &objects[i];
            if let BitObject::Version(version) = &parsed {
                let missing = version.files.iter().find(|f| {
                    !stored_sources.contains(&f.file) && !store.exists(&f.file).unwrap_or(false)
                });
                if let Some(file) = missing {
                    results[i] = Some(rejected(
                        &obj.id,
                        RejectReason::Malformed,
                        format!("source {} for {} is missing", file.file.short(), file.relative_path),
                    ));
                    continue;
                }
            }

            let outcome = store.put(obj).map_err(|e| match e {
                StoreError::Conflict { .. } => (RejectReason::Conflict, e.to_string()),
                other => (RejectReason::Storage, other.to_string()),
            });
            let linked = outcome.and_then(|_| {
                let link = match &parsed {
                    BitObject::Source(_) => {
                        stored_sources.insert(obj.id.clone());
                        Ok(())
                    }
                    BitObject::Version(v) => catalog.link_version(&v.key(), v.version),
                    BitObject::Symlink(s) => catalog.link_symlink(&s.key(), &s.real_scope).map(|_| ()),
                };
                link.map_err(|e| (RejectReason::Storage, e.to_string()))
            });
            results[i] = Some(match linked {
                Ok(()) => PutResult::Accepted { id: obj.id.clone() },
                Err((reason, detail)) => {
                    warn!(op = "receive-objects", id = %obj.id, %reason, %detail, "object rejected");
                    rejected(&obj.id, reason, detail)
                }
            });
        }

        results
            .into_iter()
            .zip(objects)
            .map(|(r, obj)| {
                r.unwrap_or_else(|| rejected(&obj.id, RejectReason::Storage, "not processed".into()))
            })
            .collect()
    }
}

fn rejected(id: &ObjectId, reason: RejectReason, detail: String) -> PutResult {
    PutResult::Rejected {
        id: id.clone(),
        reason,
        detail,
    }
}

#[async_trait]
impl RequestHandler for ScopeEndpoint {
    async fn handle(&self, msg: KilnMessage) -> KilnMessage {
        match msg {
            KilnMessage::Hello { version, scope } => self.hello(version, &scope),
            KilnMessage::FetchRequest { ids } => self.fetch(ids).await,
            KilnMessage::PutRequest { objects } => self.receive(objects).await,
            other => KilnMessage::error(
                error_codes::BAD_REQUEST,
                format!("{} is not a request", other.type_name()),
            ),
        }
    }
}

/// A [`Remote`] named `name` that reaches `served` in-process.
///
/// The transport is returned as well so callers can read its traffic
/// counters.
pub fn loopback_remote(
    name: &str,
    served: Arc<Scope>,
    timeout: Duration,
) -> (Remote, Arc<LoopbackTransport>) {
    let endpoint = Arc::new(ScopeEndpoint::new(served));
    let transport = Arc::new(LoopbackTransport::new(endpoint).with_timeout(timeout));
    (Remote::new(name, transport.clone()), transport)
}
