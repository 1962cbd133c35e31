//! Name resolution: from a [`BitId`] to a stored component version.
//!
//! Versions stored under a key win over a symlink at the same key. A
//! symlink is followed to its real scope with the requested version
//! carried along; chains longer than the hop bound are treated as cycles.

use kiln_store::{BitObject, ComponentVersion, ObjectKind, ObjectStore, StoreError, Symlink};
use kiln_types::{BitId, ComponentKey, ObjectId, Version, VersionSpec};

use crate::error::{ScopeError, ScopeResult};

/// A resolved identifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolved {
    pub requested: BitId,
    pub version: ComponentVersion,
    /// Symlinks followed to reach the version, in order.
    pub symlinks: Vec<Symlink>,
}

impl Resolved {
    /// Ids of the objects a peer needs to hold this version: sources first,
    /// then the version itself.
    pub fn object_ids(&self) -> Vec<ObjectId> {
        let mut ids: Vec<ObjectId> = self.version.files.iter().map(|f| f.file.clone()).collect();
        ids.push(self.version.id());
        ids
    }
}

/// Read-only view of a store for resolving identifiers.
pub struct Resolver<'a> {
    store: &'a dyn ObjectStore,
    local_scope: &'a str,
    max_hops: usize,
}

impl<'a> Resolver<'a> {
    pub fn new(store: &'a dyn ObjectStore, local_scope: &'a str, max_hops: usize) -> Self {
        Self {
            store,
            local_scope,
            max_hops,
        }
    }

    /// Versions stored for `key`, oldest first.
    pub fn versions(&self, key: &ComponentKey) -> ScopeResult<Vec<Version>> {
        let prefix = key.version_prefix();
        let mut versions = Vec::new();
        for id in self.store.list(&prefix)? {
            let id = id?;
            let suffix = &id.as_str()[prefix.len()..];
            match suffix.parse::<Version>() {
                Ok(v) => versions.push(v),
                Err(e) => {
                    return Err(ScopeError::Integrity {
                        id: id.to_string(),
                        reason: format!("bad version suffix: {e}"),
                    })
                }
            }
        }
        versions.sort();
        Ok(versions)
    }

    /// Follow symlinks from `id` to the key that holds its history.
    ///
    /// Stops at the first key that has versions or no symlink. The returned
    /// key may therefore have no versions at all.
    pub fn resolve_key(&self, id: &BitId) -> ScopeResult<(ComponentKey, Vec<Symlink>)> {
        let mut key = id.key_in(self.local_scope);
        let mut followed = Vec::new();
        loop {
            if !self.versions(&key)?.is_empty() {
                return Ok((key, followed));
            }
            let Some(link) = self.symlink_at(&key)? else {
                return Ok((key, followed));
            };
            if followed.len() >= self.max_hops {
                return Err(ScopeError::CyclicSymlink {
                    id: id.to_string(),
                    max_hops: self.max_hops,
                });
            }
            key = link.real_component_id().key_in(self.local_scope);
            followed.push(link);
        }
    }

    /// Resolve `id` to the requested version, or the latest one.
    pub fn resolve(&self, id: &BitId) -> ScopeResult<Resolved> {
        let (key, symlinks) = self.resolve_key(id)?;
        let versions = self.versions(&key)?;
        let version = match id.version {
            VersionSpec::Exact(v) if versions.contains(&v) => v,
            VersionSpec::Exact(v) => {
                return Err(ScopeError::NotFound(key.version_id(v).to_string()));
            }
            VersionSpec::Latest => match versions.last() {
                Some(v) => *v,
                None => return Err(ScopeError::NotFound(id.to_string())),
            },
        };
        Ok(Resolved {
            requested: id.clone(),
            version: self.load_version(&key.version_id(version))?,
            symlinks,
        })
    }

    pub fn load_version(&self, id: &ObjectId) -> ScopeResult<ComponentVersion> {
        match self.store.load(id)? {
            BitObject::Version(v) => Ok(v),
            other => Err(ScopeError::Integrity {
                id: id.to_string(),
                reason: format!("expected a version, found {}", other.kind()),
            }),
        }
    }

    fn symlink_at(&self, key: &ComponentKey) -> ScopeResult<Option<Symlink>> {
        let id = key.object_id();
        let Some(obj) = self.store.try_get(&id)? else {
            return Ok(None);
        };
        if obj.kind != ObjectKind::Symlink {
            return Ok(None);
        }
        match BitObject::from_stored_object(&obj)? {
            BitObject::Symlink(link) => Ok(Some(link)),
            _ => Err(StoreError::CorruptObject {
                id,
                reason: "symlink envelope holds another kind".into(),
            }
            .into()),
        }
    }
}
