use std::collections::{BTreeMap, BTreeSet};

use kiln_store::{BitObject, ComponentVersion, StoredObject, Symlink};
use kiln_types::{BitId, ObjectId, VersionSpec};

use crate::error::{SyncError, SyncResult};

/// A fetched component whose objects all checked out.
#[derive(Clone, Debug)]
pub struct FetchedComponent {
    pub requested: BitId,
    pub version: ComponentVersion,
    /// Symlinks followed from the requested name to the version, in order.
    pub symlinks: Vec<Symlink>,
    /// Every verified object, sources first, then the version, then symlinks.
    pub objects: Vec<StoredObject>,
}

/// Verifies objects received from a remote before they are stored.
pub struct SyncVerifier;

impl SyncVerifier {
    /// Check the objects returned for `requested`.
    ///
    /// Every object must decode and hash to the id it claims. Starting at
    /// the requested name, symlinks are followed (at most `max_hops`) until
    /// a component version is reached; that version must match the
    /// requested version, and every source it references must be present.
    /// Objects not on that path are rejected. Unscoped names are taken to
    /// live in `remote_scope`.
    pub fn verify_fetched(
        requested: &BitId,
        remote_scope: &str,
        objects: Vec<StoredObject>,
        max_hops: usize,
    ) -> SyncResult<FetchedComponent> {
        let fail = |reason: String| SyncError::Verification {
            id: requested.clone(),
            reason,
        };

        let mut versions: BTreeMap<(String, String), Vec<ComponentVersion>> = BTreeMap::new();
        let mut symlinks: BTreeMap<ObjectId, Symlink> = BTreeMap::new();
        let mut sources: BTreeSet<ObjectId> = BTreeSet::new();
        let mut by_id: BTreeMap<ObjectId, StoredObject> = BTreeMap::new();

        for obj in objects {
            let decoded = BitObject::from_stored_object(&obj).map_err(|e| fail(e.to_string()))?;
            match decoded {
                BitObject::Source(_) => {
                    sources.insert(obj.id.clone());
                }
                BitObject::Version(v) => versions
                    .entry((v.scope.clone(), v.name.clone()))
                    .or_default()
                    .push(v),
                BitObject::Symlink(s) => {
                    symlinks.insert(s.id(), s);
                }
            }
            by_id.insert(obj.id.clone(), obj);
        }

        let mut key = requested.key_in(remote_scope);
        let mut followed = Vec::new();
        let version = loop {
            if let Some(candidates) = versions.get(&(key.scope.clone(), key.name.clone())) {
                let chosen = match requested.version {
                    VersionSpec::Exact(want) => candidates.iter().find(|v| v.version == want),
                    VersionSpec::Latest => candidates.iter().max_by_key(|v| v.version),
                };
                break chosen
                    .cloned()
                    .ok_or_else(|| fail(format!("response lacks version {} of {key}", requested.version)))?;
            }
            let Some(link) = symlinks.get(&key.object_id()) else {
                return Err(fail(format!("response does not contain {key}")));
            };
            if followed.len() >= max_hops {
                return Err(fail(format!("symlink chain exceeds {max_hops} hops")));
            }
            followed.push(link.clone());
            key = link.real_component_id().key_in(remote_scope);
        };

        let mut expected: BTreeSet<ObjectId> = BTreeSet::new();
        for file in &version.files {
            if !sources.contains(&file.file) {
                return Err(fail(format!(
                    "source {} for {} is missing",
                    file.file.short(),
                    file.relative_path
                )));
            }
            expected.insert(file.file.clone());
        }
        expected.insert(version.id());
        expected.extend(followed.iter().map(Symlink::id));
        if let Some(extra) = by_id.keys().find(|id| !expected.contains(*id)) {
            return Err(fail(format!("unexpected object {extra}")));
        }

        let mut ordered: Vec<StoredObject> = version
            .files
            .iter()
            .filter_map(|f| by_id.remove(&f.file))
            .collect();
        ordered.extend(by_id.remove(&version.id()));
        ordered.extend(followed.iter().filter_map(|s| by_id.remove(&s.id())));

        Ok(FetchedComponent {
            requested: requested.clone(),
            version,
            symlinks: followed,
            objects: ordered,
        })
    }
}
