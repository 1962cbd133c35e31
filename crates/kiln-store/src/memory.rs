use std::collections::BTreeMap;
use std::sync::RwLock;

use kiln_types::ObjectId;

use crate::error::{StoreError, StoreResult};
use crate::object::StoredObject;
use crate::traits::{check_overwrite, ObjectIds, ObjectStore, PutOutcome};

/// In-memory object store.
///
/// Intended for tests and embedding. Objects are kept in an ordered map
/// behind a `RwLock`, so `list` yields ids in lexicographic order.
pub struct InMemoryObjectStore {
    objects: RwLock<BTreeMap<ObjectId, StoredObject>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
        }
    }

    /// Number of objects currently stored.
    pub fn len(&self) -> usize {
        self.objects.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().expect("lock poisoned").is_empty()
    }

    /// Total bytes across all stored objects.
    pub fn total_bytes(&self) -> u64 {
        self.objects
            .read()
            .expect("lock poisoned")
            .values()
            .map(StoredObject::size)
            .sum()
    }

    /// All ids in sorted order.
    pub fn all_ids(&self) -> Vec<ObjectId> {
        self.objects
            .read()
            .expect("lock poisoned")
            .keys()
            .cloned()
            .collect()
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn get(&self, id: &ObjectId) -> StoreResult<StoredObject> {
        let map = self.objects.read().expect("lock poisoned");
        map.get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    fn put(&self, object: &StoredObject) -> StoreResult<PutOutcome> {
        let mut map = self.objects.write().expect("lock poisoned");
        let outcome = check_overwrite(map.get(&object.id), object)?;
        if outcome != PutOutcome::Unchanged {
            map.insert(object.id.clone(), object.clone());
        }
        Ok(outcome)
    }

    fn exists(&self, id: &ObjectId) -> StoreResult<bool> {
        Ok(self.objects.read().expect("lock poisoned").contains_key(id))
    }

    fn list(&self, prefix: &str) -> StoreResult<ObjectIds<'_>> {
        // Snapshot the matching keys so the lock is not held by the iterator.
        let map = self.objects.read().expect("lock poisoned");
        let ids: Vec<ObjectId> = map
            .range(ObjectId::new(prefix)..)
            .map(|(id, _)| id)
            .take_while(|id| id.starts_with(prefix))
            .cloned()
            .collect();
        Ok(Box::new(ids.into_iter().map(Ok)))
    }

    fn delete(&self, id: &ObjectId) -> StoreResult<bool> {
        let mut map = self.objects.write().expect("lock poisoned");
        Ok(map.remove(id).is_some())
    }

    fn put_batch(&self, objects: &[StoredObject]) -> StoreResult<Vec<PutOutcome>> {
        let mut map = self.objects.write().expect("lock poisoned");
        let outcomes = objects
            .iter()
            .map(|obj| check_overwrite(map.get(&obj.id), obj))
            .collect::<StoreResult<Vec<_>>>()?;
        for obj in objects {
            map.insert(obj.id.clone(), obj.clone());
        }
        Ok(outcomes)
    }
}

impl std::fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryObjectStore")
            .field("object_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::*;
    use kiln_types::{ComponentKey, Version};

    fn make_source(content: &[u8]) -> StoredObject {
        BitObject::from(Source::new(content.to_vec()))
            .to_stored_object()
            .unwrap()
    }

    fn make_version(message: &str) -> StoredObject {
        let v = ComponentVersion::new(
            &ComponentKey::new("acme", "button"),
            Version::new(0, 0, 1),
            vec![],
            vec![],
            VersionLog {
                message: message.into(),
                date: 0,
                username: None,
                email: None,
            },
        );
        BitObject::from(v).to_stored_object().unwrap()
    }

    fn make_symlink(real: &str) -> StoredObject {
        BitObject::from(Symlink::new("old", "foo", real))
            .to_stored_object()
            .unwrap()
    }

    #[test]
    fn put_and_get() {
        let store = InMemoryObjectStore::new();
        let obj = make_source(b"hello world");
        assert_eq!(store.put(&obj).unwrap(), PutOutcome::Written);
        assert_eq!(store.get(&obj.id).unwrap(), obj);
    }

    #[test]
    fn get_missing_is_not_found() {
        let store = InMemoryObjectStore::new();
        let id = ObjectId::new("acme/nope@0.0.1");
        assert!(matches!(store.get(&id), Err(StoreError::NotFound(_))));
        assert!(store.try_get(&id).unwrap().is_none());
    }

    #[test]
    fn identical_rewrite_is_noop() {
        let store = InMemoryObjectStore::new();
        let obj = make_version("first");
        store.put(&obj).unwrap();
        assert_eq!(store.put(&obj).unwrap(), PutOutcome::Unchanged);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn version_rewrite_with_different_content_conflicts() {
        let store = InMemoryObjectStore::new();
        store.put(&make_version("first")).unwrap();
        let err = store.put(&make_version("second")).unwrap_err();
        assert!(matches!(err, StoreError::Conflict { kind: ObjectKind::Version, .. }));
        let kept = store.load(&ObjectId::new("acme/button@0.0.1")).unwrap();
        assert_eq!(kept.as_version().unwrap().log.message, "first");
    }

    #[test]
    fn symlink_is_superseded() {
        let store = InMemoryObjectStore::new();
        store.put(&make_symlink("a")).unwrap();
        assert_eq!(store.put(&make_symlink("b")).unwrap(), PutOutcome::Superseded);
        let link = store.load(&ObjectId::new("old/foo")).unwrap();
        assert_eq!(link.as_symlink().unwrap().real_scope, "b");
    }

    #[test]
    fn empty_id_rejected() {
        let store = InMemoryObjectStore::new();
        let obj = StoredObject::new(ObjectId::new(""), ObjectKind::Source, vec![1]);
        assert!(matches!(store.put(&obj), Err(StoreError::EmptyId)));
    }

    #[test]
    fn list_by_prefix_is_sorted_and_restartable() {
        let store = InMemoryObjectStore::new();
        for id in ["acme/button@0.0.2", "acme/button@0.0.1", "acme/buttons@0.0.1", "acme/a@0.0.1"] {
            store
                .put(&StoredObject::new(ObjectId::new(id), ObjectKind::Source, vec![]))
                .unwrap();
        }
        let first: Vec<ObjectId> = store.list("acme/button@").unwrap().map(Result::unwrap).collect();
        assert_eq!(
            first,
            vec![ObjectId::new("acme/button@0.0.1"), ObjectId::new("acme/button@0.0.2")]
        );
        let again: Vec<ObjectId> = store.list("acme/button@").unwrap().map(Result::unwrap).collect();
        assert_eq!(first, again);
        assert_eq!(store.list("").unwrap().count(), 4);
    }

    #[test]
    fn put_batch_is_all_or_nothing() {
        let store = InMemoryObjectStore::new();
        store.put(&make_version("first")).unwrap();
        let batch = vec![make_source(b"new source"), make_version("different")];
        assert!(store.put_batch(&batch).is_err());
        assert!(!store.exists(&batch[0].id).unwrap());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn delete_reports_presence() {
        let store = InMemoryObjectStore::new();
        let obj = make_source(b"to-delete");
        store.put(&obj).unwrap();
        assert!(store.delete(&obj.id).unwrap());
        assert!(!store.exists(&obj.id).unwrap());
        assert!(!store.delete(&obj.id).unwrap());
    }

    #[test]
    fn total_bytes_and_ids() {
        let store = InMemoryObjectStore::default();
        assert!(store.is_empty());
        store.put(&make_source(b"12345")).unwrap();
        store.put(&make_source(b"123456789")).unwrap();
        assert_eq!(store.total_bytes(), 14);
        let ids = store.all_ids();
        assert!(ids.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn concurrent_reads_are_safe() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(InMemoryObjectStore::new());
        let obj = make_source(b"shared data");
        store.put(&obj).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                let id = obj.id.clone();
                thread::spawn(move || {
                    let loaded = store.load(&id).unwrap();
                    assert_eq!(loaded.id(), id);
                })
            })
            .collect();
        for h in handles {
            h.join().expect("thread should not panic");
        }
    }

    #[test]
    fn debug_format() {
        let store = InMemoryObjectStore::new();
        store.put(&make_source(b"x")).unwrap();
        let debug = format!("{store:?}");
        assert!(debug.contains("object_count"));
    }
}
