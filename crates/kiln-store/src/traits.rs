use kiln_types::ObjectId;

use crate::error::{StoreError, StoreResult};
use crate::object::{BitObject, StoredObject};

/// Lazy sequence of ids returned by [`ObjectStore::list`].
pub type ObjectIds<'a> = Box<dyn Iterator<Item = StoreResult<ObjectId>> + Send + 'a>;

/// What a successful `put` did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PutOutcome {
    /// No object existed under the id.
    Written,
    /// Identical bytes were already stored.
    Unchanged,
    /// A supersedable object was replaced.
    Superseded,
}

/// Decide whether `incoming` may be written over `existing`.
///
/// Identical content is a no-op, supersedable kinds are replaced, and any
/// other difference is a [`StoreError::Conflict`].
pub fn check_overwrite(
    existing: Option<&StoredObject>,
    incoming: &StoredObject,
) -> StoreResult<PutOutcome> {
    if incoming.id.is_empty() {
        return Err(StoreError::EmptyId);
    }
    match existing {
        None => Ok(PutOutcome::Written),
        Some(old) if old.kind == incoming.kind && old.data == incoming.data => {
            Ok(PutOutcome::Unchanged)
        }
        Some(old) if old.kind == incoming.kind && incoming.kind.is_supersedable() => {
            Ok(PutOutcome::Superseded)
        }
        Some(old) => Err(StoreError::Conflict {
            id: incoming.id.clone(),
            kind: old.kind,
        }),
    }
}

/// Keyed object store.
///
/// All implementations must satisfy these invariants:
/// - A stored version or source is never replaced by different content.
/// - Writes to the same id are serialized; distinct ids never conflict.
/// - Readers never observe a partially written object.
/// - All I/O errors are propagated, never silently ignored.
pub trait ObjectStore: Send + Sync {
    /// Read an object. Missing ids are [`StoreError::NotFound`].
    fn get(&self, id: &ObjectId) -> StoreResult<StoredObject>;

    /// Write an object under its id, subject to [`check_overwrite`].
    fn put(&self, object: &StoredObject) -> StoreResult<PutOutcome>;

    /// Check whether an object exists in the store.
    fn exists(&self, id: &ObjectId) -> StoreResult<bool>;

    /// Ids starting with `prefix`. Each call starts a fresh sequence.
    fn list(&self, prefix: &str) -> StoreResult<ObjectIds<'_>>;

    /// Delete an object by id. Returns `true` if the object existed.
    fn delete(&self, id: &ObjectId) -> StoreResult<bool>;

    /// Read an object, mapping `NotFound` to `None`.
    fn try_get(&self, id: &ObjectId) -> StoreResult<Option<StoredObject>> {
        match self.get(id) {
            Ok(obj) => Ok(Some(obj)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Write several objects, checking all of them before writing any.
    ///
    /// Backends holding a write lock override this to make the check and
    /// the writes one critical section.
    fn put_batch(&self, objects: &[StoredObject]) -> StoreResult<Vec<PutOutcome>> {
        for obj in objects {
            check_overwrite(self.try_get(&obj.id)?.as_ref(), obj)?;
        }
        objects.iter().map(|obj| self.put(obj)).collect()
    }

    /// Read and decode a typed object.
    fn load(&self, id: &ObjectId) -> StoreResult<BitObject> {
        BitObject::from_stored_object(&self.get(id)?)
    }

    /// Encode and write a typed object.
    fn store(&self, object: &BitObject) -> StoreResult<PutOutcome> {
        self.put(&object.to_stored_object()?)
    }
}
