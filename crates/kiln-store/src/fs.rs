use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tempfile::NamedTempFile;
use tracing::debug;
use walkdir::WalkDir;

use kiln_crypto::ContentHasher;
use kiln_types::ObjectId;

use crate::error::{StoreError, StoreResult};
use crate::object::StoredObject;
use crate::traits::{check_overwrite, ObjectIds, ObjectStore, PutOutcome};

/// Directory holding object files, relative to the store root.
pub const OBJECTS_DIR: &str = "objects";
/// Directory holding staging files, relative to the store root.
pub const TMP_DIR: &str = "tmp";

/// Durable object store: one file per object.
///
/// On-disk layout:
/// ```text
/// <root>/objects/<aa>/<bbbb...>   bincode-encoded StoredObject
/// <root>/tmp/                     staging files
/// ```
/// where `aabbbb...` is the hex BLAKE3 digest of the object id. Every write
/// goes to a staging file in `tmp/` that is synced and then renamed over the
/// final path, so readers see either the old object or the new one.
pub struct FsObjectStore {
    objects: PathBuf,
    tmp: PathBuf,
    /// Serializes check-then-write sequences.
    write_lock: Mutex<()>,
}

impl FsObjectStore {
    /// Open (or create) a store rooted at `root`.
    pub fn open(root: &Path) -> StoreResult<Self> {
        let objects = root.join(OBJECTS_DIR);
        let tmp = root.join(TMP_DIR);
        fs::create_dir_all(&objects)?;
        fs::create_dir_all(&tmp)?;
        Ok(Self {
            objects,
            tmp,
            write_lock: Mutex::new(()),
        })
    }

    fn path_for(&self, id: &ObjectId) -> PathBuf {
        let digest = hex::encode(ContentHasher::raw_hash(id.as_str().as_bytes()));
        let (fanout, rest) = digest.split_at(2);
        self.objects.join(fanout).join(rest)
    }

    fn read_file(path: &Path) -> StoreResult<Option<StoredObject>> {
        match fs::read(path) {
            Ok(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn read_object(&self, id: &ObjectId) -> StoreResult<Option<StoredObject>> {
        let Some(obj) = Self::read_file(&self.path_for(id))? else {
            return Ok(None);
        };
        if obj.id != *id {
            return Err(StoreError::CorruptObject {
                id: id.clone(),
                reason: format!("file holds object {}", obj.id),
            });
        }
        Ok(Some(obj))
    }

    fn write_object(&self, object: &StoredObject) -> StoreResult<()> {
        let path = self.path_for(&object.id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut staged = NamedTempFile::new_in(&self.tmp)?;
        staged.write_all(&bincode::serialize(object)?)?;
        staged.as_file().sync_all()?;
        staged.persist(&path).map_err(|e| StoreError::Io(e.error))?;
        debug!(id = %object.id, kind = %object.kind, bytes = object.size(), "object written");
        Ok(())
    }

    fn put_locked(&self, object: &StoredObject) -> StoreResult<PutOutcome> {
        let outcome = check_overwrite(self.read_object(&object.id)?.as_ref(), object)?;
        if outcome != PutOutcome::Unchanged {
            self.write_object(object)?;
        }
        Ok(outcome)
    }

    /// Root of the object files.
    pub fn objects_dir(&self) -> &Path {
        &self.objects
    }
}

impl ObjectStore for FsObjectStore {
    fn get(&self, id: &ObjectId) -> StoreResult<StoredObject> {
        self.read_object(id)?
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    fn put(&self, object: &StoredObject) -> StoreResult<PutOutcome> {
        let _guard = self.write_lock.lock().expect("lock poisoned");
        self.put_locked(object)
    }

    fn exists(&self, id: &ObjectId) -> StoreResult<bool> {
        Ok(self.path_for(id).is_file())
    }

    fn list(&self, prefix: &str) -> StoreResult<ObjectIds<'_>> {
        let prefix = prefix.to_string();
        let iter = WalkDir::new(&self.objects)
            .min_depth(2)
            .max_depth(2)
            .into_iter()
            .filter_map(move |entry| {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => return Some(Err(StoreError::Io(e.into()))),
                };
                if !entry.file_type().is_file() {
                    return None;
                }
                match Self::read_file(entry.path()) {
                    Ok(Some(obj)) if obj.id.starts_with(&prefix) => Some(Ok(obj.id)),
                    // Removed between the directory scan and the read.
                    Ok(_) => None,
                    Err(e) => Some(Err(e)),
                }
            });
        Ok(Box::new(iter))
    }

    fn delete(&self, id: &ObjectId) -> StoreResult<bool> {
        let _guard = self.write_lock.lock().expect("lock poisoned");
        match fs::remove_file(self.path_for(id)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn put_batch(&self, objects: &[StoredObject]) -> StoreResult<Vec<PutOutcome>> {
        let _guard = self.write_lock.lock().expect("lock poisoned");
        let outcomes = objects
            .iter()
            .map(|obj| check_overwrite(self.read_object(&obj.id)?.as_ref(), obj))
            .collect::<StoreResult<Vec<_>>>()?;
        for (obj, outcome) in objects.iter().zip(&outcomes) {
            if *outcome != PutOutcome::Unchanged {
                self.write_object(obj)?;
            }
        }
        Ok(outcomes)
    }
}

impl std::fmt::Debug for FsObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsObjectStore")
            .field("objects", &self.objects)
            .finish()
    }
}
