//! Index of the components a scope knows about.
//!
//! The catalog never points at objects that are not yet in the store:
//! callers link entries only after the objects are written.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::debug;

use kiln_types::{ComponentKey, Version};

use crate::error::ScopeResult;
use crate::persist::{read_json_or_default, write_json};

/// File name of the persisted catalog inside a scope directory.
pub const CATALOG_FILE: &str = "catalog.json";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CatalogEntry {
    /// Known to the scope but never tagged.
    Tracked,
    Versions { latest: Version },
    Symlink {
        #[serde(rename = "realScope")]
        real_scope: String,
    },
}

#[derive(Serialize, Deserialize)]
struct CatalogRecord {
    scope: String,
    name: String,
    #[serde(flatten)]
    entry: CatalogEntry,
}

/// Catalog of a scope, optionally persisted as JSON.
#[derive(Debug, Default)]
pub struct Catalog {
    entries: RwLock<BTreeMap<ComponentKey, CatalogEntry>>,
    path: Option<PathBuf>,
}

impl Catalog {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open the catalog stored at `path`; a missing file is an empty catalog.
    pub fn open(path: &Path) -> ScopeResult<Self> {
        let records: Vec<CatalogRecord> = read_json_or_default(path)?;
        let entries = records
            .into_iter()
            .map(|r| (ComponentKey::new(r.scope, r.name), r.entry))
            .collect();
        Ok(Self {
            entries: RwLock::new(entries),
            path: Some(path.to_path_buf()),
        })
    }

    pub fn get(&self, key: &ComponentKey) -> Option<CatalogEntry> {
        self.entries.read().expect("lock poisoned").get(key).cloned()
    }

    pub fn contains(&self, key: &ComponentKey) -> bool {
        self.entries.read().expect("lock poisoned").contains_key(key)
    }

    pub fn entries(&self) -> Vec<(ComponentKey, CatalogEntry)> {
        self.entries
            .read()
            .expect("lock poisoned")
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Register `key` without versions. Existing entries are left alone.
    /// Returns `true` if the entry is new.
    pub fn track(&self, key: &ComponentKey) -> ScopeResult<bool> {
        self.update(|entries| {
            if entries.contains_key(key) {
                return false;
            }
            entries.insert(key.clone(), CatalogEntry::Tracked);
            true
        })
    }

    /// Record that `version` of `key` is stored. The latest version only
    /// moves forward.
    pub fn link_version(&self, key: &ComponentKey, version: Version) -> ScopeResult<()> {
        self.update(|entries| {
            let latest = match entries.get(key) {
                Some(CatalogEntry::Versions { latest }) => (*latest).max(version),
                _ => version,
            };
            entries.insert(key.clone(), CatalogEntry::Versions { latest });
        })
    }

    /// Record a symlink at `key`. Versions stored under the key take
    /// precedence over a symlink, so a `Versions` entry is kept. Returns
    /// `true` if the entry now names the symlink.
    pub fn link_symlink(&self, key: &ComponentKey, real_scope: &str) -> ScopeResult<bool> {
        self.update(|entries| {
            if let Some(CatalogEntry::Versions { .. }) = entries.get(key) {
                return false;
            }
            entries.insert(
                key.clone(),
                CatalogEntry::Symlink {
                    real_scope: real_scope.to_string(),
                },
            );
            true
        })
    }

    /// Set the latest version of `key`, also backwards. Used after versions
    /// are removed.
    pub fn set_latest(&self, key: &ComponentKey, latest: Version) -> ScopeResult<()> {
        self.update(|entries| {
            entries.insert(key.clone(), CatalogEntry::Versions { latest });
        })
    }

    /// Drop the entry for `key`. Returns `true` if there was one.
    pub fn unlink(&self, key: &ComponentKey) -> ScopeResult<bool> {
        self.update(|entries| entries.remove(key).is_some())
    }

    /// Apply `f` to a copy of the entries, persist the copy, and only then
    /// make it current. A failed write leaves the catalog unchanged.
    fn update<T>(&self, f: impl FnOnce(&mut BTreeMap<ComponentKey, CatalogEntry>) -> T) -> ScopeResult<T> {
        let mut entries = self.entries.write().expect("lock poisoned");
        let mut next = entries.clone();
        let out = f(&mut next);
        if let Some(path) = &self.path {
            let records: Vec<CatalogRecord> = next
                .iter()
                .map(|(k, v)| CatalogRecord {
                    scope: k.scope.clone(),
                    name: k.name.clone(),
                    entry: v.clone(),
                })
                .collect();
            write_json(path, &records)?;
            debug!(entries = records.len(), path = %path.display(), "catalog persisted");
        }
        *entries = next;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str) -> ComponentKey {
        ComponentKey::new("acme", name)
    }

    #[test]
    fn track_is_idempotent_and_does_not_downgrade() {
        let catalog = Catalog::in_memory();
        assert!(catalog.track(&key("button")).unwrap());
        assert!(!catalog.track(&key("button")).unwrap());

        catalog.link_version(&key("button"), Version::new(0, 0, 1)).unwrap();
        catalog.track(&key("button")).unwrap();
        assert_eq!(
            catalog.get(&key("button")),
            Some(CatalogEntry::Versions { latest: Version::new(0, 0, 1) })
        );
    }

    #[test]
    fn latest_only_moves_forward() {
        let catalog = Catalog::in_memory();
        catalog.link_version(&key("x"), Version::new(0, 0, 2)).unwrap();
        catalog.link_version(&key("x"), Version::new(0, 0, 1)).unwrap();
        assert_eq!(
            catalog.get(&key("x")),
            Some(CatalogEntry::Versions { latest: Version::new(0, 0, 2) })
        );
    }

    #[test]
    fn persists_across_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CATALOG_FILE);
        {
            let catalog = Catalog::open(&path).unwrap();
            catalog.track(&key("a")).unwrap();
            catalog.link_version(&key("ui/b"), Version::new(1, 0, 0)).unwrap();
            catalog.link_symlink(&ComponentKey::new("old", "c"), "acme").unwrap();
        }
        let reopened = Catalog::open(&path).unwrap();
        assert_eq!(reopened.entries().len(), 3);
        assert_eq!(reopened.get(&key("a")), Some(CatalogEntry::Tracked));
        assert_eq!(
            reopened.get(&ComponentKey::new("old", "c")),
            Some(CatalogEntry::Symlink { real_scope: "acme".into() })
        );
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"realScope\": \"acme\""));
    }

    #[test]
    fn failed_write_leaves_entries_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scope").join(CATALOG_FILE);
        let catalog = Catalog::open(&path).unwrap();
        // A plain file where the catalog's directory should be.
        std::fs::write(dir.path().join("scope"), b"not a directory").unwrap();

        assert!(catalog.track(&key("button")).is_err());
        assert_eq!(catalog.get(&key("button")), None);
        assert!(catalog.entries().is_empty());
    }

    #[test]
    fn symlink_does_not_replace_versions() {
        let catalog = Catalog::in_memory();
        catalog.link_version(&key("button"), Version::new(0, 0, 1)).unwrap();
        assert!(!catalog.link_symlink(&key("button"), "other").unwrap());
        assert_eq!(
            catalog.get(&key("button")),
            Some(CatalogEntry::Versions { latest: Version::new(0, 0, 1) })
        );

        assert!(catalog.link_symlink(&key("card"), "other").unwrap());
        catalog.link_version(&key("card"), Version::new(0, 0, 1)).unwrap();
        assert_eq!(
            catalog.get(&key("card")),
            Some(CatalogEntry::Versions { latest: Version::new(0, 0, 1) })
        );
    }

    #[test]
    fn set_latest_and_unlink() {
        let catalog = Catalog::in_memory();
        catalog.link_version(&key("x"), Version::new(0, 0, 2)).unwrap();
        catalog.set_latest(&key("x"), Version::new(0, 0, 1)).unwrap();
        assert_eq!(
            catalog.get(&key("x")),
            Some(CatalogEntry::Versions { latest: Version::new(0, 0, 1) })
        );
        assert!(catalog.unlink(&key("x")).unwrap());
        assert!(!catalog.unlink(&key("x")).unwrap());
        assert!(!catalog.contains(&key("x")));
    }
}
