use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use kiln_types::validate_remote_name;

use crate::error::{ScopeError, ScopeResult};
use crate::persist::{read_json_or_default, write_json};

/// File name of the persisted remote registry inside a scope directory.
pub const REMOTES_FILE: &str = "remotes.json";

/// A named peer scope.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    pub name: String,
    pub url: String,
    /// Deprecated remotes stay listed but refuse exports.
    #[serde(default)]
    pub deprecated: bool,
}

/// Registry of the remotes a scope exchanges components with.
#[derive(Debug, Default)]
pub struct RemoteRegistry {
    entries: RwLock<BTreeMap<String, RemoteEntry>>,
    path: Option<PathBuf>,
}

impl RemoteRegistry {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn open(path: &Path) -> ScopeResult<Self> {
        let list: Vec<RemoteEntry> = read_json_or_default(path)?;
        Ok(Self {
            entries: RwLock::new(list.into_iter().map(|e| (e.name.clone(), e)).collect()),
            path: Some(path.to_path_buf()),
        })
    }

    pub fn get(&self, name: &str) -> Option<RemoteEntry> {
        self.entries.read().expect("lock poisoned").get(name).cloned()
    }

    pub fn list(&self) -> Vec<RemoteEntry> {
        self.entries.read().expect("lock poisoned").values().cloned().collect()
    }

    pub fn add(&self, name: &str, url: &str) -> ScopeResult<RemoteEntry> {
        validate_remote_name(name)?;
        if url.trim().is_empty() {
            return Err(ScopeError::Validation(format!("remote {name} needs a url")));
        }
        let mut entries = self.entries.write().expect("lock poisoned");
        if entries.contains_key(name) {
            return Err(ScopeError::Validation(format!("remote {name} already exists")));
        }
        let entry = RemoteEntry {
            name: name.to_string(),
            url: url.to_string(),
            deprecated: false,
        };
        entries.insert(name.to_string(), entry.clone());
        self.persist(&entries)?;
        Ok(entry)
    }

    pub fn remove(&self, name: &str) -> ScopeResult<RemoteEntry> {
        let mut entries = self.entries.write().expect("lock poisoned");
        let entry = entries
            .remove(name)
            .ok_or_else(|| ScopeError::NotFound(format!("remote {name}")))?;
        self.persist(&entries)?;
        Ok(entry)
    }

    pub fn deprecate(&self, name: &str) -> ScopeResult<RemoteEntry> {
        let mut entries = self.entries.write().expect("lock poisoned");
        let entry = entries
            .get_mut(name)
            .ok_or_else(|| ScopeError::NotFound(format!("remote {name}")))?;
        entry.deprecated = true;
        let entry = entry.clone();
        self.persist(&entries)?;
        Ok(entry)
    }

    fn persist(&self, entries: &BTreeMap<String, RemoteEntry>) -> ScopeResult<()> {
        match &self.path {
            Some(path) => write_json(path, &entries.values().collect::<Vec<_>>()),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn add_list_remove() {
        let reg = RemoteRegistry::in_memory();
        reg.add("origin", "/srv/acme").unwrap();
        reg.add("backup", "/srv/backup").unwrap();
        let names: Vec<String> = reg.list().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["backup", "origin"]);

        let removed = reg.remove("origin").unwrap();
        assert_eq!(removed.url, "/srv/acme");
        assert!(reg.get("origin").is_none());
        assert_eq!(reg.remove("origin").unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn duplicate_and_invalid_names_rejected() {
        let reg = RemoteRegistry::in_memory();
        reg.add("origin", "/srv/acme").unwrap();
        assert_eq!(reg.add("origin", "/elsewhere").unwrap_err().kind(), ErrorKind::Validation);
        assert_eq!(reg.add("bad/name", "/x").unwrap_err().kind(), ErrorKind::Validation);
        assert_eq!(reg.add("empty", " ").unwrap_err().kind(), ErrorKind::Validation);
    }

    #[test]
    fn deprecate_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(REMOTES_FILE);
        {
            let reg = RemoteRegistry::open(&path).unwrap();
            reg.add("origin", "/srv/acme").unwrap();
            assert!(reg.deprecate("origin").unwrap().deprecated);
        }
        let reg = RemoteRegistry::open(&path).unwrap();
        assert!(reg.get("origin").unwrap().deprecated);
    }
}
