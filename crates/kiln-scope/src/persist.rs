use std::fs;
use std::io::{self, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;

use crate::error::{ScopeError, ScopeResult};

/// Replace `path` with `bytes` so readers see the old or the new content.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> ScopeResult<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;
    let mut staged = NamedTempFile::new_in(dir)?;
    staged.write_all(bytes)?;
    staged.as_file().sync_all()?;
    staged.persist(path).map_err(|e| ScopeError::Io(e.error))?;
    Ok(())
}

pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> ScopeResult<()> {
    let bytes = serde_json::to_vec_pretty(value)
        .map_err(|e| ScopeError::Config(format!("cannot encode {}: {e}", path.display())))?;
    write_atomic(path, &bytes)
}

/// Read a JSON file, or `T::default()` if it does not exist.
pub(crate) fn read_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> ScopeResult<T> {
    match fs::read(path) {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map_err(|e| ScopeError::Config(format!("cannot parse {}: {e}", path.display()))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(T::default()),
        Err(e) => Err(e.into()),
    }
}
