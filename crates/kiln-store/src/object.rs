use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use kiln_crypto::ContentHasher;
use kiln_types::{BitId, ComponentKey, ObjectId, Version, VersionSpec};

use crate::error::{StoreError, StoreResult};

/// The kind of object stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    /// Opaque file contents, addressed by content hash.
    Source,
    /// One tagged version of a component.
    Version,
    /// Indirection from an old `(scope, name)` to the scope that now owns it.
    Symlink,
}

impl ObjectKind {
    /// Whether a stored object of this kind may be replaced by different
    /// content under the same id.
    pub fn is_supersedable(&self) -> bool {
        matches!(self, Self::Symlink)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Version => "version",
            Self::Symlink => "symlink",
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The unit of storage: id + kind tag + serialized bytes.
///
/// The store never interprets `data`; typed access goes through
/// [`BitObject`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    pub id: ObjectId,
    pub kind: ObjectKind,
    pub data: Vec<u8>,
}

impl StoredObject {
    pub fn new(id: ObjectId, kind: ObjectKind, data: Vec<u8>) -> Self {
        Self { id, kind, data }
    }

    /// Size of the serialized data in bytes.
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

// ---------------------------------------------------------------------------
// JSON helpers
// ---------------------------------------------------------------------------

/// Rewrite the legacy `{box, name}` shape into a compound `name`.
fn normalize_legacy_box(value: &mut Value) {
    let Some(map) = value.as_object_mut() else {
        return;
    };
    let Some(Value::String(boxed)) = map.remove("box") else {
        return;
    };
    if let Some(Value::String(name)) = map.get_mut("name") {
        *name = format!("{boxed}/{name}");
    }
}

fn parse_json<T: DeserializeOwned>(bytes: &[u8]) -> StoreResult<T> {
    let mut value: Value = serde_json::from_slice(bytes)?;
    normalize_legacy_box(&mut value);
    Ok(serde_json::from_value(value)?)
}

// ---------------------------------------------------------------------------
// Symlink
// ---------------------------------------------------------------------------

/// Points `scope/name` at the scope that now owns the component.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Symlink {
    pub scope: String,
    pub name: String,
    pub real_scope: String,
}

impl Symlink {
    pub fn new(
        scope: impl Into<String>,
        name: impl Into<String>,
        real_scope: impl Into<String>,
    ) -> Self {
        Self {
            scope: scope.into(),
            name: name.into(),
            real_scope: real_scope.into(),
        }
    }

    pub fn key(&self) -> ComponentKey {
        ComponentKey::new(self.scope.clone(), self.name.clone())
    }

    /// `scope/name`.
    pub fn id(&self) -> ObjectId {
        self.key().object_id()
    }

    /// The component this symlink points at, with no version.
    pub fn real_component_id(&self) -> BitId {
        BitId::scoped(self.real_scope.clone(), self.name.clone())
    }

    pub fn to_bytes(&self) -> StoreResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn parse(bytes: &[u8]) -> StoreResult<Self> {
        parse_json(bytes)
    }
}

// ---------------------------------------------------------------------------
// Component version
// ---------------------------------------------------------------------------

/// A file of a component version and the source object holding its contents.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceFileRef {
    pub relative_path: String,
    pub file: ObjectId,
}

/// Who tagged a version, when, and why. `date` is milliseconds since the
/// Unix epoch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionLog {
    pub message: String,
    pub date: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// An immutable tagged snapshot of a component.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentVersion {
    pub scope: String,
    pub name: String,
    pub version: Version,
    pub files: Vec<SourceFileRef>,
    pub dependencies: Vec<BitId>,
    #[serde(default)]
    pub compiler: Option<String>,
    #[serde(default)]
    pub tester: Option<String>,
    pub log: VersionLog,
}

impl ComponentVersion {
    /// Build a version with files sorted by path and dependencies sorted,
    /// so equal inputs always serialize to equal bytes.
    pub fn new(
        key: &ComponentKey,
        version: Version,
        mut files: Vec<SourceFileRef>,
        mut dependencies: Vec<BitId>,
        log: VersionLog,
    ) -> Self {
        files.sort();
        dependencies.sort();
        dependencies.dedup();
        Self {
            scope: key.scope.clone(),
            name: key.name.clone(),
            version,
            files,
            dependencies,
            compiler: None,
            tester: None,
            log,
        }
    }

    pub fn with_compiler(mut self, compiler: impl Into<String>) -> Self {
        self.compiler = Some(compiler.into());
        self
    }

    pub fn with_tester(mut self, tester: impl Into<String>) -> Self {
        self.tester = Some(tester.into());
        self
    }

    pub fn key(&self) -> ComponentKey {
        ComponentKey::new(self.scope.clone(), self.name.clone())
    }

    /// `scope/name@version`.
    pub fn id(&self) -> ObjectId {
        self.key().version_id(self.version)
    }

    pub fn bit_id(&self) -> BitId {
        self.key().bit_id(VersionSpec::Exact(self.version))
    }

    pub fn to_bytes(&self) -> StoreResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn parse(bytes: &[u8]) -> StoreResult<Self> {
        parse_json(bytes)
    }
}

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

/// Raw file contents.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Source {
    pub contents: Vec<u8>,
}

impl Source {
    pub fn new(contents: impl Into<Vec<u8>>) -> Self {
        Self {
            contents: contents.into(),
        }
    }

    /// Hex digest of the contents.
    pub fn id(&self) -> ObjectId {
        ContentHasher::SOURCE.hash(&self.contents)
    }
}

// ---------------------------------------------------------------------------
// BitObject
// ---------------------------------------------------------------------------

/// Every kind of object the store holds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BitObject {
    Source(Source),
    Version(ComponentVersion),
    Symlink(Symlink),
}

impl BitObject {
    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::Source(_) => ObjectKind::Source,
            Self::Version(_) => ObjectKind::Version,
            Self::Symlink(_) => ObjectKind::Symlink,
        }
    }

    pub fn id(&self) -> ObjectId {
        match self {
            Self::Source(s) => s.id(),
            Self::Version(v) => v.id(),
            Self::Symlink(s) => s.id(),
        }
    }

    /// Deterministic serialized form.
    pub fn to_bytes(&self) -> StoreResult<Vec<u8>> {
        match self {
            Self::Source(s) => Ok(s.contents.clone()),
            Self::Version(v) => v.to_bytes(),
            Self::Symlink(s) => s.to_bytes(),
        }
    }

    /// Decode bytes of the given kind.
    pub fn parse(kind: ObjectKind, bytes: &[u8]) -> StoreResult<Self> {
        Ok(match kind {
            ObjectKind::Source => Self::Source(Source::new(bytes)),
            ObjectKind::Version => Self::Version(ComponentVersion::parse(bytes)?),
            ObjectKind::Symlink => Self::Symlink(Symlink::parse(bytes)?),
        })
    }

    pub fn to_stored_object(&self) -> StoreResult<StoredObject> {
        Ok(StoredObject::new(self.id(), self.kind(), self.to_bytes()?))
    }

    /// Decode a stored object and check that its content yields the id it
    /// is stored under.
    pub fn from_stored_object(obj: &StoredObject) -> StoreResult<Self> {
        let parsed = Self::parse(obj.kind, &obj.data).map_err(|e| StoreError::CorruptObject {
            id: obj.id.clone(),
            reason: e.to_string(),
        })?;
        let computed = parsed.id();
        if computed != obj.id {
            return Err(StoreError::IdMismatch {
                expected: obj.id.clone(),
                computed,
            });
        }
        Ok(parsed)
    }

    pub fn as_version(&self) -> Option<&ComponentVersion> {
        match self {
            Self::Version(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_symlink(&self) -> Option<&Symlink> {
        match self {
            Self::Symlink(s) => Some(s),
            _ => None,
        }
    }
}

impl From<Source> for BitObject {
    fn from(s: Source) -> Self {
        Self::Source(s)
    }
}

impl From<ComponentVersion> for BitObject {
    fn from(v: ComponentVersion) -> Self {
        Self::Version(v)
    }
}

impl From<Symlink> for BitObject {
    fn from(s: Symlink) -> Self {
        Self::Symlink(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_version() -> ComponentVersion {
        let key = ComponentKey::new("acme", "ui/button");
        let source = Source::new(b"export default 1;".to_vec());
        ComponentVersion::new(
            &key,
            Version::new(0, 0, 1),
            vec![
                SourceFileRef {
                    relative_path: "z.js".into(),
                    file: source.id(),
                },
                SourceFileRef {
                    relative_path: "a.js".into(),
                    file: source.id(),
                },
            ],
            vec![BitId::parse("acme/z").unwrap(), BitId::parse("acme/a@0.0.3").unwrap()],
            VersionLog {
                message: "first".into(),
                date: 1_700_000_000_000,
                username: Some("dev".into()),
                email: None,
            },
        )
    }

    #[test]
    fn symlink_ids() {
        let link = Symlink::new("old", "foo", "new");
        assert_eq!(link.id().as_str(), "old/foo");
        assert_eq!(link.real_component_id(), BitId::scoped("new", "foo"));
        assert!(link.real_component_id().version.is_latest());
    }

    #[test]
    fn symlink_wire_format() {
        let link = Symlink::new("old", "foo", "new");
        let json = String::from_utf8(link.to_bytes().unwrap()).unwrap();
        assert_eq!(json, r#"{"scope":"old","name":"foo","realScope":"new"}"#);
        assert_eq!(Symlink::parse(json.as_bytes()).unwrap(), link);
    }

    #[test]
    fn symlink_parses_legacy_box() {
        let legacy = br#"{"scope":"old","box":"ui","name":"foo","realScope":"new"}"#;
        let link = Symlink::parse(legacy).unwrap();
        assert_eq!(link.name, "ui/foo");
        let rewritten = String::from_utf8(link.to_bytes().unwrap()).unwrap();
        assert!(!rewritten.contains("box"));
    }

    #[test]
    fn version_is_sorted_and_deterministic() {
        let v = sample_version();
        assert_eq!(v.files[0].relative_path, "a.js");
        assert_eq!(v.dependencies[0].name, "a");
        assert_eq!(v.to_bytes().unwrap(), sample_version().to_bytes().unwrap());
    }

    #[test]
    fn version_roundtrip_and_id() {
        let v = sample_version().with_compiler("babel").with_tester("mocha");
        assert_eq!(v.id().as_str(), "acme/ui/button@0.0.1");
        let parsed = ComponentVersion::parse(&v.to_bytes().unwrap()).unwrap();
        assert_eq!(parsed, v);
    }

    #[test]
    fn version_wire_keys() {
        let json: Value = serde_json::from_slice(&sample_version().to_bytes().unwrap()).unwrap();
        let keys: Vec<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();
        for key in ["scope", "name", "version", "files", "dependencies", "compiler", "tester", "log"] {
            assert!(keys.contains(&key), "missing key {key}");
        }
        assert_eq!(json["version"], "0.0.1");
        assert_eq!(json["files"][0]["relativePath"], "a.js");
    }

    #[test]
    fn version_parses_legacy_box() {
        let mut json: Value = serde_json::from_slice(&sample_version().to_bytes().unwrap()).unwrap();
        json["box"] = Value::String("ui".into());
        json["name"] = Value::String("button".into());
        let parsed = ComponentVersion::parse(&serde_json::to_vec(&json).unwrap()).unwrap();
        assert_eq!(parsed, sample_version());
    }

    #[test]
    fn source_is_content_addressed() {
        let a = Source::new(b"one".to_vec());
        let b = Source::new(b"one".to_vec());
        assert_eq!(a.id(), b.id());
        assert_ne!(a.id(), Source::new(b"two".to_vec()).id());
    }

    #[test]
    fn stored_object_roundtrip() {
        for obj in [
            BitObject::from(Source::new(b"x".to_vec())),
            BitObject::from(sample_version()),
            BitObject::from(Symlink::new("old", "foo", "new")),
        ] {
            let stored = obj.to_stored_object().unwrap();
            assert_eq!(stored.kind, obj.kind());
            assert_eq!(BitObject::from_stored_object(&stored).unwrap(), obj);
        }
    }

    #[test]
    fn from_stored_object_detects_id_mismatch() {
        let mut stored = BitObject::from(sample_version()).to_stored_object().unwrap();
        stored.id = ObjectId::new("acme/ui/button@9.9.9");
        assert!(matches!(
            BitObject::from_stored_object(&stored),
            Err(StoreError::IdMismatch { .. })
        ));
    }

    #[test]
    fn from_stored_object_detects_garbage() {
        let stored = StoredObject::new(ObjectId::new("a/b"), ObjectKind::Symlink, b"{not json".to_vec());
        assert!(matches!(
            BitObject::from_stored_object(&stored),
            Err(StoreError::CorruptObject { .. })
        ));
    }

    #[test]
    fn only_symlinks_supersede() {
        assert!(ObjectKind::Symlink.is_supersedable());
        assert!(!ObjectKind::Version.is_supersedable());
        assert!(!ObjectKind::Source.is_supersedable());
    }
}
