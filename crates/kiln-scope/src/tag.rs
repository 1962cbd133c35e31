use serde::Serialize;

use kiln_store::ComponentVersion;
use kiln_types::{BitId, ObjectId, ReleaseType, Version};

/// One file of a component being tagged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceFile {
    pub relative_path: String,
    pub contents: Vec<u8>,
}

/// Everything needed to tag a new version of a local component.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TagRequest {
    pub name: String,
    pub files: Vec<SourceFile>,
    pub dependencies: Vec<BitId>,
    /// Falls back to the scope's configured default.
    pub release: Option<ReleaseType>,
    pub message: String,
    pub username: Option<String>,
    pub email: Option<String>,
    /// Reference to the compiler environment the component builds with.
    pub compiler: Option<String>,
    pub tester: Option<String>,
}

impl TagRequest {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            files: Vec::new(),
            dependencies: Vec::new(),
            release: None,
            message: message.into(),
            username: None,
            email: None,
            compiler: None,
            tester: None,
        }
    }

    pub fn file(mut self, relative_path: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        self.files.push(SourceFile {
            relative_path: relative_path.into(),
            contents: contents.into(),
        });
        self
    }

    pub fn dependency(mut self, id: BitId) -> Self {
        self.dependencies.push(id);
        self
    }

    pub fn release(mut self, release: ReleaseType) -> Self {
        self.release = Some(release);
        self
    }

    pub fn compiler(mut self, compiler: impl Into<String>) -> Self {
        self.compiler = Some(compiler.into());
        self
    }

    pub fn tester(mut self, tester: impl Into<String>) -> Self {
        self.tester = Some(tester.into());
        self
    }

    pub fn author(mut self, username: impl Into<String>, email: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.email = Some(email.into());
        self
    }
}

/// Result of a successful tag.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NewVersion {
    pub id: BitId,
    pub version: Version,
    pub previous: Option<Version>,
    pub object_id: ObjectId,
    /// Dependencies as they were pinned: scoped and exact.
    pub dependencies: Vec<BitId>,
}

/// One line of a component's history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub id: BitId,
    pub version: Version,
    pub message: String,
    pub date: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub files: usize,
}

impl From<&ComponentVersion> for LogEntry {
    fn from(v: &ComponentVersion) -> Self {
        Self {
            id: v.bit_id(),
            version: v.version,
            message: v.log.message.clone(),
            date: v.log.date,
            username: v.log.username.clone(),
            email: v.log.email.clone(),
            files: v.files.len(),
        }
    }
}
