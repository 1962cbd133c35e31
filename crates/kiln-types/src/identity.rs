use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::names::{validate_component_name, validate_scope_name};
use crate::object::ObjectId;
use crate::version::Version;

/// Sentinel used in identifier strings for "the newest version".
pub const LATEST: &str = "latest";

/// Separates the version from the rest of an identifier.
pub const VERSION_DELIMITER: char = '@';

/// Separates the scope from the name, and the segments of compound names.
pub const SCOPE_DELIMITER: char = '/';

/// Version part of an identifier: a concrete version or the `latest` sentinel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VersionSpec {
    #[default]
    Latest,
    Exact(Version),
}

impl VersionSpec {
    pub fn is_latest(&self) -> bool {
        matches!(self, Self::Latest)
    }

    /// The concrete version, if any.
    pub fn exact(&self) -> Option<Version> {
        match self {
            Self::Latest => None,
            Self::Exact(v) => Some(*v),
        }
    }
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => f.write_str(LATEST),
            Self::Exact(v) => write!(f, "{v}"),
        }
    }
}

impl FromStr for VersionSpec {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == LATEST {
            Ok(Self::Latest)
        } else {
            s.parse().map(Self::Exact)
        }
    }
}

impl From<Version> for VersionSpec {
    fn from(v: Version) -> Self {
        Self::Exact(v)
    }
}

/// Component identifier: `scope` (optional) + `name` + `version`.
///
/// String form is `[scope/]name[@version]`. A single path segment is a bare
/// name; with two or more segments the first is the scope and the rest form
/// a compound name (`acme/ui/button` is name `ui/button` in scope `acme`).
/// An omitted version means [`VersionSpec::Latest`].
///
/// Identifiers compare structurally: two ids are equal iff scope, name and
/// version all match after defaulting.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BitId {
    pub scope: Option<String>,
    pub name: String,
    pub version: VersionSpec,
}

impl BitId {
    pub fn new(scope: Option<String>, name: impl Into<String>, version: VersionSpec) -> Self {
        Self {
            scope,
            name: name.into(),
            version,
        }
    }

    /// An unscoped id pointing at the latest version of `name`.
    pub fn local(name: impl Into<String>) -> Self {
        Self::new(None, name, VersionSpec::Latest)
    }

    /// A scoped id pointing at the latest version.
    pub fn scoped(scope: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(Some(scope.into()), name, VersionSpec::Latest)
    }

    /// Parse the `[scope/]name[@version]` form, validating every part.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        let invalid = |reason: &str| TypeError::InvalidId {
            id: s.to_string(),
            reason: reason.to_string(),
        };

        let (path, version) = match s.split_once(VERSION_DELIMITER) {
            Some((_, "")) => return Err(invalid("empty version after '@'")),
            Some((path, v)) => (path, v.parse::<VersionSpec>()?),
            None => (s, VersionSpec::Latest),
        };

        let (scope, name) = match path.split_once(SCOPE_DELIMITER) {
            Some((scope, name)) => {
                validate_scope_name(scope)?;
                (Some(scope.to_string()), name)
            }
            None => (None, path),
        };
        validate_component_name(name).map_err(|e| invalid(&e.to_string()))?;

        Ok(Self::new(scope, name, version))
    }

    /// Replace the version with a concrete one.
    pub fn with_version(mut self, version: Version) -> Self {
        self.version = VersionSpec::Exact(version);
        self
    }

    /// The `(scope, name)` history key, using `default_scope` when unscoped.
    pub fn key_in(&self, default_scope: &str) -> ComponentKey {
        ComponentKey::new(
            self.scope.as_deref().unwrap_or(default_scope),
            self.name.clone(),
        )
    }
}

impl fmt::Debug for BitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BitId({self})")
    }
}

impl fmt::Display for BitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(scope) = &self.scope {
            write!(f, "{scope}{SCOPE_DELIMITER}")?;
        }
        f.write_str(&self.name)?;
        if let VersionSpec::Exact(v) = self.version {
            write!(f, "{VERSION_DELIMITER}{v}")?;
        }
        Ok(())
    }
}

impl FromStr for BitId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for BitId {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<BitId> for String {
    fn from(id: BitId) -> Self {
        id.to_string()
    }
}

/// A fully scoped `(scope, name)` pair: the unit that owns a version history.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentKey {
    pub scope: String,
    pub name: String,
}

impl ComponentKey {
    pub fn new(scope: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            name: name.into(),
        }
    }

    /// Store key of the component itself (`scope/name`), where symlinks live.
    pub fn object_id(&self) -> ObjectId {
        ObjectId::new(self.to_string())
    }

    /// Store key of one tagged version (`scope/name@version`).
    pub fn version_id(&self, version: Version) -> ObjectId {
        ObjectId::new(format!("{self}{VERSION_DELIMITER}{version}"))
    }

    /// Prefix shared by every version id of this component.
    pub fn version_prefix(&self) -> String {
        format!("{self}{VERSION_DELIMITER}")
    }

    /// An identifier for this component at the given version spec.
    pub fn bit_id(&self, version: VersionSpec) -> BitId {
        BitId::new(Some(self.scope.clone()), self.name.clone(), version)
    }
}

impl fmt::Display for ComponentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{SCOPE_DELIMITER}{}", self.scope, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parse_bare_name() {
        let id = BitId::parse("button").unwrap();
        assert_eq!(id.scope, None);
        assert_eq!(id.name, "button");
        assert!(id.version.is_latest());
    }

    #[test]
    fn parse_scope_name_version() {
        let id = BitId::parse("acme/button@1.2.3").unwrap();
        assert_eq!(id.scope.as_deref(), Some("acme"));
        assert_eq!(id.name, "button");
        assert_eq!(id.version, VersionSpec::Exact(Version::new(1, 2, 3)));
    }

    #[test]
    fn parse_compound_name() {
        let id = BitId::parse("acme/ui/button@0.0.1").unwrap();
        assert_eq!(id.scope.as_deref(), Some("acme"));
        assert_eq!(id.name, "ui/button");
    }

    #[test]
    fn parse_explicit_latest() {
        let explicit = BitId::parse("acme/button@latest").unwrap();
        let implicit = BitId::parse("acme/button").unwrap();
        assert_eq!(explicit, implicit);
    }

    #[test]
    fn parse_rejects_malformed() {
        for bad in ["", "acme/", "/button", "acme/button@", "acme/button@x.y", "a b", "acme//x"] {
            assert!(BitId::parse(bad).is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn display_omits_latest() {
        assert_eq!(BitId::scoped("acme", "button").to_string(), "acme/button");
        let exact = BitId::scoped("acme", "button").with_version(Version::new(0, 0, 2));
        assert_eq!(exact.to_string(), "acme/button@0.0.2");
    }

    #[test]
    fn structural_equality() {
        let a = BitId::new(Some("s".into()), "n", VersionSpec::Latest);
        let b = BitId::scoped("s", "n");
        assert_eq!(a, b);
        assert_ne!(a, BitId::local("n"));
        assert_ne!(a, b.clone().with_version(Version::new(0, 0, 1)));
    }

    #[test]
    fn key_in_uses_default_scope() {
        assert_eq!(BitId::local("button").key_in("home"), ComponentKey::new("home", "button"));
        assert_eq!(
            BitId::scoped("acme", "button").key_in("home"),
            ComponentKey::new("acme", "button")
        );
    }

    #[test]
    fn component_key_ids() {
        let key = ComponentKey::new("acme", "ui/button");
        assert_eq!(key.object_id().as_str(), "acme/ui/button");
        assert_eq!(key.version_id(Version::new(0, 0, 1)).as_str(), "acme/ui/button@0.0.1");
        assert_eq!(key.version_prefix(), "acme/ui/button@");
    }

    #[test]
    fn serde_as_string() {
        let id = BitId::parse("acme/button@0.0.1").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"acme/button@0.0.1\"");
        let back: BitId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    proptest! {
        #[test]
        fn display_parse_roundtrip(
            scope in proptest::option::of("[a-z][a-z0-9-]{0,8}"),
            segments in proptest::collection::vec("[a-z][a-z0-9_-]{0,8}", 1..4),
            version in proptest::option::of((0u32..50, 0u32..50, 0u32..50)),
        ) {
            // A bare compound name cannot be expressed without a scope.
            prop_assume!(scope.is_some() || segments.len() == 1);
            let spec = version
                .map(|(a, b, c)| VersionSpec::Exact(Version::new(a, b, c)))
                .unwrap_or_default();
            let id = BitId::new(scope, segments.join("/"), spec);
            prop_assert_eq!(BitId::parse(&id.to_string()).unwrap(), id);
        }
    }
}
