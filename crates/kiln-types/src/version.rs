use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Which part of the version a new tag increments.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseType {
    #[default]
    Patch,
    Minor,
    Major,
}

impl ReleaseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Patch => "patch",
            Self::Minor => "minor",
            Self::Major => "major",
        }
    }
}

impl fmt::Display for ReleaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReleaseType {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "patch" => Ok(Self::Patch),
            "minor" => Ok(Self::Minor),
            "major" => Ok(Self::Major),
            other => Err(TypeError::InvalidReleaseType(other.to_string())),
        }
    }
}

/// Semantic version of a tagged component.
///
/// Versions of one component are totally ordered by
/// `major` → `minor` → `patch`. Serialized as the dotted string form.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// The version assigned to the first tag of a component.
    ///
    /// A first `patch` release is `0.0.1`, a first `minor` release `0.1.0`
    /// and a first `major` release `1.0.0`.
    pub fn initial(release: ReleaseType) -> Self {
        match release {
            ReleaseType::Patch => Self::new(0, 0, 1),
            ReleaseType::Minor => Self::new(0, 1, 0),
            ReleaseType::Major => Self::new(1, 0, 0),
        }
    }

    /// The next version after `self` for the given release type.
    ///
    /// Fails when the incremented component would exceed `u32::MAX`.
    pub fn bump(&self, release: ReleaseType) -> Result<Self, TypeError> {
        let overflow = || TypeError::VersionOverflow {
            version: *self,
            release,
        };
        Ok(match release {
            ReleaseType::Patch => {
                Self::new(self.major, self.minor, self.patch.checked_add(1).ok_or_else(overflow)?)
            }
            ReleaseType::Minor => Self::new(self.major, self.minor.checked_add(1).ok_or_else(overflow)?, 0),
            ReleaseType::Major => Self::new(self.major.checked_add(1).ok_or_else(overflow)?, 0, 0),
        })
    }
}

impl fmt::Debug for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Version({self})")
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for Version {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('.');
        let mut next = || -> Result<u32, TypeError> {
            let part = parts
                .next()
                .ok_or_else(|| TypeError::InvalidVersion(s.to_string()))?;
            // Reject signs and leading zeros; `u32::from_str` accepts "+1" and "01".
            if part.is_empty()
                || !part.bytes().all(|b| b.is_ascii_digit())
                || (part.len() > 1 && part.starts_with('0'))
            {
                return Err(TypeError::InvalidVersion(s.to_string()));
            }
            part.parse()
                .map_err(|_| TypeError::InvalidVersion(s.to_string()))
        };
        let version = Self::new(next()?, next()?, next()?);
        if parts.next().is_some() {
            return Err(TypeError::InvalidVersion(s.to_string()));
        }
        Ok(version)
    }
}

impl TryFrom<String> for Version {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Version> for String {
    fn from(v: Version) -> Self {
        v.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn initial_versions() {
        assert_eq!(Version::initial(ReleaseType::Patch), Version::new(0, 0, 1));
        assert_eq!(Version::initial(ReleaseType::Minor), Version::new(0, 1, 0));
        assert_eq!(Version::initial(ReleaseType::Major), Version::new(1, 0, 0));
    }

    #[test]
    fn bump_resets_lower_components() {
        let v = Version::new(1, 4, 7);
        assert_eq!(v.bump(ReleaseType::Patch).unwrap(), Version::new(1, 4, 8));
        assert_eq!(v.bump(ReleaseType::Minor).unwrap(), Version::new(1, 5, 0));
        assert_eq!(v.bump(ReleaseType::Major).unwrap(), Version::new(2, 0, 0));
    }

    #[test]
    fn bump_past_u32_max_is_an_error() {
        let v = Version::new(u32::MAX, u32::MAX, u32::MAX);
        for rt in [ReleaseType::Patch, ReleaseType::Minor, ReleaseType::Major] {
            assert_eq!(v.bump(rt), Err(TypeError::VersionOverflow { version: v, release: rt }));
        }
        // Only the incremented component matters.
        assert_eq!(
            Version::new(1, u32::MAX, 3).bump(ReleaseType::Major).unwrap(),
            Version::new(2, 0, 0)
        );
    }

    #[test]
    fn ordering_is_numeric_not_lexicographic() {
        let a: Version = "0.0.9".parse().unwrap();
        let b: Version = "0.0.10".parse().unwrap();
        assert!(a < b);
        assert!(Version::new(0, 9, 9) < Version::new(1, 0, 0));
    }

    #[test]
    fn parse_rejects_malformed() {
        for bad in ["", "1", "1.2", "1.2.3.4", "a.b.c", "1..2", "01.2.3", "+1.2.3", "1.2.-3"] {
            assert!(bad.parse::<Version>().is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn serde_as_string() {
        let v = Version::new(0, 0, 2);
        assert_eq!(serde_json::to_string(&v).unwrap(), "\"0.0.2\"");
        let parsed: Version = serde_json::from_str("\"3.1.4\"").unwrap();
        assert_eq!(parsed, Version::new(3, 1, 4));
        assert!(serde_json::from_str::<Version>("\"latest\"").is_err());
    }

    #[test]
    fn release_type_parse_and_display() {
        for rt in [ReleaseType::Patch, ReleaseType::Minor, ReleaseType::Major] {
            assert_eq!(rt.to_string().parse::<ReleaseType>().unwrap(), rt);
        }
        assert_eq!(ReleaseType::default(), ReleaseType::Patch);
        assert!("huge".parse::<ReleaseType>().is_err());
    }

    proptest! {
        #[test]
        fn display_parse_roundtrip(major in 0u32..10_000, minor in 0u32..10_000, patch in 0u32..10_000) {
            let v = Version::new(major, minor, patch);
            prop_assert_eq!(v.to_string().parse::<Version>().unwrap(), v);
        }

        #[test]
        fn bump_is_strictly_increasing(major in 0u32..1000, minor in 0u32..1000, patch in 0u32..1000) {
            let v = Version::new(major, minor, patch);
            for rt in [ReleaseType::Patch, ReleaseType::Minor, ReleaseType::Major] {
                prop_assert!(v.bump(rt).unwrap() > v);
            }
        }
    }
}
