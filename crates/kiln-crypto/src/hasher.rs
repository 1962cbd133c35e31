use kiln_types::ObjectId;

/// Domain-separated BLAKE3 content hasher.
///
/// Each hasher prepends its domain tag to the hashed bytes, so equal bytes
/// hashed under different domains never share a digest.
#[derive(Clone, Copy, Debug)]
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for source file contents.
    pub const SOURCE: Self = Self {
        domain: "kiln-source-v1",
    };

    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// Hash raw bytes and return the lowercase hex digest as an id.
    pub fn hash(&self, data: &[u8]) -> ObjectId {
        ObjectId::new(hex::encode(self.digest(data)))
    }

    /// The 32-byte domain-separated digest.
    pub fn digest(&self, data: &[u8]) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        *hasher.finalize().as_bytes()
    }

    /// Plain BLAKE3 without a domain tag.
    pub fn raw_hash(data: &[u8]) -> [u8; 32] {
        *blake3::hash(data).as_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        let a = ContentHasher::SOURCE.hash(b"export const x = 1;");
        let b = ContentHasher::SOURCE.hash(b"export const x = 1;");
        assert_eq!(a, b);
    }

    #[test]
    fn hash_is_lowercase_hex() {
        let id = ContentHasher::SOURCE.hash(b"data");
        assert_eq!(id.as_str().len(), 64);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn domains_are_separated() {
        let data = b"same bytes";
        assert_ne!(
            ContentHasher::new("custom-v1").hash(data),
            ContentHasher::SOURCE.hash(data)
        );
    }

    #[test]
    fn raw_hash_differs_from_domain_hash() {
        let raw = ContentHasher::raw_hash(b"test");
        assert_ne!(raw, ContentHasher::SOURCE.digest(b"test"));
        assert_eq!(raw, ContentHasher::raw_hash(b"test"));
    }
}
