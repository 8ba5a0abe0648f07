use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Whole-object digest algorithms understood by ferry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    Md5,
}

impl DigestAlgorithm {
    /// Output length in bytes.
    pub const fn output_len(&self) -> usize {
        match self {
            Self::Md5 => 16,
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Md5 => f.write_str("md5"),
        }
    }
}

/// An algorithm-tagged digest computed over an object's full content.
///
/// Two digests are equal only when both the algorithm and every byte match.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawDigest")]
pub struct ContentDigest {
    algorithm: DigestAlgorithm,
    #[serde(with = "hex_bytes")]
    bytes: Vec<u8>,
}

/// Wire form of [`ContentDigest`], length-checked on the way in.
#[derive(Deserialize)]
struct RawDigest {
    algorithm: DigestAlgorithm,
    #[serde(with = "hex_bytes")]
    bytes: Vec<u8>,
}

impl TryFrom<RawDigest> for ContentDigest {
    type Error = TypeError;

    fn try_from(raw: RawDigest) -> Result<Self, Self::Error> {
        Self::new(raw.algorithm, raw.bytes)
    }
}

impl ContentDigest {
    /// Build a digest from raw bytes, checking the length against the algorithm.
    pub fn new(algorithm: DigestAlgorithm, bytes: Vec<u8>) -> Result<Self, TypeError> {
        if bytes.len() != algorithm.output_len() {
            return Err(TypeError::InvalidLength {
                expected: algorithm.output_len(),
                actual: bytes.len(),
            });
        }
        Ok(Self { algorithm, bytes })
    }

    /// MD5 digest from a fixed-size array.
    pub fn md5(bytes: [u8; 16]) -> Self {
        Self {
            algorithm: DigestAlgorithm::Md5,
            bytes: bytes.to_vec(),
        }
    }

    /// Parse from a hex string.
    pub fn from_hex(algorithm: DigestAlgorithm, s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        Self::new(algorithm, bytes)
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Lowercase hex-encoded digest.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }
}

impl fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentDigest({}:{})", self.algorithm, self.to_hex())
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.to_hex())
    }
}

/// A digest as declared by a store.
///
/// Stores that assemble objects from separately uploaded parts report a
/// digest over the concatenated part digests. Such a digest cannot be
/// compared with a single-pass hash of the object bytes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeclaredDigest {
    /// Digest over the full object content.
    Plain(ContentDigest),
    /// Digest over part digests, as reported (e.g. `"<hex>-<parts>"`).
    Composite { etag: String, parts: u32 },
}

impl DeclaredDigest {
    /// Whether this digest can be compared with a whole-object hash.
    pub fn is_comparable(&self) -> bool {
        matches!(self, Self::Plain(_))
    }

    /// The whole-object digest, if this is a plain digest.
    pub fn as_plain(&self) -> Option<&ContentDigest> {
        match self {
            Self::Plain(d) => Some(d),
            Self::Composite { .. } => None,
        }
    }
}

impl fmt::Display for DeclaredDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(d) => write!(f, "{d}"),
            Self::Composite { etag, parts } => write!(f, "composite:{etag} ({parts} parts)"),
        }
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMPTY_MD5: &str = "d41d8cd98f00b204e9800998ecf8427e";

    #[test]
    fn hex_roundtrip() {
        let d = ContentDigest::from_hex(DigestAlgorithm::Md5, EMPTY_MD5).unwrap();
        assert_eq!(d.to_hex(), EMPTY_MD5);
        assert_eq!(d.as_bytes().len(), 16);
    }

    #[test]
    fn wrong_length_rejected() {
        let err = ContentDigest::new(DigestAlgorithm::Md5, vec![0; 20]).unwrap_err();
        assert_eq!(err, TypeError::InvalidLength { expected: 16, actual: 20 });
    }

    #[test]
    fn invalid_hex_rejected() {
        assert!(matches!(
            ContentDigest::from_hex(DigestAlgorithm::Md5, "zz"),
            Err(TypeError::InvalidHex(_))
        ));
    }

    #[test]
    fn display_is_algorithm_tagged() {
        let d = ContentDigest::md5([0xab; 16]);
        assert_eq!(d.to_string(), format!("md5:{}", "ab".repeat(16)));
    }

    #[test]
    fn composite_is_not_comparable() {
        let plain = DeclaredDigest::Plain(ContentDigest::md5([1; 16]));
        let composite = DeclaredDigest::Composite { etag: "abc-3".into(), parts: 3 };
        assert!(plain.is_comparable());
        assert!(plain.as_plain().is_some());
        assert!(!composite.is_comparable());
        assert!(composite.as_plain().is_none());
    }

    #[test]
    fn serde_uses_hex() {
        let d = ContentDigest::md5([0x0f; 16]);
        let json = serde_json::to_string(&d).unwrap();
        assert!(json.contains(&"0f".repeat(16)));
        let parsed: ContentDigest = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, d);
    }

    #[test]
    fn truncated_digest_fails_to_deserialize() {
        let json = serde_json::json!({ "algorithm": DigestAlgorithm::Md5, "bytes": "abcdef" });
        let err = serde_json::from_value::<ContentDigest>(json).unwrap_err();
        assert!(err.to_string().contains("16"), "{err}");
    }

    #[test]
    fn truncated_declared_digest_rejected() {
        let raw = r#"{"kind":"plain","algorithm":"md5","bytes":"00"}"#;
        assert!(serde_json::from_str::<DeclaredDigest>(raw).is_err());
    }
}
