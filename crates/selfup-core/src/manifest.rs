use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::UpdateError;

/// Size in bytes of a SHA-256 digest.
pub const DIGEST_LEN: usize = 32;

pub type Sha256Digest = [u8; DIGEST_LEN];

/// Latest release advertised for one command and platform.
///
/// Wire form: `{"Version": "2", "Sha256": "<base64 of 32 bytes>"}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub version: String,
    pub sha256: Sha256Digest,
}

#[derive(Deserialize, Serialize)]
struct WireManifest {
    #[serde(rename = "Version")]
    version: String,
    #[serde(rename = "Sha256", with = "base64_bytes")]
    sha256: Vec<u8>,
}

mod base64_bytes {
    use base64::Engine as _;

    use super::{Deserialize, Deserializer, STANDARD, Serializer};

    pub(super) fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

impl Manifest {
    /// Decode a manifest document and validate its digest length.
    ///
    /// # Errors
    /// Returns [`UpdateError::ManifestDecode`] for malformed JSON or base64,
    /// and [`UpdateError::InvalidHashLength`] when the digest is not 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, UpdateError> {
        let wire: WireManifest = serde_json::from_slice(bytes).map_err(UpdateError::ManifestDecode)?;
        let actual = wire.sha256.len();
        let sha256: Sha256Digest =
            wire.sha256
                .try_into()
                .map_err(|_| UpdateError::InvalidHashLength {
                    expected: DIGEST_LEN,
                    actual,
                })?;
        Ok(Self {
            version: wire.version,
            sha256,
        })
    }

    /// Encode the manifest in its wire form.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    #[must_use]
    pub fn sha256_base64(&self) -> String {
        STANDARD.encode(self.sha256)
    }

    #[must_use]
    pub fn sha256_hex(&self) -> String {
        hex_digest(&self.sha256)
    }
}

impl Serialize for Manifest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        WireManifest {
            version: self.version.clone(),
            sha256: self.sha256.to_vec(),
        }
        .serialize(serializer)
    }
}

pub(crate) fn hex_digest(bytes: &[u8]) -> String {
    use std::fmt::Write as _;

    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, byte| {
        let _ = write!(out, "{byte:02x}");
        out
    })
}

#[cfg(test)]
mod tests {
    use sha2::{Digest, Sha256};

    use super::{DIGEST_LEN, Manifest, hex_digest};
    use crate::error::UpdateError;

    const VALID_HASH: &str = "KuuFO23xCOyo+cYC5XO92O16Zom9Trpo5kVkPy7SzEw=";

    #[test]
    fn decodes_wire_manifest() {
        let manifest = Manifest::from_slice(
            format!(r#"{{"Version":"2","Sha256":"{VALID_HASH}"}}"#).as_bytes(),
        )
        .expect("manifest should decode");

        assert_eq!(manifest.version, "2");
        assert_eq!(
            manifest.sha256.as_slice(),
            Sha256::digest(b"selfup").as_slice()
        );
    }

    #[test]
    fn hash_reencodes_to_original_base64() {
        let manifest = Manifest::from_slice(
            format!(r#"{{"Version":"2","Sha256":"{VALID_HASH}"}}"#).as_bytes(),
        )
        .expect("manifest should decode");

        assert_eq!(manifest.sha256_base64(), VALID_HASH);
        let json = manifest.to_json().expect("manifest should encode");
        assert_eq!(json, format!(r#"{{"Version":"2","Sha256":"{VALID_HASH}"}}"#));
    }

    #[test]
    fn rejects_short_hash() {
        let result = Manifest::from_slice(br#"{"Version":"2","Sha256":"3q2+7w=="}"#);

        assert!(matches!(
            result,
            Err(UpdateError::InvalidHashLength {
                expected: DIGEST_LEN,
                actual: 4
            })
        ));
    }

    #[test]
    fn rejects_malformed_documents() {
        assert!(matches!(
            Manifest::from_slice(b"not json"),
            Err(UpdateError::ManifestDecode(_))
        ));
        assert!(matches!(
            Manifest::from_slice(br#"{"Version":"2","Sha256":"%%%"}"#),
            Err(UpdateError::ManifestDecode(_))
        ));
        assert!(matches!(
            Manifest::from_slice(br#"{"Sha256":"3q2+7w=="}"#),
            Err(UpdateError::ManifestDecode(_))
        ));
    }

    #[test]
    fn hex_digest_is_lowercase() {
        assert_eq!(hex_digest(&[0xde, 0xad, 0x0b]), "dead0b");
    }
}
