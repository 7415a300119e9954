//! Fingerprints: 128-bit digests of pre-result archives

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{Read, Seek, SeekFrom};

/// Length of a rendered fingerprint
pub const FINGERPRINT_LEN: usize = 32;

/// Cache key derived from the bytes of a call's archive.
///
/// MD5 is used for its 128-bit output and its availability everywhere the
/// store may be read from. It is not a security boundary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Digest archive bytes
    #[must_use]
    pub fn of(bytes: &[u8]) -> Self {
        Self(format!("{:x}", md5::compute(bytes)))
    }

    /// Digest everything a seekable reader holds.
    ///
    /// The reader is rewound before reading and again afterwards, so the
    /// caller observes no change in position.
    pub fn of_reader<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        reader
            .seek(SeekFrom::Start(0))
            .map_err(|e| Error::io(e, "rewind before hashing"))?;
        let mut bytes = Vec::new();
        reader
            .read_to_end(&mut bytes)
            .map_err(|e| Error::io(e, "read for hashing"))?;
        reader
            .seek(SeekFrom::Start(0))
            .map_err(|e| Error::io(e, "rewind after hashing"))?;
        Ok(Self::of(&bytes))
    }

    /// Validate a rendered fingerprint
    pub fn parse(value: &str) -> Result<Self> {
        let valid = value.len() == FINGERPRINT_LEN
            && value
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if valid {
            Ok(Self(value.to_string()))
        } else {
            Err(Error::invalid_fingerprint(value))
        }
    }

    /// Object key under `prefix`: `<prefix>/<fingerprint>.zip`
    #[must_use]
    pub fn object_key(&self, prefix: &str) -> String {
        let prefix = prefix.trim_end_matches('/');
        if prefix.is_empty() {
            format!("{}.zip", self.0)
        } else {
            format!("{prefix}/{}.zip", self.0)
        }
    }

    /// Lowercase hex digest
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Fingerprint> for String {
    fn from(value: Fingerprint) -> Self {
        value.0
    }
}
