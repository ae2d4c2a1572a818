//! Content digest (SHA-1)
//!
//! Digests are 40-character lowercase hexadecimal strings. They identify both
//! file contents (by hashing the byte stream) and stored objects (by hashing
//! the canonical serialization). The hash algorithm is fixed repository-wide
//! at init time and recorded in `.sod/config`.
//!
//! ## Format
//!
//! - Full: 40 hex characters
//! - Abbreviated: shortest unambiguous prefix within the displayed set,
//!   never shorter than 10 characters
//!
//! ## Storage
//!
//! Objects live in `.sod/objects/<first-2-chars>/<remaining-38-chars>`

use crate::artifacts::objects::{DIGEST_HEX_LENGTH, DIGEST_RAW_LENGTH, HASH_BLOCK_SIZE};
use sha1::{Digest as _, Sha1};
use std::io;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Content digest
///
/// A 40-character lowercase hexadecimal string. Implements parsing,
/// binary round-tripping and object-path conversion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentDigest(String);

impl ContentDigest {
    /// Parse and validate a digest from a hex string
    pub fn try_parse(hex: String) -> anyhow::Result<Self> {
        if hex.len() != DIGEST_HEX_LENGTH {
            return Err(anyhow::anyhow!("Invalid digest length: {}", hex.len()));
        }
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(anyhow::anyhow!("Invalid digest characters: {}", hex));
        }
        Ok(Self(hex.to_ascii_lowercase()))
    }

    /// The all-zero digest, standing for "no old content" in raw diff records
    pub fn zero() -> Self {
        Self("0".repeat(DIGEST_HEX_LENGTH))
    }

    pub fn is_zero(&self) -> bool {
        self.0.bytes().all(|b| b == b'0')
    }

    fn from_raw(raw: &[u8]) -> Self {
        let mut hex = String::with_capacity(DIGEST_HEX_LENGTH);
        for byte in raw {
            hex.push_str(&format!("{:02x}", byte));
        }
        Self(hex)
    }

    /// Hash an in-memory byte buffer
    pub fn hash_bytes(bytes: &[u8]) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(bytes);
        Self::from_raw(&hasher.finalize())
    }

    /// Stream a reader into the hasher in fixed-size blocks
    pub fn hash_reader(reader: &mut impl Read) -> io::Result<Self> {
        let mut hasher = Sha1::new();
        let mut block = vec![0u8; HASH_BLOCK_SIZE];
        loop {
            let n = reader.read(&mut block)?;
            if n == 0 {
                break;
            }
            hasher.update(&block[..n]);
        }
        Ok(Self::from_raw(&hasher.finalize()))
    }

    /// Hash a file's contents
    ///
    /// Symbolic links are followed, so a link to a file hashes as the target
    /// content.
    pub fn hash_file(path: &Path) -> io::Result<Self> {
        let mut file = std::fs::File::open(path)?;
        Self::hash_reader(&mut file)
    }

    /// Write the digest in binary form (20 bytes)
    pub fn write_raw_to<W: io::Write>(&self, writer: &mut W) -> anyhow::Result<()> {
        for i in (0..DIGEST_HEX_LENGTH).step_by(2) {
            let byte = u8::from_str_radix(&self.0[i..i + 2], 16)
                .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "Invalid hex digit"))?;
            writer.write_all(&[byte])?;
        }
        Ok(())
    }

    /// Read a digest from binary form (20 bytes)
    pub fn read_raw_from<R: io::Read + ?Sized>(reader: &mut R) -> anyhow::Result<Self> {
        let mut raw = [0u8; DIGEST_RAW_LENGTH];
        reader.read_exact(&mut raw)?;
        Ok(Self::from_raw(&raw))
    }

    /// Convert to the sharded object-store path `xx/yyyy...`
    pub fn to_path(&self) -> PathBuf {
        let (dir, file) = self.0.split_at(2);
        PathBuf::from(dir).join(file)
    }

    /// Truncate to the given display width
    pub fn abbreviate(&self, width: usize) -> &str {
        &self.0[..width.min(DIGEST_HEX_LENGTH)]
    }
}

impl AsRef<str> for ContentDigest {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
