//! Checksummed binary framing
//!
//! Every persisted binary file (staging index, digest cache, auxiliary
//! snapshot caches) ends in a SHA-1 checksum of all preceding bytes. The
//! reader hashes as it consumes and `verify` compares against the trailer,
//! so truncated or bit-flipped files are detected on load.

use crate::artifacts::index::CHECKSUM_SIZE;
use byteorder::{ByteOrder, NetworkEndian};
use sha1::{Digest as _, Sha1};
use std::io::{Read, Write};

pub struct ChecksumReader<R: Read> {
    inner: R,
    hasher: Sha1,
}

impl<R: Read> ChecksumReader<R> {
    pub fn new(inner: R) -> Self {
        ChecksumReader {
            inner,
            hasher: Sha1::new(),
        }
    }

    pub fn read_bytes(&mut self, size: usize) -> anyhow::Result<Vec<u8>> {
        let mut buffer = vec![0u8; size];
        self.inner.read_exact(&mut buffer)?;
        self.hasher.update(&buffer);
        Ok(buffer)
    }

    pub fn read_u8(&mut self) -> anyhow::Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_u32(&mut self) -> anyhow::Result<u32> {
        Ok(NetworkEndian::read_u32(&self.read_bytes(4)?))
    }

    pub fn read_u64(&mut self) -> anyhow::Result<u64> {
        Ok(NetworkEndian::read_u64(&self.read_bytes(8)?))
    }

    pub fn read_i64(&mut self) -> anyhow::Result<i64> {
        Ok(NetworkEndian::read_i64(&self.read_bytes(8)?))
    }

    /// Read and compare the 20-byte trailer
    pub fn verify(mut self) -> anyhow::Result<()> {
        let mut stored = vec![0u8; CHECKSUM_SIZE];
        self.inner.read_exact(&mut stored)?;

        let computed = self.hasher.finalize();
        if computed.as_slice() != stored.as_slice() {
            return Err(anyhow::anyhow!("checksum mismatch"));
        }
        Ok(())
    }
}

pub struct ChecksumWriter<W: Write> {
    inner: W,
    hasher: Sha1,
}

impl<W: Write> ChecksumWriter<W> {
    pub fn new(inner: W) -> Self {
        ChecksumWriter {
            inner,
            hasher: Sha1::new(),
        }
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> anyhow::Result<()> {
        self.hasher.update(bytes);
        self.inner.write_all(bytes)?;
        Ok(())
    }

    pub fn write_u8(&mut self, value: u8) -> anyhow::Result<()> {
        self.write_bytes(&[value])
    }

    pub fn write_u32(&mut self, value: u32) -> anyhow::Result<()> {
        let mut buffer = [0u8; 4];
        NetworkEndian::write_u32(&mut buffer, value);
        self.write_bytes(&buffer)
    }

    pub fn write_u64(&mut self, value: u64) -> anyhow::Result<()> {
        let mut buffer = [0u8; 8];
        NetworkEndian::write_u64(&mut buffer, value);
        self.write_bytes(&buffer)
    }

    pub fn write_i64(&mut self, value: i64) -> anyhow::Result<()> {
        let mut buffer = [0u8; 8];
        NetworkEndian::write_i64(&mut buffer, value);
        self.write_bytes(&buffer)
    }

    /// Append the 20-byte trailer and flush
    pub fn finish(mut self) -> anyhow::Result<W> {
        let digest = self.hasher.finalize();
        self.inner.write_all(&digest)?;
        self.inner.flush()?;
        Ok(self.inner)
    }
}
