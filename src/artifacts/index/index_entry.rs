//! Staging operations and stat signatures
//!
//! A staging operation transcribes one working-tree change into the STAGED
//! tree: `Put` records the digest and mode a path will have in the next
//! commit, `Delete` removes it. The stat signature is the cheap filesystem
//! fingerprint the digest cache uses to decide whether a file must be
//! rehashed.

use crate::artifacts::index::checksum::{ChecksumReader, ChecksumWriter};
use crate::artifacts::objects::digest::ContentDigest;
use crate::artifacts::objects::entry_mode::EntryMode;
use crate::artifacts::objects::tree::TreeRecord;
use std::fs::Metadata;
use std::io::{Read, Write};
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

const TAG_PUT: u8 = 1;
const TAG_DELETE: u8 = 2;

/// One persisted staging operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOp {
    /// Path will carry this digest and mode in the next commit
    Put(TreeRecord),
    /// Path will be absent from the next commit
    Delete,
}

impl StageOp {
    pub fn write_to<W: Write>(
        &self,
        path: &Path,
        writer: &mut ChecksumWriter<W>,
    ) -> anyhow::Result<()> {
        use std::os::unix::ffi::OsStrExt;
        let path_bytes = path.as_os_str().as_bytes();

        match self {
            StageOp::Put(record) => {
                writer.write_u8(TAG_PUT)?;
                writer.write_u32(path_bytes.len() as u32)?;
                writer.write_bytes(path_bytes)?;
                writer.write_u32(record.mode.as_u32())?;
                let mut raw = Vec::new();
                record.digest.write_raw_to(&mut raw)?;
                writer.write_bytes(&raw)?;
            }
            StageOp::Delete => {
                writer.write_u8(TAG_DELETE)?;
                writer.write_u32(path_bytes.len() as u32)?;
                writer.write_bytes(path_bytes)?;
            }
        }
        Ok(())
    }

    pub fn read_from<R: Read>(reader: &mut ChecksumReader<R>) -> anyhow::Result<(PathBuf, Self)> {
        use std::os::unix::ffi::OsStringExt;

        let tag = reader.read_u8()?;
        let path_len = reader.read_u32()? as usize;
        let path_bytes = reader.read_bytes(path_len)?;
        let path = PathBuf::from(std::ffi::OsString::from_vec(path_bytes));

        match tag {
            TAG_PUT => {
                let mode = EntryMode::try_from_u32(reader.read_u32()?)?;
                let raw = reader.read_bytes(20)?;
                let digest = ContentDigest::read_raw_from(&mut raw.as_slice())?;
                Ok((path, StageOp::Put(TreeRecord::new(digest, mode))))
            }
            TAG_DELETE => Ok((path, StageOp::Delete)),
            other => Err(anyhow::anyhow!("unknown staging operation tag: {}", other)),
        }
    }
}

/// Cheap filesystem fingerprint of one file
///
/// A file whose signature is unchanged since the last scan is assumed to
/// carry its cached digest; any difference forces a rehash. Equality is
/// exact on every field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatSignature {
    pub size: u64,
    pub mtime: i64,
    pub mtime_nsec: u32,
    pub ino: u64,
    pub dev: u64,
}

impl From<&Metadata> for StatSignature {
    fn from(metadata: &Metadata) -> Self {
        StatSignature {
            size: metadata.size(),
            mtime: metadata.mtime(),
            mtime_nsec: metadata.mtime_nsec() as u32,
            ino: metadata.ino(),
            dev: metadata.dev(),
        }
    }
}

impl StatSignature {
    pub fn write_to<W: Write>(&self, writer: &mut ChecksumWriter<W>) -> anyhow::Result<()> {
        writer.write_u64(self.size)?;
        writer.write_i64(self.mtime)?;
        writer.write_u32(self.mtime_nsec)?;
        writer.write_u64(self.ino)?;
        writer.write_u64(self.dev)?;
        Ok(())
    }

    pub fn read_from<R: Read>(reader: &mut ChecksumReader<R>) -> anyhow::Result<Self> {
        Ok(StatSignature {
            size: reader.read_u64()?,
            mtime: reader.read_i64()?,
            mtime_nsec: reader.read_u32()?,
            ino: reader.read_u64()?,
            dev: reader.read_u64()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    #[test]
    fn stage_ops_round_trip() {
        let put = StageOp::Put(TreeRecord::new(
            ContentDigest::hash_bytes(b"content"),
            EntryMode::Executable,
        ));
        let delete = StageOp::Delete;

        let mut writer = ChecksumWriter::new(Vec::new());
        put.write_to(Path::new("dir/a.bin"), &mut writer).unwrap();
        delete.write_to(Path::new("gone.txt"), &mut writer).unwrap();
        let bytes = writer.finish().unwrap();

        let mut reader = ChecksumReader::new(Cursor::new(bytes));
        let (path_a, op_a) = StageOp::read_from(&mut reader).unwrap();
        let (path_b, op_b) = StageOp::read_from(&mut reader).unwrap();
        reader.verify().unwrap();

        assert_eq!(path_a, PathBuf::from("dir/a.bin"));
        assert_eq!(op_a, put);
        assert_eq!(path_b, PathBuf::from("gone.txt"));
        assert_eq!(op_b, delete);
    }

    #[test]
    fn stat_signature_round_trips() {
        let signature = StatSignature {
            size: 12345,
            mtime: 1700000000,
            mtime_nsec: 999999999,
            ino: 42,
            dev: 7,
        };

        let mut writer = ChecksumWriter::new(Vec::new());
        signature.write_to(&mut writer).unwrap();
        let bytes = writer.finish().unwrap();

        let mut reader = ChecksumReader::new(Cursor::new(bytes));
        let back = StatSignature::read_from(&mut reader).unwrap();
        reader.verify().unwrap();

        assert_eq!(signature, back);
    }
}
