//! Object traits
//!
//! `Packable`/`Unpackable` cover canonical (de)serialization including the
//! kind header; `Object` adds the digest, computed over the uncompressed
//! canonical bytes. Canonical means: equal objects serialize to identical
//! bytes, distinct objects to distinct bytes, so digests are stable.

use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::digest::ContentDigest;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::tree::Tree;
use bytes::Bytes;
use std::io::{BufRead, Cursor};

pub trait Packable {
    /// Serialize to canonical bytes, kind header included
    fn serialize(&self) -> anyhow::Result<Bytes>;
}

pub trait Unpackable: Sized {
    /// Deserialize the canonical body (header already consumed)
    fn deserialize(reader: impl BufRead) -> anyhow::Result<Self>;
}

pub trait Object: Packable {
    fn object_type(&self) -> ObjectType;

    /// Digest of the canonical serialization
    fn digest(&self) -> anyhow::Result<ContentDigest> {
        Ok(ContentDigest::hash_bytes(&self.serialize()?))
    }
}

/// A parsed object of either kind
#[derive(Debug)]
pub enum ObjectBox {
    Tree(Box<Tree>),
    Commit(Box<Commit>),
}

impl ObjectBox {
    /// Decode an object from its uncompressed on-disk bytes
    pub fn decode(raw: Bytes) -> anyhow::Result<ObjectBox> {
        let mut reader = Cursor::new(raw);
        let object_type = ObjectType::parse_object_type(&mut reader)?;

        match object_type {
            ObjectType::Tree => Ok(ObjectBox::Tree(Box::new(Tree::deserialize(reader)?))),
            ObjectType::Commit => Ok(ObjectBox::Commit(Box::new(Commit::deserialize(reader)?))),
        }
    }
}
