//! Commit object
//!
//! A commit records a tree digest, its parent commit (absent for the initial
//! commit), an author name with timestamp, and a message. Serialization is
//! canonical; the commit's digest identifies it.
//!
//! ## Format
//!
//! On disk:
//! ```text
//! commit <size>\0
//! tree <tree-digest>
//! parent <parent-digest>
//! author <name> <timestamp> <timezone>
//!
//! <commit message>
//! ```

use crate::artifacts::objects::digest::ContentDigest;
use crate::artifacts::objects::object::{Object, Packable, Unpackable};
use crate::artifacts::objects::object_type::ObjectType;
use anyhow::Context;
use bytes::Bytes;
use std::io::{BufRead, Read, Write};

/// Author identity recorded in a commit
///
/// Sod records no email; the name comes from the `user.name` config key.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Author {
    name: String,
    timestamp: chrono::DateTime<chrono::FixedOffset>,
}

impl Author {
    pub fn new(name: String) -> Self {
        Author {
            name,
            timestamp: chrono::Local::now().fixed_offset(),
        }
    }

    pub fn new_with_timestamp(
        name: String,
        timestamp: chrono::DateTime<chrono::FixedOffset>,
    ) -> Self {
        Author { name, timestamp }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn timestamp(&self) -> chrono::DateTime<chrono::FixedOffset> {
        self.timestamp
    }

    /// Format as serialized in commit objects: `name <seconds> <±HHMM>`
    pub fn display(&self) -> String {
        format!(
            "{} {} {}",
            self.name,
            self.timestamp.timestamp(),
            self.timestamp.format("%z")
        )
    }

    /// Human-readable timestamp for log output
    pub fn readable_timestamp(&self) -> String {
        self.timestamp
            .format("%a %b %-d %H:%M:%S %Y %z")
            .to_string()
    }
}

impl TryFrom<&str> for Author {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        // The name may contain spaces, so split from the right:
        // "name <seconds> <timezone>"
        let parts: Vec<&str> = value.rsplitn(3, ' ').collect();
        if parts.len() < 3 {
            return Err(anyhow::anyhow!("Invalid author format: {}", value));
        }

        let timezone = parts[0];
        let seconds = parts[1]
            .parse::<i64>()
            .map_err(|_| anyhow::anyhow!("Invalid author timestamp: {}", parts[1]))?;
        let name = parts[2].to_string();

        let offset = chrono::FixedOffset::from_timezone_spec(timezone)?;
        let timestamp = chrono::DateTime::from_timestamp(seconds, 0)
            .ok_or_else(|| anyhow::anyhow!("Author timestamp out of range: {}", seconds))?
            .with_timezone(&offset);

        Ok(Author { name, timestamp })
    }
}

trait FromTimezoneSpec: Sized {
    fn from_timezone_spec(spec: &str) -> anyhow::Result<Self>;
}

impl FromTimezoneSpec for chrono::FixedOffset {
    // "+0130" / "-0800"
    fn from_timezone_spec(spec: &str) -> anyhow::Result<Self> {
        let bad = || anyhow::anyhow!("Invalid timezone offset: {}", spec);

        if spec.len() != 5 {
            return Err(bad());
        }
        let sign = match &spec[..1] {
            "+" => 1,
            "-" => -1,
            _ => return Err(bad()),
        };
        let hours: i32 = spec[1..3].parse().map_err(|_| bad())?;
        let minutes: i32 = spec[3..5].parse().map_err(|_| bad())?;

        chrono::FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(bad)
    }
}

/// Commit object
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Commit {
    parent: Option<ContentDigest>,
    tree: ContentDigest,
    author: Author,
    message: String,
}

impl Commit {
    pub fn new(
        parent: Option<ContentDigest>,
        tree: ContentDigest,
        author: Author,
        message: String,
    ) -> Self {
        Commit {
            parent,
            tree,
            author,
            message,
        }
    }

    pub fn tree(&self) -> &ContentDigest {
        &self.tree
    }

    pub fn parent(&self) -> Option<&ContentDigest> {
        self.parent.as_ref()
    }

    pub fn author(&self) -> &Author {
        &self.author
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// First line of the message, for compact display
    pub fn short_message(&self) -> String {
        self.message.lines().next().unwrap_or("").to_string()
    }
}

impl Packable for Commit {
    fn serialize(&self) -> anyhow::Result<Bytes> {
        let mut object_content = vec![format!("tree {}", self.tree.as_ref())];
        if let Some(parent) = &self.parent {
            object_content.push(format!("parent {}", parent.as_ref()));
        }
        object_content.push(format!("author {}", self.author.display()));
        object_content.push(String::new());
        object_content.push(self.message.to_string());

        let content_bytes = object_content.join("\n").into_bytes();

        let mut commit_bytes = Vec::new();
        let header = format!("{} {}\0", self.object_type().as_str(), content_bytes.len());
        commit_bytes.write_all(header.as_bytes())?;
        commit_bytes.write_all(&content_bytes)?;

        Ok(Bytes::from(commit_bytes))
    }
}

impl Unpackable for Commit {
    fn deserialize(reader: impl BufRead) -> anyhow::Result<Self> {
        let mut content = String::new();
        let mut reader = reader;
        reader.read_to_string(&mut content)?;
        let mut lines = content.lines();

        let tree_line = lines
            .next()
            .context("Invalid commit object: missing tree line")?;
        let tree = ContentDigest::try_parse(
            tree_line
                .strip_prefix("tree ")
                .context("Invalid commit object: invalid tree line")?
                .to_string(),
        )?;

        let mut next_line = lines
            .next()
            .context("Invalid commit object: missing author line")?;

        let mut parent = None;
        if let Some(parent_hex) = next_line.strip_prefix("parent ") {
            parent = Some(ContentDigest::try_parse(parent_hex.to_string())?);
            next_line = lines
                .next()
                .context("Invalid commit object: missing author line")?;
        }

        let author = Author::try_from(
            next_line
                .strip_prefix("author ")
                .context("Invalid commit object: invalid author line")?,
        )?;

        // skip the blank separator line
        lines.next();

        let message = lines.collect::<Vec<&str>>().join("\n");
        Ok(Commit::new(parent, tree, author, message))
    }
}

impl Object for Commit {
    fn object_type(&self) -> ObjectType {
        ObjectType::Commit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::objects::object_type::ObjectType;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn sample_author() -> Author {
        let timestamp = chrono::DateTime::parse_from_rfc3339("2024-03-01T12:30:00+01:00").unwrap();
        Author::new_with_timestamp("sod archive".to_string(), timestamp)
    }

    #[test]
    fn round_trips_with_parent() {
        let commit = Commit::new(
            Some(ContentDigest::hash_bytes(b"parent")),
            ContentDigest::hash_bytes(b"tree"),
            sample_author(),
            "archive batch 42\n\nmore detail".to_string(),
        );

        let bytes = commit.serialize().unwrap();
        let mut reader = Cursor::new(bytes);
        ObjectType::parse_object_type(&mut reader).unwrap();
        let back = Commit::deserialize(reader).unwrap();

        assert_eq!(commit, back);
    }

    #[test]
    fn round_trips_initial_commit() {
        let commit = Commit::new(
            None,
            ContentDigest::hash_bytes(b"tree"),
            sample_author(),
            "initial".to_string(),
        );

        let bytes = commit.serialize().unwrap();
        let mut reader = Cursor::new(bytes);
        ObjectType::parse_object_type(&mut reader).unwrap();
        let back = Commit::deserialize(reader).unwrap();

        assert_eq!(commit, back);
        assert!(back.parent().is_none());
    }

    #[test]
    fn author_display_round_trips() {
        let author = sample_author();
        let back = Author::try_from(author.display().as_str()).unwrap();
        assert_eq!(author, back);
        assert_eq!(back.name(), "sod archive");
    }

    #[test]
    fn equal_commits_have_equal_digests() {
        let make = || {
            Commit::new(
                None,
                ContentDigest::hash_bytes(b"tree"),
                sample_author(),
                "initial".to_string(),
            )
        };
        assert_eq!(make().digest().unwrap(), make().digest().unwrap());
    }
}
