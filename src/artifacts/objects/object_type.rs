use std::io::BufRead;

/// Kind of a stored object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectType {
    Tree,
    Commit,
}

impl ObjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::Tree => "tree",
            ObjectType::Commit => "commit",
        }
    }

    /// Parse the `<kind> <size>\0` header off the front of an object stream
    ///
    /// Leaves the reader positioned at the start of the canonical body.
    pub fn parse_object_type(reader: &mut impl BufRead) -> anyhow::Result<ObjectType> {
        let mut kind = Vec::new();
        reader.read_until(b' ', &mut kind)?;
        if kind.pop() != Some(b' ') {
            return Err(anyhow::anyhow!("Truncated object header"));
        }

        let mut size = Vec::new();
        reader.read_until(b'\0', &mut size)?;
        if size.pop() != Some(b'\0') {
            return Err(anyhow::anyhow!("Truncated object header"));
        }

        match kind.as_slice() {
            b"tree" => Ok(ObjectType::Tree),
            b"commit" => Ok(ObjectType::Commit),
            other => Err(anyhow::anyhow!(
                "Unknown object kind: {}",
                String::from_utf8_lossy(other)
            )),
        }
    }
}

impl std::fmt::Display for ObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
