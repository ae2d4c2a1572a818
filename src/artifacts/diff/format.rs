//! Diff output
//!
//! Two renditions: a human-readable listing used by `status`, `log` and
//! plain `diff`, and a parseable raw mode.
//!
//! Raw records are `STATUS ' ' OLD_DIGEST SEP OLD_PATH [SEP NEW_PATH] TERM`
//! with TAB/LF separators, or NUL/NUL in null-terminated mode. Pure
//! additions print the zero digest. Paths are written as raw bytes.

use crate::artifacts::diff::{DiffEntry, DiffStatus};
use crate::artifacts::objects::digest::ContentDigest;
use crate::artifacts::objects::{DIGEST_ABBREV_MIN, DIGEST_HEX_LENGTH};
use std::io::Write;
use std::os::unix::ffi::OsStrExt;

/// Width of the status label column in pretty output
const LABEL_WIDTH: usize = 10;

/// Shortest width at which every digest in the set stays unambiguous
///
/// Never below the minimum display width. An empty set abbreviates to the
/// minimum.
pub fn abbrev_width<'a>(digests: impl Iterator<Item = &'a ContentDigest>) -> usize {
    let mut hex: Vec<&str> = digests.map(|digest| digest.as_ref()).collect();
    hex.sort_unstable();
    hex.dedup();

    let mut width = DIGEST_ABBREV_MIN;
    for pair in hex.windows(2) {
        let common = pair[0]
            .bytes()
            .zip(pair[1].bytes())
            .take_while(|(a, b)| a == b)
            .count();
        width = width.max(common + 1);
    }
    width.min(DIGEST_HEX_LENGTH)
}

fn path_info(entry: &DiffEntry) -> String {
    if entry.old_path == entry.new_path {
        entry.old_path.display().to_string()
    } else {
        format!(
            "{} -> {}",
            entry.old_path.display(),
            entry.new_path.display()
        )
    }
}

/// Human-readable listing, one indented line per entry
///
/// The old-digest column shows `-` for pure additions, matching the raw
/// mode's zero digest.
pub fn write_pretty(
    writer: &mut impl Write,
    entries: &[DiffEntry],
    digest_width: usize,
) -> anyhow::Result<()> {
    for entry in entries {
        let old_digest = match &entry.old_digest {
            Some(digest) => digest.abbreviate(digest_width).to_string(),
            None => "-".to_string(),
        };

        writeln!(
            writer,
            "  {:<label_w$}  {:<digest_w$}  {}",
            entry.status.label(),
            old_digest,
            path_info(entry),
            label_w = LABEL_WIDTH,
            digest_w = digest_width,
        )?;
    }
    Ok(())
}

/// Raw, parse-friendly records
pub fn write_raw(
    writer: &mut impl Write,
    entries: &[DiffEntry],
    null_terminated: bool,
) -> anyhow::Result<()> {
    let (separator, terminator) = if null_terminated {
        (b'\0', b'\0')
    } else {
        (b'\t', b'\n')
    };

    for entry in entries {
        let old_digest = entry
            .old_digest
            .clone()
            .unwrap_or_else(ContentDigest::zero);

        write!(writer, "{} {}", entry.status.letter(), old_digest)?;
        writer.write_all(&[separator])?;
        writer.write_all(entry.old_path.as_os_str().as_bytes())?;
        if entry.old_path != entry.new_path {
            writer.write_all(&[separator])?;
            writer.write_all(entry.new_path.as_os_str().as_bytes())?;
        }
        writer.write_all(&[terminator])?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn entry(status: DiffStatus, old: &str, new: &str, digest: Option<&[u8]>) -> DiffEntry {
        DiffEntry {
            status,
            old_path: PathBuf::from(old),
            new_path: PathBuf::from(new),
            old_digest: digest.map(ContentDigest::hash_bytes),
            new_digest: None,
        }
    }

    #[test]
    fn abbreviation_never_drops_below_minimum() {
        let a = ContentDigest::hash_bytes(b"a");
        let b = ContentDigest::hash_bytes(b"b");
        assert_eq!(abbrev_width([&a, &b].into_iter()), DIGEST_ABBREV_MIN);
        assert_eq!(abbrev_width(std::iter::empty()), DIGEST_ABBREV_MIN);
    }

    #[test]
    fn abbreviation_widens_on_shared_prefix() {
        let a = ContentDigest::try_parse(format!("{}{}", "ab".repeat(10), "0".repeat(20))).unwrap();
        let b = ContentDigest::try_parse(format!("{}{}", "ab".repeat(10), "1".repeat(20))).unwrap();
        // 20 shared leading chars force width 21
        assert_eq!(abbrev_width([&a, &b].into_iter()), 21);
    }

    #[test]
    fn raw_record_for_rename() {
        let entries = vec![entry(
            DiffStatus::Renamed,
            "dir1/p.jpg",
            "dir2/p.jpg",
            Some(b"photo"),
        )];

        let mut out = Vec::new();
        write_raw(&mut out, &entries, false).unwrap();

        let expected = format!(
            "R {}\tdir1/p.jpg\tdir2/p.jpg\n",
            ContentDigest::hash_bytes(b"photo")
        );
        assert_eq!(String::from_utf8(out).unwrap(), expected);
    }

    #[test]
    fn raw_addition_uses_zero_digest() {
        let entries = vec![entry(DiffStatus::Added, "new.txt", "new.txt", None)];

        let mut out = Vec::new();
        write_raw(&mut out, &entries, false).unwrap();

        let expected = format!("A {}\tnew.txt\n", ContentDigest::zero());
        assert_eq!(String::from_utf8(out).unwrap(), expected);
    }

    #[test]
    fn null_terminated_records_use_nul_for_both() {
        let entries = vec![
            entry(DiffStatus::Deleted, "gone.txt", "gone.txt", Some(b"x")),
            entry(DiffStatus::Renamed, "a", "b", Some(b"y")),
        ];

        let mut out = Vec::new();
        write_raw(&mut out, &entries, true).unwrap();

        let digest_x = ContentDigest::hash_bytes(b"x");
        let digest_y = ContentDigest::hash_bytes(b"y");
        let expected = format!("D {digest_x}\0gone.txt\0R {digest_y}\0a\0b\0");
        assert_eq!(String::from_utf8(out).unwrap(), expected);
    }

    #[test]
    fn pretty_listing_pads_columns() {
        let entries = vec![entry(DiffStatus::Added, "a.txt", "a.txt", None)];

        let mut out = Vec::new();
        write_pretty(&mut out, &entries, 10).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "  added:      -           a.txt\n"
        );
    }
}
