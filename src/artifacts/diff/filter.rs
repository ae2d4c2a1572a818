//! Diff status filter
//!
//! A filter string is any mix of the letters `A C D M R` and their
//! lowercase complements. An entry with status letter X is selected when
//! (no uppercase letters are given, or X is among them) and x is not among
//! the lowercase letters. `--filter A` and `--filter a` therefore partition
//! any diff, and a mixed string like `aD` reads "deleted, and not added".

use crate::artifacts::diff::DiffStatus;
use crate::errors::SodError;
use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct StatusSet: u32 {
        const ADDED = 0b00001;
        const COPIED = 0b00010;
        const DELETED = 0b00100;
        const MODIFIED = 0b01000;
        const RENAMED = 0b10000;
    }
}

impl From<DiffStatus> for StatusSet {
    fn from(status: DiffStatus) -> Self {
        match status {
            DiffStatus::Added => StatusSet::ADDED,
            DiffStatus::Copied => StatusSet::COPIED,
            DiffStatus::Deleted => StatusSet::DELETED,
            DiffStatus::Modified => StatusSet::MODIFIED,
            DiffStatus::Renamed => StatusSet::RENAMED,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffFilter {
    include: StatusSet,
    exclude: StatusSet,
}

impl DiffFilter {
    pub fn parse(filter: &str) -> anyhow::Result<Self> {
        let mut include = StatusSet::empty();
        let mut exclude = StatusSet::empty();

        for c in filter.chars() {
            let flag = match c.to_ascii_uppercase() {
                'A' => StatusSet::ADDED,
                'C' => StatusSet::COPIED,
                'D' => StatusSet::DELETED,
                'M' => StatusSet::MODIFIED,
                'R' => StatusSet::RENAMED,
                _ => {
                    return Err(SodError::BadArgument(format!(
                        "not a valid filter string: {}",
                        filter
                    ))
                    .into());
                }
            };
            if c.is_ascii_uppercase() {
                include |= flag;
            } else {
                exclude |= flag;
            }
        }

        Ok(DiffFilter { include, exclude })
    }

    pub fn selects(&self, status: DiffStatus) -> bool {
        let flag = StatusSet::from(status);
        (self.include.is_empty() || self.include.contains(flag)) && !self.exclude.contains(flag)
    }

    /// Copy detection is opt-in: it runs only when `C` was requested
    pub fn wants_copies(&self) -> bool {
        self.include.contains(StatusSet::COPIED)
    }
}
