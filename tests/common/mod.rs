#![allow(dead_code)]

pub mod command;
pub mod file;

use std::path::Path;

/// Copy a repository (including `.sod`) into a snapshot root
///
/// Auxiliary-store tests use this to fake an external snapshot: a plain
/// copy of the repository tree as a snapshot tool would produce it.
pub fn mirror_repository(repo: &Path, snapshot_root: &Path) {
    copy_dir(repo, snapshot_root);
}

fn copy_dir(from: &Path, to: &Path) {
    std::fs::create_dir_all(to).expect("Failed to create snapshot directory");
    for entry in std::fs::read_dir(from).expect("Failed to list directory") {
        let entry = entry.expect("Failed to read directory entry");
        let target = to.join(entry.file_name());
        let file_type = entry.file_type().expect("Failed to stat entry");
        if file_type.is_dir() {
            copy_dir(&entry.path(), &target);
        } else if file_type.is_file() {
            std::fs::copy(entry.path(), &target).expect("Failed to copy file");
        }
    }
}

/// Extract the full digest of HEAD via the raw diff of a known commit pair
pub fn head_digest(dir: &Path) -> String {
    let output = command::run_sod_command(dir, &["log", "--no-abbrev"])
        .output()
        .expect("Failed to run sod log");
    let stdout = String::from_utf8(output.stdout).expect("log output is not UTF-8");
    let first = stdout.lines().next().expect("empty log output");
    first
        .split_whitespace()
        .nth(1)
        .expect("malformed log header")
        .to_string()
}
