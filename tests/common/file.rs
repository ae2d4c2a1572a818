use derive_new::new;
use std::path::PathBuf;

#[derive(Debug, Clone, new)]
pub struct FileSpec {
    pub path: PathBuf,
    pub content: String,
}

pub fn write_file(spec: FileSpec) {
    if let Some(parent) = spec.path.parent() {
        std::fs::create_dir_all(parent).expect("Failed to create parent directories");
    }
    std::fs::write(&spec.path, spec.content).expect("Failed to write file");
}

/// Rewrite a file's bytes while preserving its size and mtime
///
/// Emulates silent corruption: the stat signature stays identical, only the
/// content changes. The replacement must have the original's length.
pub fn flip_file_content(path: &std::path::Path, replacement: &[u8]) {
    use std::os::unix::fs::MetadataExt;

    let metadata = std::fs::metadata(path).expect("Failed to stat file");
    assert_eq!(
        metadata.size(),
        replacement.len() as u64,
        "replacement must preserve file size"
    );
    let mtime = std::time::SystemTime::UNIX_EPOCH
        + std::time::Duration::new(metadata.mtime() as u64, metadata.mtime_nsec() as u32);

    std::fs::write(path, replacement).expect("Failed to rewrite file");

    let file = std::fs::File::options()
        .write(true)
        .open(path)
        .expect("Failed to reopen file");
    file.set_times(std::fs::FileTimes::new().set_modified(mtime))
        .expect("Failed to restore mtime");
}
