use crate::common::file::{FileSpec, write_file};
use assert_cmd::Command;
use assert_fs::TempDir;
use rstest::fixture;
use std::path::Path;

#[fixture]
pub fn repository_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp dir")
}

/// A repository with three committed files: 1.txt, a/2.txt, a/b/3.txt
#[fixture]
pub fn init_repository_dir(repository_dir: TempDir) -> TempDir {
    run_sod_command(repository_dir.path(), &["init"])
        .assert()
        .success();

    write_file(FileSpec::new(
        repository_dir.path().join("1.txt"),
        "one".to_string(),
    ));
    write_file(FileSpec::new(
        repository_dir.path().join("a").join("2.txt"),
        "two".to_string(),
    ));
    write_file(FileSpec::new(
        repository_dir.path().join("a").join("b").join("3.txt"),
        "three".to_string(),
    ));

    run_sod_command(repository_dir.path(), &["add", "."])
        .assert()
        .success();
    sod_commit(repository_dir.path(), "Initial commit")
        .assert()
        .success();

    repository_dir
}

pub fn run_sod_command(dir: &Path, args: &[&str]) -> Command {
    let mut cmd = Command::cargo_bin("sod").expect("Failed to find sod binary");
    cmd.current_dir(dir);
    for arg in args {
        cmd.arg(arg);
    }
    cmd
}

pub fn sod_commit(dir: &Path, message: &str) -> Command {
    run_sod_command(dir, &["commit", "-m", message])
}
