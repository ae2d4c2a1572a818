use assert_fs::TempDir;
use predicates::prelude::predicate;
use rstest::rstest;

mod common;

use common::command::{init_repository_dir, run_sod_command, sod_commit};
use common::file::{FileSpec, write_file};
use common::head_digest;

#[rstest]
fn commit_moves_the_ref_and_clears_the_index(
    init_repository_dir: TempDir,
) -> Result<(), Box<dyn std::error::Error>> {
    let dir = init_repository_dir;
    let first = std::fs::read_to_string(dir.path().join(".sod/refs/heads/master"))?;

    write_file(FileSpec::new(dir.path().join("new.txt"), "fresh".to_string()));
    run_sod_command(dir.path(), &["add", "new.txt"])
        .assert()
        .success();
    sod_commit(dir.path(), "add new file")
        .assert()
        .success()
        .stdout(predicate::str::contains("[master "));

    let second = std::fs::read_to_string(dir.path().join(".sod/refs/heads/master"))?;
    assert_ne!(first, second);

    run_sod_command(dir.path(), &["status", "--staged"])
        .assert()
        .success()
        .stdout(predicate::str::is_match(
            r"^Changes staged for commit:\n\n$",
        )?);

    Ok(())
}

#[rstest]
fn empty_commit_is_refused(
    init_repository_dir: TempDir,
) -> Result<(), Box<dyn std::error::Error>> {
    let dir = init_repository_dir;

    sod_commit(dir.path(), "nothing here")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("no changes staged"));

    Ok(())
}

#[rstest]
fn author_name_comes_from_config(
    init_repository_dir: TempDir,
) -> Result<(), Box<dyn std::error::Error>> {
    let dir = init_repository_dir;

    run_sod_command(dir.path(), &["config", "user.name=archivist"])
        .assert()
        .success();
    run_sod_command(dir.path(), &["config", "user.name"])
        .assert()
        .success()
        .stdout(predicate::str::diff("archivist\n"));

    Ok(())
}

#[rstest]
fn snapshot_hook_receives_the_commit_digest(
    init_repository_dir: TempDir,
) -> Result<(), Box<dyn std::error::Error>> {
    let dir = init_repository_dir;

    run_sod_command(
        dir.path(),
        &["config", r#"snapshot.command=echo "$1" > hook.out"#],
    )
    .assert()
    .success();

    write_file(FileSpec::new(dir.path().join("new.txt"), "fresh".to_string()));
    run_sod_command(dir.path(), &["add", "new.txt"])
        .assert()
        .success();
    sod_commit(dir.path(), "introduce content").assert().success();

    let hook_out = std::fs::read_to_string(dir.path().join("hook.out"))?;
    assert_eq!(hook_out.trim(), head_digest(dir.path()));

    Ok(())
}

#[rstest]
fn pure_rename_commit_skips_the_snapshot_hook(
    init_repository_dir: TempDir,
) -> Result<(), Box<dyn std::error::Error>> {
    let dir = init_repository_dir;

    run_sod_command(dir.path(), &["config", "snapshot.command=touch hook.ran"])
        .assert()
        .success();

    std::fs::rename(dir.path().join("1.txt"), dir.path().join("renamed.txt"))?;
    run_sod_command(dir.path(), &["add", "."]).assert().success();
    sod_commit(dir.path(), "rename only").assert().success();

    assert!(!dir.path().join("hook.ran").exists());

    Ok(())
}

#[rstest]
fn no_snapshot_flag_suppresses_the_hook(
    init_repository_dir: TempDir,
) -> Result<(), Box<dyn std::error::Error>> {
    let dir = init_repository_dir;

    run_sod_command(dir.path(), &["config", "snapshot.command=touch hook.ran"])
        .assert()
        .success();

    write_file(FileSpec::new(dir.path().join("new.txt"), "fresh".to_string()));
    run_sod_command(dir.path(), &["add", "new.txt"])
        .assert()
        .success();
    run_sod_command(dir.path(), &["commit", "-m", "quiet", "--no-snapshot"])
        .assert()
        .success();

    assert!(!dir.path().join("hook.ran").exists());

    Ok(())
}

#[rstest]
fn failing_snapshot_hook_is_only_a_warning(
    init_repository_dir: TempDir,
) -> Result<(), Box<dyn std::error::Error>> {
    let dir = init_repository_dir;

    run_sod_command(dir.path(), &["config", "snapshot.command=false"])
        .assert()
        .success();

    write_file(FileSpec::new(dir.path().join("new.txt"), "fresh".to_string()));
    run_sod_command(dir.path(), &["add", "new.txt"])
        .assert()
        .success();

    // the commit itself succeeds; the hook failure lands on stderr
    sod_commit(dir.path(), "hook fails")
        .assert()
        .success()
        .stderr(predicate::str::contains("snapshot command failed"));

    // and the history records the commit
    run_sod_command(dir.path(), &["log"])
        .assert()
        .success()
        .stdout(predicate::str::contains("hook fails"));

    Ok(())
}
