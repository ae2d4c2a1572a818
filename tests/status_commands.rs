use assert_fs::TempDir;
use predicates::prelude::predicate;
use pretty_assertions::assert_eq;
use rstest::rstest;

mod common;

use common::command::{init_repository_dir, repository_dir, run_sod_command, sod_commit};
use common::file::{FileSpec, flip_file_content, write_file};

#[rstest]
fn clean_repository_reports_empty_sections(
    init_repository_dir: TempDir,
) -> Result<(), Box<dyn std::error::Error>> {
    let dir = init_repository_dir;

    let output = run_sod_command(dir.path(), &["status"]).assert().success();
    let stdout = String::from_utf8(output.get_output().stdout.clone())?;

    assert_eq!(
        stdout,
        "Changes staged for commit:\n\nChanges not staged for commit:\n\n"
    );

    Ok(())
}

#[rstest]
fn untracked_file_appears_as_unstaged_addition(
    init_repository_dir: TempDir,
) -> Result<(), Box<dyn std::error::Error>> {
    let dir = init_repository_dir;
    write_file(FileSpec::new(dir.path().join("new.txt"), "fresh".to_string()));

    run_sod_command(dir.path(), &["status"])
        .assert()
        .success()
        .stdout(predicate::str::is_match(
            r"Changes not staged for commit:\n  added:\s+-\s+new\.txt\n",
        )?);

    Ok(())
}

#[rstest]
fn staged_changes_move_to_the_staged_section(
    init_repository_dir: TempDir,
) -> Result<(), Box<dyn std::error::Error>> {
    let dir = init_repository_dir;
    write_file(FileSpec::new(dir.path().join("new.txt"), "fresh".to_string()));

    run_sod_command(dir.path(), &["add", "new.txt"])
        .assert()
        .success();

    let output = run_sod_command(dir.path(), &["status"]).assert().success();
    let stdout = String::from_utf8(output.get_output().stdout.clone())?;

    assert!(stdout.contains("Changes staged for commit:\n  added:"));
    assert!(stdout.contains("new.txt"));
    // nothing left unstaged
    assert!(stdout.ends_with("Changes not staged for commit:\n\n"));

    Ok(())
}

#[rstest]
fn deleted_file_is_reported_with_its_old_digest(
    init_repository_dir: TempDir,
) -> Result<(), Box<dyn std::error::Error>> {
    let dir = init_repository_dir;
    std::fs::remove_file(dir.path().join("1.txt"))?;

    run_sod_command(dir.path(), &["status", "--no-abbrev"])
        .assert()
        .success()
        .stdout(predicate::str::is_match(
            // sha1("one")
            r"deleted:\s+fe05bcdcdc4928012781a5f1a2a77cbb5398e106\s+1\.txt",
        )?);

    Ok(())
}

#[rstest]
fn renamed_file_is_paired_in_the_unstaged_section(
    init_repository_dir: TempDir,
) -> Result<(), Box<dyn std::error::Error>> {
    let dir = init_repository_dir;
    std::fs::rename(dir.path().join("1.txt"), dir.path().join("renamed.txt"))?;

    run_sod_command(dir.path(), &["status"])
        .assert()
        .success()
        .stdout(predicate::str::is_match(
            r"renamed:\s+\S+\s+1\.txt -> renamed\.txt",
        )?);

    Ok(())
}

#[rstest]
fn silent_corruption_is_invisible_without_rehash(
    init_repository_dir: TempDir,
) -> Result<(), Box<dyn std::error::Error>> {
    let dir = init_repository_dir;

    // warm the digest cache
    run_sod_command(dir.path(), &["status"]).assert().success();

    // flip a byte, keeping size and mtime
    flip_file_content(&dir.path().join("a/2.txt"), b"twX");

    let output = run_sod_command(dir.path(), &["status"]).assert().success();
    let stdout = String::from_utf8(output.get_output().stdout.clone())?;
    assert_eq!(
        stdout,
        "Changes staged for commit:\n\nChanges not staged for commit:\n\n"
    );

    run_sod_command(dir.path(), &["status", "--rehash"])
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"modified:\s+\S+\s+a/2\.txt")?);

    Ok(())
}

#[rstest]
fn ignored_directories_are_listed_on_request(
    init_repository_dir: TempDir,
) -> Result<(), Box<dyn std::error::Error>> {
    let dir = init_repository_dir;
    write_file(FileSpec::new(
        dir.path().join("vendor/.sodignore"),
        String::new(),
    ));
    write_file(FileSpec::new(
        dir.path().join("vendor/blob.bin"),
        "ignored".to_string(),
    ));

    let output = run_sod_command(dir.path(), &["status", "--ignored"])
        .assert()
        .success();
    let stdout = String::from_utf8(output.get_output().stdout.clone())?;

    assert!(stdout.contains("Ignored files:\n  vendor/\n"));
    assert!(!stdout.contains("blob.bin"));

    Ok(())
}

#[rstest]
fn status_restricted_by_pattern(
    init_repository_dir: TempDir,
) -> Result<(), Box<dyn std::error::Error>> {
    let dir = init_repository_dir;
    std::fs::remove_file(dir.path().join("1.txt"))?;
    std::fs::remove_file(dir.path().join("a/2.txt"))?;

    let output = run_sod_command(dir.path(), &["status", "a"])
        .assert()
        .success();
    let stdout = String::from_utf8(output.get_output().stdout.clone())?;

    assert!(stdout.contains("a/2.txt"));
    assert!(!stdout.contains("1.txt"));

    Ok(())
}

#[rstest]
fn corrupt_object_store_is_a_fatal_error(
    init_repository_dir: TempDir,
) -> Result<(), Box<dyn std::error::Error>> {
    let dir = init_repository_dir;

    // damage every stored object
    for shard in std::fs::read_dir(dir.path().join(".sod/objects"))? {
        for object in std::fs::read_dir(shard?.path())? {
            std::fs::write(object?.path(), b"garbage")?;
        }
    }

    run_sod_command(dir.path(), &["status"])
        .assert()
        .failure()
        .code(2);

    Ok(())
}

#[rstest]
fn basic_add_commit_status_round_trip(
    repository_dir: TempDir,
) -> Result<(), Box<dyn std::error::Error>> {
    let dir = repository_dir;

    run_sod_command(dir.path(), &["init"]).assert().success();
    write_file(FileSpec::new(dir.path().join("a.txt"), "hello".to_string()));

    run_sod_command(dir.path(), &["add", "a.txt"])
        .assert()
        .success();
    sod_commit(dir.path(), "x").assert().success();

    let output = run_sod_command(dir.path(), &["status"]).assert().success();
    let stdout = String::from_utf8(output.get_output().stdout.clone())?;
    assert_eq!(
        stdout,
        "Changes staged for commit:\n\nChanges not staged for commit:\n\n"
    );

    // log shows the single commit introducing a.txt with sha1("hello")
    run_sod_command(dir.path(), &["log", "--no-abbrev"])
        .assert()
        .success()
        .stdout(predicate::str::contains("x"))
        .stdout(predicate::str::is_match(
            r"added:\s+-\s+a\.txt",
        )?);

    Ok(())
}
