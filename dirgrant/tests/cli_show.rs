//! CLI tests for `dirgrant select`, `show`, `check` and `grants`.
//!
//! Spawns the binary against a temporary state directory and verifies printed
//! output and exit codes across the select → revoke → re-prompt cycle.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use dirgrant::exit_codes;
use dirgrant::io::picker::resolve_directory;

fn dirgrant(state_dir: &Path, args: &[&str], stdin: &str) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_dirgrant"))
        .arg("--state-dir")
        .arg(state_dir)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn dirgrant");
    child
        .stdin
        .take()
        .expect("stdin")
        .write_all(stdin.as_bytes())
        .expect("write stdin");
    child.wait_with_output().expect("dirgrant output")
}

fn stdout(output: &Output) -> String {
    String::from_utf8(output.stdout.clone()).expect("utf8 stdout")
}

#[test]
fn show_without_selection_reports_none_saved() {
    let temp = tempfile::tempdir().expect("tempdir");
    let state_dir = temp.path().join("state");

    let output = dirgrant(&state_dir, &["show"], "\n");

    assert_eq!(output.status.code(), Some(exit_codes::NO_DIRECTORY));
    assert_eq!(stdout(&output), "No Uri Saved.\n");
}

#[test]
fn select_then_revoke_then_reprompt() {
    let temp = tempfile::tempdir().expect("tempdir");
    let state_dir = temp.path().join("state");
    let dir = temp.path().join("photos");
    fs::create_dir(&dir).expect("mkdir");
    let handle = resolve_directory(&dir).expect("resolve");

    let dir_arg = dir.to_str().expect("utf8 path");
    let output = dirgrant(&state_dir, &["select", "--path", dir_arg], "");
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert_eq!(stdout(&output), format!("Uri: {handle}\n"));

    let output = dirgrant(&state_dir, &["show"], "");
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert_eq!(stdout(&output), format!("Uri: {handle}\n"));

    fs::remove_dir(&dir).expect("remove dir");

    let output = dirgrant(&state_dir, &["check"], "");
    assert_eq!(output.status.code(), Some(exit_codes::LAPSED));
    assert_eq!(
        stdout(&output),
        format!("Uri: {handle}\nread: lost\nwrite: lost\n")
    );

    // Dismiss the re-prompt: the lapsed handle stays saved.
    let output = dirgrant(&state_dir, &["show"], "\n");
    assert_eq!(output.status.code(), Some(exit_codes::LAPSED));
    assert_eq!(stdout(&output), format!("Uri: {handle} (access lapsed)\n"));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(stderr.matches("Directory to grant").count(), 1);

    // Answer the re-prompt with a new directory.
    let replacement = temp.path().join("exports");
    fs::create_dir(&replacement).expect("mkdir replacement");
    let new_handle = resolve_directory(&replacement).expect("resolve");
    let output = dirgrant(
        &state_dir,
        &["show"],
        &format!("{}\n", replacement.display()),
    );
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert_eq!(stdout(&output), format!("Uri: {new_handle}\n"));

    let output = dirgrant(&state_dir, &["grants"], "");
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let listing = stdout(&output);
    assert!(listing.contains(&format!("{handle}\tread+write\t")));
    assert!(listing.contains(&format!("{new_handle}\tread+write\t")));
}

#[test]
fn cancelled_select_exits_with_no_directory() {
    let temp = tempfile::tempdir().expect("tempdir");
    let state_dir = temp.path().join("state");

    let output = dirgrant(&state_dir, &["select"], "");

    assert_eq!(output.status.code(), Some(exit_codes::NO_DIRECTORY));
    assert_eq!(stdout(&output), "Selection cancelled.\n");
}

#[test]
fn invalid_config_exits_with_invalid() {
    let temp = tempfile::tempdir().expect("tempdir");
    let state_dir = temp.path().join("state");
    fs::create_dir_all(&state_dir).expect("mkdir");
    fs::write(state_dir.join("config.toml"), "tree_uri_key = \"\"\n").expect("write config");

    let output = dirgrant(&state_dir, &["show"], "");

    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    assert!(String::from_utf8_lossy(&output.stderr).contains("tree_uri_key must be non-empty"));
}

#[test]
fn check_marks_disabled_operability_not_requested() {
    let temp = tempfile::tempdir().expect("tempdir");
    let state_dir = temp.path().join("state");
    fs::create_dir_all(&state_dir).expect("mkdir state");
    fs::write(
        state_dir.join("config.toml"),
        "[operations]\nread = true\nwrite = false\n",
    )
    .expect("write config");
    let dir = temp.path().join("docs");
    fs::create_dir(&dir).expect("mkdir");
    let handle = resolve_directory(&dir).expect("resolve");

    let dir_arg = dir.to_str().expect("utf8 path");
    let output = dirgrant(&state_dir, &["select", "--path", dir_arg], "");
    assert_eq!(output.status.code(), Some(exit_codes::OK));

    let output = dirgrant(&state_dir, &["check"], "");
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert_eq!(
        stdout(&output),
        format!("Uri: {handle}\nread: granted\nwrite: not requested\n")
    );

    let output = dirgrant(&state_dir, &["grants"], "");
    assert!(stdout(&output).contains(&format!("{handle}\tread\t")));
}
