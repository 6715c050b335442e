//! End-to-end tests for the `sanicheck` binary itself, as opposed to the
//! library-level tests in `orchestration.rs`/`pathengine.rs`.
//!
//! Only subcommands that don't need a compiled check-pack dynamic library
//! are exercised here (`pathengine`, `completions`, `--help`) — `run`/
//! `run-check`/`list` against real plugins would require building one,
//! which this test suite has no toolchain access to do.

use assert_cmd::Command;
use assert_fs::prelude::*;
use predicates::prelude::*;

fn sanicheck() -> Command {
    Command::cargo_bin("sanicheck").unwrap()
}

#[test]
fn help_lists_every_subcommand() {
    sanicheck()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("pathengine"))
        .stdout(predicate::str::contains("run-check"))
        .stdout(predicate::str::contains("completions"));
}

#[test]
fn completions_prints_a_nonempty_script_for_each_shell() {
    for shell in ["bash", "zsh", "fish", "power-shell"] {
        sanicheck()
            .args(["completions", shell])
            .assert()
            .success()
            .stdout(predicate::str::is_empty().not());
    }
}

#[test]
fn pathengine_solve_and_parse_round_trip_through_a_config_file() {
    let repo = assert_fs::TempDir::new().unwrap();
    repo.child("folderstructure.conf").write_str(
        r#"{
            "tokens": {"step": {"options": {"modeling": "mdl", "rigging": "rig"}}},
            "templates": {"step_path": "{root}/{project}/{step}"}
        }"#,
    ).unwrap();

    let config = assert_fs::TempDir::new().unwrap();
    let config_path = config.child("sanicheck.toml");
    config_path
        .write_str(&format!("pathengine_repo = \"{}\"\n", repo.path().display()))
        .unwrap();

    sanicheck()
        .args(["--config", config_path.path().to_str().unwrap()])
        .args(["pathengine", "solve", "step_path", "root=Y:", "project=K", "step=modeling"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Y:/K/mdl"));

    sanicheck()
        .args(["--config", config_path.path().to_str().unwrap()])
        .args(["pathengine", "parse", "step_path", "Y:/K/mdl"])
        .assert()
        .success()
        .stdout(predicate::str::contains("step=modeling"));
}

#[test]
fn pathengine_solve_with_missing_field_fails_with_a_nonzero_exit() {
    let repo = assert_fs::TempDir::new().unwrap();
    repo.child("folderstructure.conf")
        .write_str(r#"{"tokens": {}, "templates": {"p": "/proj/{shot}/{version}"}}"#)
        .unwrap();

    let config = assert_fs::TempDir::new().unwrap();
    let config_path = config.child("sanicheck.toml");
    config_path
        .write_str(&format!("pathengine_repo = \"{}\"\n", repo.path().display()))
        .unwrap();

    sanicheck()
        .args(["--config", config_path.path().to_str().unwrap()])
        .args(["pathengine", "solve", "p", "shot=sh010"])
        .assert()
        .failure();
}
