//! CLI tests: exit codes, stdout tables and stderr error lines of the binary.

mod common;

use assert_cmd::Command;
use common::{Fixture, POST, USER};
use predicates::prelude::*;

fn tabulum(fixture: &Fixture) -> Command {
    let mut cmd = Command::cargo_bin("tabulum").unwrap();
    cmd.current_dir(fixture.dir.path())
        .env_remove("RUST_LOG")
        .arg("--config")
        .arg(&fixture.config);
    cmd
}

#[test]
fn list_prints_table_and_exits_zero() {
    let fixture = Fixture::new();

    tabulum(&fixture)
        .args(["list", USER])
        .assert()
        .success()
        .stdout(predicate::str::contains("| id | name  | created_at          | posts |"))
        .stdout(predicate::str::contains("| 1  | Alice | 2024-01-02 03:04:05 | N/A   |"));
}

#[test]
fn list_with_associations_and_limit() {
    let fixture = Fixture::new();

    tabulum(&fixture)
        .args(["list", POST, "--associations-ignore", "no", "--associations-limit", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("| 1  | First  | Alice  | #rust |"));
}

#[test]
fn list_zero_rows_still_succeeds() {
    let fixture = Fixture::new();

    tabulum(&fixture)
        .args(["list", USER, "--offset", "50"])
        .assert()
        .success()
        .stdout(predicate::str::contains("| id |"));
}

#[test]
fn unknown_identifier_exits_one() {
    let fixture = Fixture::new();

    tabulum(&fixture)
        .args(["list", r"App\Entity\InvalidClass"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains(r#"Entity class "App\Entity\InvalidClass" does not exist."#));
}

#[test]
fn non_entity_table_exits_one() {
    let fixture = Fixture::new();

    tabulum(&fixture)
        .args(["list", "settings"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains(r#"Entity class "settings" is not a recognized entity."#));
}

#[test]
fn json_format_prints_envelopes() {
    let fixture = Fixture::new();

    tabulum(&fixture)
        .args(["list", USER, "--format", "json", "--limit", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""ok":true"#))
        .stdout(predicate::str::contains(r#""command":"list""#))
        .stdout(predicate::str::contains(r#""rows_returned":1"#));

    tabulum(&fixture)
        .args(["list", "Nope", "--format", "json"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains(r#""code":"ENTITY_NOT_FOUND""#));
}

#[test]
fn list_translatable_reads_locale() {
    let fixture = Fixture::new();

    tabulum(&fixture)
        .args(["list-translatable", POST, "--locale", "de_DE"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Erster"))
        .stdout(predicate::str::contains("Zweiter"));
}

#[test]
fn bad_date_format_is_fatal() {
    let fixture = Fixture::new();

    tabulum(&fixture)
        .args(["list", USER, "--date-format", "%Q"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Invalid date format"));
}

#[test]
fn missing_config_file_is_fatal() {
    let fixture = Fixture::new();

    Command::cargo_bin("tabulum")
        .unwrap()
        .current_dir(fixture.dir.path())
        .args(["--config", "does-not-exist.json", "list", USER])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("[ERROR]"));
}

#[test]
fn database_flag_overrides_config() {
    let fixture = Fixture::new();
    let copy = fixture.dir.path().join("copy.db");
    std::fs::copy(&fixture.database, &copy).unwrap();
    std::fs::remove_file(&fixture.database).unwrap();

    tabulum(&fixture)
        .arg("--database")
        .arg(&copy)
        .args(["list", USER])
        .assert()
        .success()
        .stdout(predicate::str::contains("Alice"));
}

#[test]
fn configured_default_entity_makes_positional_optional() {
    let fixture = Fixture::new();
    let mut config: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&fixture.config).unwrap()).unwrap();
    config["defaults"] = serde_json::json!({ "entity": USER });
    let with_default = fixture.dir.path().join("with-default.json");
    std::fs::write(&with_default, config.to_string()).unwrap();

    Command::cargo_bin("tabulum")
        .unwrap()
        .current_dir(fixture.dir.path())
        .env_remove("RUST_LOG")
        .arg("--config")
        .arg(&with_default)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("| 1  | Alice | 2024-01-02 03:04:05 | N/A   |"));

    Command::cargo_bin("tabulum")
        .unwrap()
        .current_dir(fixture.dir.path())
        .env_remove("RUST_LOG")
        .arg("--config")
        .arg(&with_default)
        .args(["list", POST, "--limit", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("| 1  | First |"));
}

#[test]
fn missing_entity_without_default_is_fatal() {
    let fixture = Fixture::new();

    tabulum(&fixture)
        .arg("list")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("No entity given"));
}
