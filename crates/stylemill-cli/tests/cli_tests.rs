use assert_cmd::Command;
use indoc::indoc;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn stylemill_cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("stylemill"))
}

// ============================================================================
// PROJECT INITIALIZATION TESTS
// ============================================================================

#[test]
fn test_init_creates_config_file() {
    let temp_dir = TempDir::new().unwrap();

    stylemill_cmd()
        .current_dir(&temp_dir)
        .arg("--init")
        .assert()
        .success()
        .stdout(predicate::str::contains("stylemill.json"));

    let config = fs::read_to_string(temp_dir.path().join("stylemill.json")).unwrap();
    assert!(config.contains("\"src\": \"styles\""));
    assert!(config.contains("\"maxAge\": 0"));
    assert!(temp_dir.path().join("styles").is_dir());
}

#[test]
fn test_init_refuses_to_overwrite() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("stylemill.json"), "{}").unwrap();

    stylemill_cmd()
        .current_dir(&temp_dir)
        .arg("--init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

// ============================================================================
// CONFIGURATION TESTS
// ============================================================================

#[test]
fn test_missing_source_directory_is_an_error() {
    let temp_dir = TempDir::new().unwrap();

    stylemill_cmd()
        .current_dir(&temp_dir)
        .arg("/site.css")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No source directory"));
}

#[test]
fn test_malformed_config_is_reported() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("broken.json"), "{ \"src\": ").unwrap();

    stylemill_cmd()
        .current_dir(&temp_dir)
        .args(["--project", "broken.json", "/site.css"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load config file"));
}

#[test]
fn test_yaml_config_is_discovered() {
    let temp_dir = TempDir::new().unwrap();
    fs::create_dir_all(temp_dir.path().join("assets/scss")).unwrap();
    fs::write(
        temp_dir.path().join("stylemill.yaml"),
        indoc! {"
            src: assets/scss
            prefix: /css
        "},
    )
    .unwrap();

    stylemill_cmd()
        .current_dir(&temp_dir)
        .args(["/js/app.css", "/css/site.css"])
        .assert()
        .success()
        .stdout(predicate::str::contains("skipped  /js/app.css"))
        .stdout(predicate::str::contains("missing  /css/site.css"));
}

#[test]
fn test_unknown_output_style_is_rejected() {
    stylemill_cmd()
        .args(["--src", "styles", "--output-style", "tiny", "/a.css"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown output style"));
}

// ============================================================================
// REQUEST TESTS
// ============================================================================

#[test]
fn test_no_request_paths() {
    let temp_dir = TempDir::new().unwrap();

    stylemill_cmd()
        .current_dir(&temp_dir)
        .args(["--src", "styles"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No request paths specified"));
}

#[test]
fn test_non_css_requests_are_skipped() {
    let temp_dir = TempDir::new().unwrap();
    fs::create_dir_all(temp_dir.path().join("styles")).unwrap();

    stylemill_cmd()
        .current_dir(&temp_dir)
        .args(["--src", "styles", "/app.js", "/logo.png"])
        .assert()
        .success()
        .stdout(predicate::str::contains("skipped  /app.js"))
        .stdout(predicate::str::contains("skipped  /logo.png"));
}

#[test]
fn test_post_requests_are_skipped() {
    let temp_dir = TempDir::new().unwrap();

    stylemill_cmd()
        .current_dir(&temp_dir)
        .args(["--src", "styles", "--method", "POST", "/site.css"])
        .assert()
        .success()
        .stdout(predicate::str::contains("skipped  /site.css"));
}

#[test]
fn test_missing_source_is_reported() {
    let temp_dir = TempDir::new().unwrap();
    fs::create_dir_all(temp_dir.path().join("styles")).unwrap();

    stylemill_cmd()
        .current_dir(&temp_dir)
        .args(["--src", "styles", "/site.css"])
        .assert()
        .success()
        .stdout(predicate::str::contains("missing  /site.css"));

    assert!(!temp_dir.path().join("styles/site.css").exists());
}

#[test]
fn test_compiler_failure_fails_the_run() {
    let temp_dir = TempDir::new().unwrap();
    fs::create_dir_all(temp_dir.path().join("styles")).unwrap();
    fs::write(temp_dir.path().join("styles/site.scss"), "a { color: red; }").unwrap();

    stylemill_cmd()
        .current_dir(&temp_dir)
        .args([
            "--src",
            "styles",
            "--sass",
            "/nonexistent/stylemill-sass",
            "/site.css",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to run"))
        .stderr(predicate::str::contains("1 request(s) failed"));

    assert!(!temp_dir.path().join("styles/site.css").exists());
}

#[cfg(unix)]
#[test]
fn test_compiles_with_sass_executable() {
    let temp_dir = TempDir::new().unwrap();
    let styles = temp_dir.path().join("styles");
    fs::create_dir_all(&styles).unwrap();
    fs::write(
        styles.join("site.scss"),
        indoc! {r#"
            @import "functions";
            a { font-size: rem(16); }
        "#},
    )
    .unwrap();
    fs::write(
        styles.join("_functions.scss"),
        "@function rem($px) { @return $px / 16 * 1rem; }\n",
    )
    .unwrap();
    let sass = stylemill_test_helpers::fake_sass(temp_dir.path());

    stylemill_cmd()
        .current_dir(&temp_dir)
        .arg("--src")
        .arg("styles")
        .arg("--source-map")
        .arg("--sass")
        .arg(&sass)
        .arg("/site.css")
        .assert()
        .success()
        .stdout(predicate::str::contains("compiled /site.css -> styles/site.css"))
        .stdout(predicate::str::contains("map styles/site.css.map"));

    let css = fs::read_to_string(styles.join("site.css")).unwrap();
    assert!(css.contains("color: red;"));
    assert!(css.ends_with("/*# sourceMappingURL=site.css.map */\n"));

    let map = fs::read_to_string(styles.join("site.css.map")).unwrap();
    assert!(map.contains(r#""file":"site.css""#));
    assert!(map.contains("site.scss"));
}
