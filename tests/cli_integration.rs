//! CLI integration tests for Pantry.
//!
//! Every test points `PANTRY_HOME` at a temporary folder so profiles and
//! the package cache never touch the real home directory.

use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get the pantry binary command with an isolated home.
fn pantry(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("pantry").unwrap();
    cmd.env("PANTRY_HOME", home).env_remove("PANTRY_INDEX");
    cmd
}

/// A temporary home holding a Linux default profile, plus a work folder.
fn setup() -> (TempDir, TempDir) {
    let home = TempDir::new().unwrap();
    let profiles = home.path().join("profiles");
    fs::create_dir_all(&profiles).unwrap();
    fs::write(
        profiles.join("default"),
        "[settings]\nos=Linux\narch=x86_64\ncompiler=gcc\ncompiler.version=11\nbuild_type=Release\n",
    )
    .unwrap();
    fs::write(
        profiles.join("windows"),
        "[settings]\nos=Windows\narch=x86_64\ncompiler=msvc\ncompiler.version=193\nbuild_type=Release\n",
    )
    .unwrap();
    (home, TempDir::new().unwrap())
}

fn write_recipe(dir: &Path, files: &[(&str, &str)]) {
    for (path, content) in files {
        let path = dir.join(path);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }
}

const HEADER_ONLY: &str = r#"
[package]
name = "mdspan"
version = "0.6.0"
package_type = "header-library"
settings = ["os", "arch", "compiler", "build_type"]
exports_sources = ["include/*"]

[[package.copy]]
pattern = "*.hpp"
from = "export_sources"
src = "include"
dst = "include"
"#;

const POSIX_ONLY: &str = r#"
[package]
name = "libuv"
version = "1.47.0"
package_type = "static-library"
settings = ["os"]

[[invalid]]
when = { os = "Windows" }
message = "only Linux supported"
"#;

const BACKEND: &str = r#"
[package]
name = "pico"
version = "1.0"

[options]
backend = ["c", "pico"]

[default_options]
backend = "c"
"#;

// ============================================================================
// pantry cache
// ============================================================================

#[test]
fn test_cache_path_follows_home() {
    let (home, _work) = setup();
    pantry(home.path())
        .args(["cache", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            home.path().join("cache").display().to_string(),
        ));
}

#[test]
fn test_cache_list_empty() {
    let (home, _work) = setup();
    pantry(home.path())
        .args(["cache", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(empty)"));
}

// ============================================================================
// pantry profile
// ============================================================================

#[test]
fn test_profile_detect_writes_profile() {
    let home = TempDir::new().unwrap();
    pantry(home.path())
        .args(["profile", "detect", "--name", "mine"])
        .assert()
        .success();

    let text = fs::read_to_string(home.path().join("profiles/mine")).unwrap();
    assert!(text.starts_with("[settings]"));
    assert!(text.contains("os="));
    assert!(text.contains("arch="));

    // A second detect refuses to overwrite.
    pantry(home.path())
        .args(["profile", "detect", "--name", "mine"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));
}

#[test]
fn test_profile_show_applies_overrides_to_host() {
    let (home, work) = setup();
    pantry(home.path())
        .args(["profile", "show", "-s", "build_type=Debug"])
        .current_dir(work.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("build_type=Debug"))
        .stdout(predicate::str::contains("build_type=Release"));
}

#[test]
fn test_profile_list() {
    let (home, _work) = setup();
    pantry(home.path())
        .args(["profile", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("default"))
        .stdout(predicate::str::contains("windows"));
}

#[test]
fn test_profile_parse_error_is_reported() {
    let (home, work) = setup();
    fs::write(home.path().join("profiles/broken"), "[settings]\nnot a line\n").unwrap();
    pantry(home.path())
        .args(["profile", "show", "--profile", "broken", "--no-color"])
        .current_dir(work.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("invalid profile line"));
}

// ============================================================================
// pantry inspect
// ============================================================================

#[test]
fn test_inspect_json() {
    let (home, work) = setup();
    write_recipe(work.path(), &[("recipe.toml", BACKEND)]);
    pantry(home.path())
        .args(["inspect", ".", "--format", "json"])
        .current_dir(work.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"name\": \"pico\""))
        .stdout(predicate::str::contains("\"backend\""));
}

// ============================================================================
// pantry create
// ============================================================================

#[test]
fn test_create_header_only() {
    let (home, work) = setup();
    write_recipe(
        work.path(),
        &[
            ("recipe.toml", HEADER_ONLY),
            ("include/mdspan/mdspan.hpp", "#pragma once\n"),
        ],
    );

    pantry(home.path())
        .args(["create", "."])
        .current_dir(work.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("Built"))
        .stderr(predicate::str::contains("mdspan/0.6.0"))
        .stderr(predicate::str::contains("Finished"));

    pantry(home.path())
        .args(["cache", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("mdspan/0.6.0"));

    pantry(home.path())
        .args(["cache", "remove", "mdspan/*"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Removed"));

    pantry(home.path())
        .args(["cache", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("mdspan").not());
}

#[test]
fn test_create_invalid_configuration_exit_code() {
    let (home, work) = setup();
    write_recipe(work.path(), &[("recipe.toml", POSIX_ONLY)]);
    pantry(home.path())
        .args(["create", ".", "--profile", "windows"])
        .current_dir(work.path())
        .assert()
        .code(6)
        .stderr(predicate::str::contains("invalid configuration"))
        .stderr(predicate::str::contains("only Linux supported"));
}

#[test]
fn test_create_bad_option_value() {
    let (home, work) = setup();
    write_recipe(work.path(), &[("recipe.toml", BACKEND)]);
    pantry(home.path())
        .args(["create", ".", "-o", "backend=tcp", "--no-color"])
        .current_dir(work.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("invalid value `tcp` for option `backend`"))
        .stderr(predicate::str::contains("possible values: c, pico"));
}

#[test]
fn test_create_cascade_unsupported() {
    let (home, work) = setup();
    write_recipe(work.path(), &[("recipe.toml", BACKEND)]);
    pantry(home.path())
        .args(["create", ".", "--build", "cascade"])
        .current_dir(work.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("not supported"));
}

#[test]
fn test_create_option_without_default() {
    let (home, work) = setup();
    write_recipe(
        work.path(),
        &[(
            "recipe.toml",
            "[package]\nname = \"pico\"\nversion = \"1.0\"\n\n[options]\nbackend = [\"c\", \"pico\"]\n",
        )],
    );

    pantry(home.path())
        .args(["create", ".", "--no-color"])
        .current_dir(work.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("option `backend` has no value"));

    pantry(home.path())
        .args(["create", ".", "-o", "backend=pico"])
        .current_dir(work.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("pico/1.0"));
}

// ============================================================================
// pantry graph
// ============================================================================

#[test]
fn test_graph_json_reports_invalid_nodes() {
    let (home, work) = setup();
    write_recipe(work.path(), &[("recipe.toml", POSIX_ONLY)]);
    let output = pantry(home.path())
        .args(["graph", ".", "--profile", "windows", "--format", "json"])
        .current_dir(work.path())
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let node = &report[0];
    assert_eq!(node["reference"], "libuv/1.47.0");
    assert_eq!(node["binary"], "invalid");
    assert!(node["invalid"].as_str().unwrap().contains("only Linux supported"));
}

#[test]
fn test_graph_with_index() {
    let (home, work) = setup();
    let index = work.path().join("index");
    write_recipe(
        &index,
        &[
            (
                "recipes/mdspan/config.yml",
                "versions:\n  \"0.6.0\":\n    folder: all\n",
            ),
            ("recipes/mdspan/all/recipe.toml", HEADER_ONLY),
        ],
    );
    let app = work.path().join("app");
    write_recipe(
        &app,
        &[(
            "recipe.toml",
            "[package]\nname = \"app\"\nversion = \"1.0\"\n\n[[requires]]\nref = \"mdspan/[>=0.5]\"\n",
        )],
    );

    pantry(home.path())
        .args(["graph", "app", "--index", "index"])
        .current_dir(work.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("mdspan/0.6.0 [host] header-library"))
        .stdout(predicate::str::contains("-> mdspan/0.6.0"));
}

#[test]
fn test_graph_missing_recipe() {
    let (home, work) = setup();
    write_recipe(
        work.path(),
        &[(
            "recipe.toml",
            "[package]\nname = \"app\"\nversion = \"1.0\"\n\n[[requires]]\nref = \"zlib/1.3.1\"\n",
        )],
    );
    pantry(home.path())
        .args(["graph", ".", "--no-color"])
        .current_dir(work.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("recipe `zlib` not found"));
}

// ============================================================================
// pantry completions
// ============================================================================

#[test]
fn test_completions_bash() {
    let home = TempDir::new().unwrap();
    pantry(home.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("pantry"));
}
