// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::io::Write;
use tempfile::TempDir;

fn write_config(dir: &TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("config.json");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(body.as_bytes()).unwrap();
    path
}

const MINIMAL: &str = r#"{
    "github": {
        "token": "ghp_abc123",
        "repos": [{"name": "acme/widgets", "base_repo_path": "/srv/agents"}]
    }
}"#;

#[test]
fn minimal_config_gets_defaults() {
    let dir = TempDir::new().unwrap();
    let config = Config::load(&write_config(&dir, MINIMAL)).unwrap();

    assert_eq!(config.github.max_concurrent, 3);
    assert_eq!(config.processors.enabled, vec![ProcessorName::Claude]);
    assert!(config.slack.is_none());
    assert!(config.telegram.is_none());

    let claude = config.processor_settings(ProcessorName::Claude);
    assert_eq!(claude.path, "claude");
    assert_eq!(claude.timeout, Duration::from_secs(3600));
    assert_eq!(claude.check_interval, Duration::from_secs(60));
    assert!(claude.prompt_path.is_none());
}

#[test]
fn missing_file_is_a_distinct_error() {
    let dir = TempDir::new().unwrap();
    let err = Config::load(&dir.path().join("nope.json")).unwrap_err();
    assert!(matches!(err, ConfigError::Missing(_)));
}

#[test]
fn parse_error_names_the_file() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "{not json");
    let err = Config::load(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { .. }));
    assert!(err.to_string().contains("config.json"));
}

#[test]
fn empty_token_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"{"github": {"token": " ", "repos": [{"name": "a/b", "base_repo_path": "/x"}]}}"#,
    );
    let err = Config::load(&path).unwrap_err();
    assert!(err.to_string().contains("github.token"));
}

#[test]
fn zero_max_concurrent_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"{"github": {"token": "t", "max_concurrent": 0,
            "repos": [{"name": "a/b", "base_repo_path": "/x"}]}}"#,
    );
    let err = Config::load(&path).unwrap_err();
    assert!(err.to_string().contains("max_concurrent"));
}

#[test]
fn repo_without_owner_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"{"github": {"token": "t", "repos": [{"name": "widgets", "base_repo_path": "/x"}]}}"#,
    );
    let err = Config::load(&path).unwrap_err();
    assert!(err.to_string().contains("owner/name"));
}

#[test]
fn processor_overrides_apply() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"{
            "github": {"token": "t", "repos": [{"name": "a/b", "base_repo_path": "/x"}]},
            "processors": {
                "enabled": ["claude", "codex"],
                "codex": {"path": "/opt/bin/codex", "timeout_seconds": 120.5,
                          "check_interval_seconds": 5, "prompt_path": "my-prompt"}
            }
        }"#,
    );
    let config = Config::load(&path).unwrap();

    assert_eq!(
        config.processors.enabled,
        vec![ProcessorName::Claude, ProcessorName::Codex]
    );
    let codex = config.processor_settings(ProcessorName::Codex);
    assert_eq!(codex.path, "/opt/bin/codex");
    assert_eq!(codex.timeout, Duration::from_secs_f64(120.5));
    assert_eq!(codex.check_interval, Duration::from_secs(5));
    assert_eq!(codex.prompt_path.as_deref(), Some("my-prompt"));

    // Claude untouched
    let claude = config.processor_settings(ProcessorName::Claude);
    assert_eq!(claude.path, "claude");
}

#[test]
fn unknown_fields_are_tolerated() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"{
            "github": {"token": "t", "repos": [{"name": "a/b", "base_repo_path": "/x"}]},
            "future_section": {"anything": true}
        }"#,
    );
    assert!(Config::load(&path).is_ok());
}

#[test]
fn expand_home_handles_tilde_prefix() {
    let home = dirs::home_dir().unwrap();
    assert_eq!(expand_home("~/repos"), home.join("repos"));
    assert_eq!(expand_home("~"), home);
    assert_eq!(expand_home("/abs/path"), PathBuf::from("/abs/path"));
    assert_eq!(expand_home("relative"), PathBuf::from("relative"));
}

#[test]
fn repo_short_name() {
    let repo = RepoConfig {
        name: "acme/widgets".to_string(),
        base_repo_path: "~/agents".to_string(),
    };
    assert_eq!(repo.short_name(), "widgets");
    assert_eq!(repo.base_path(), dirs::home_dir().unwrap().join("agents"));
}
