use std::fs;
use std::path::Path;

use clap::Parser;
use rehydrate::tooling::{Cli, CliContext, Commands};
use rehydrate::RestoreError;
use tempfile::TempDir;
use walkdir::WalkDir;

const INDEX: &str = r#"{
    "recovery_point_id": "rp-7",
    "items": [
        {
            "type": "dir", "name": "etc", "base_path": "/srv",
            "absolute_path": "/srv/etc", "relative_path": "etc",
            "mode": 2147484141, "uid": 0, "gid": 0,
            "access_time": "2024-03-01T12:00:00Z",
            "mod_time": "2024-03-01T12:00:00Z",
            "change_time": "2024-03-01T12:00:00Z"
        },
        {
            "type": "file", "name": "app.conf", "base_path": "/srv",
            "absolute_path": "/srv/etc/app.conf", "relative_path": "etc/app.conf",
            "mode": 420, "uid": 0, "gid": 0,
            "access_time": "2024-03-01T12:00:00Z",
            "mod_time": "2024-03-01T12:00:00.5+01:00",
            "change_time": "2024-03-01T12:00:00.5+01:00",
            "content": [{"etag": "k2", "start": 5}, {"etag": "k1", "start": 0}]
        },
        {
            "type": "file", "name": "empty", "base_path": "/srv",
            "absolute_path": "/srv/empty", "relative_path": "empty",
            "mode": 384, "uid": 0, "gid": 0,
            "access_time": "2024-03-01T12:00:00Z",
            "mod_time": "2024-03-01T12:00:00Z",
            "change_time": "2024-03-01T12:00:00Z",
            "content": null
        }
    ]
}"#;

/// Writes a local-backend bucket plus a config file pointing at it.
fn context(temp: &TempDir) -> CliContext {
    let bucket = temp.path().join("objects/nightly");
    fs::create_dir_all(bucket.join("rp-7")).unwrap();
    fs::write(bucket.join("rp-7/index.json"), INDEX).unwrap();
    fs::write(bucket.join("k1"), b"port=").unwrap();
    fs::write(bucket.join("k2"), b"8080\n").unwrap();

    let config_path = temp.path().join("restore.toml");
    fs::write(
        &config_path,
        format!(
            "[storage]\nbackend = \"local\"\nbucket = \"nightly\"\nroot = {:?}\n\n[cache]\nroot = {:?}\n\n[restore]\nmax_workers = 2\n",
            temp.path().join("objects").display().to_string(),
            temp.path().join("cache").display().to_string(),
        ),
    )
    .unwrap();
    CliContext::new(Some(config_path)).unwrap()
}

fn restore_cmd(dest: &Path, dry_run: bool, format: &str) -> Commands {
    Commands::Restore {
        snapshot_id: "rp-7".to_string(),
        dest: dest.to_path_buf(),
        workers: None,
        dry_run,
        format: format.to_string(),
    }
}

#[test]
fn parse_valid_command_matrix() {
    let cases: Vec<Vec<&str>> = vec![
        vec!["rehydrate", "restore", "rp-1", "/tmp/out"],
        vec!["rehydrate", "restore", "rp-1", "/tmp/out", "--dry-run"],
        vec![
            "rehydrate", "restore", "rp-1", "/tmp/out", "--workers", "4", "--format",
            "json",
        ],
        vec!["rehydrate", "index", "rp-1"],
        vec!["rehydrate", "index", "rp-1", "--format", "json"],
        vec!["rehydrate", "config"],
        vec!["rehydrate", "--log-level", "debug", "config"],
        vec!["rehydrate", "config", "--config", "/etc/rehydrate.toml"],
    ];

    for args in cases {
        let parsed = Cli::try_parse_from(args.clone());
        assert!(parsed.is_ok(), "expected valid parse for args: {args:?}");
    }
}

#[test]
fn parse_rejects_malformed_invocations() {
    assert!(Cli::try_parse_from(["rehydrate", "restore", "rp-1"]).is_err());
    assert!(Cli::try_parse_from(["rehydrate", "restore", "rp-1", "/o", "--workers", "x"]).is_err());
    assert!(Cli::try_parse_from(["rehydrate", "unknown"]).is_err());
}

#[tokio::test]
async fn restore_json_contract_has_report_fields() {
    let temp = TempDir::new().unwrap();
    let ctx = context(&temp);
    let dest = temp.path().join("out");

    let output = ctx.execute(&restore_cmd(&dest, false, "json")).await.unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
    for field in [
        "snapshot_id",
        "destination",
        "total",
        "created",
        "updated",
        "recreated",
        "skipped",
        "bytes_written",
        "symlink_failures",
        "elapsed_ms",
    ] {
        assert!(parsed.get(field).is_some(), "missing field {field}");
    }
    assert_eq!(parsed["snapshot_id"], "rp-7");
    assert_eq!(parsed["total"], 3);
    assert_eq!(parsed["bytes_written"], 10);

    assert_eq!(fs::read(dest.join("etc/app.conf")).unwrap(), b"port=8080\n");
    assert_eq!(fs::read(dest.join("empty")).unwrap(), b"");
    let restored = WalkDir::new(&dest)
        .min_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .count();
    assert_eq!(restored, 3);

    // The index is now cached locally.
    assert!(temp.path().join("cache/rp-7/index.json").exists());
}

#[tokio::test]
async fn dry_run_json_contract_lists_decisions() {
    let temp = TempDir::new().unwrap();
    let ctx = context(&temp);
    let dest = temp.path().join("out");

    let output = ctx.execute(&restore_cmd(&dest, true, "json")).await.unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
    let items = parsed.as_array().unwrap();
    assert_eq!(items.len(), 3);
    for item in items {
        assert_eq!(item["decision"], "create");
        assert!(item.get("path").is_some());
        assert!(item.get("kind").is_some());
    }
    assert!(!dest.exists());
}

#[tokio::test]
async fn index_json_round_trips_the_stored_document() {
    let temp = TempDir::new().unwrap();
    let output = context(&temp)
        .execute(&Commands::Index {
            snapshot_id: "rp-7".to_string(),
            format: "json".to_string(),
        })
        .await
        .unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
    assert_eq!(parsed["recovery_point_id"], "rp-7");
    let items = parsed["items"].as_array().unwrap();
    assert_eq!(items.len(), 3);
    assert_eq!(items[0]["type"], "dir");
    assert_eq!(items[1]["content"][0]["etag"], "k2");
}

#[tokio::test]
async fn invalid_format_is_rejected() {
    let temp = TempDir::new().unwrap();
    let err = context(&temp)
        .execute(&restore_cmd(&temp.path().join("out"), false, "yaml"))
        .await
        .unwrap_err();
    assert!(matches!(err, RestoreError::Config(_)));
    assert!(!temp.path().join("out").exists());
}

#[tokio::test]
async fn zero_workers_is_rejected() {
    let temp = TempDir::new().unwrap();
    let err = context(&temp)
        .execute(&Commands::Restore {
            snapshot_id: "rp-7".to_string(),
            dest: temp.path().join("out"),
            workers: Some(0),
            dry_run: false,
            format: "text".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, RestoreError::Config(_)));
}

#[tokio::test]
async fn text_plan_after_restore_lists_paths() {
    let temp = TempDir::new().unwrap();
    let ctx = context(&temp);
    let dest = temp.path().join("out");
    ctx.execute(&restore_cmd(&dest, false, "text")).await.unwrap();

    let text = ctx.execute(&restore_cmd(&dest, true, "text")).await.unwrap();
    assert!(text.contains("Restore Plan"));
    assert!(text.contains("etc/app.conf"));
    assert!(text.contains("to recreate"));
}
