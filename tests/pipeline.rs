//! End-to-end pipeline tests against a YAML catalog and a file audit log

use smartcode::audit::{AuditRecorder, FileAuditLog, MemoryAuditLog};
use smartcode::catalog::{CommandCatalog, CommandDefinition, ParamKind, ParameterSpec, YamlCatalog};
use smartcode::runner::{CommandRunner, ExecutionRequest, RunError};
use smartcode::tools::{ExecutorConfig, Platform, ShellExecutor};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

const CATALOG: &str = r#"
commands:
  - name: 问候
    command: echo hello {{name}}
    emoji: "👋"
    params:
      - name: name
        type: string
        required: true
  - name: 创建目录
    command: md {{dirName}}
    params:
      - name: dirName
        type: string
        required: true
  - name: 睡眠
    command: sleep {{seconds}}
    params:
      - name: seconds
        type: number
        required: true
"#;

fn posix_executor(timeout_secs: u64) -> ShellExecutor {
    ShellExecutor::with_config(ExecutorConfig {
        platform: Platform::Posix,
        ..ExecutorConfig::with_timeout(timeout_secs)
    })
}

async fn yaml_runner(dir: &TempDir) -> (CommandRunner, Arc<YamlCatalog>, std::path::PathBuf) {
    let catalog_path = dir.path().join("commands.yaml");
    std::fs::write(&catalog_path, CATALOG).unwrap();
    let catalog = Arc::new(YamlCatalog::open(&catalog_path).await.unwrap());

    let audit_path = dir.path().join("audit.log");
    let recorder = AuditRecorder::new(Arc::new(FileAuditLog::new(&audit_path)));
    let runner = CommandRunner::new(catalog.clone(), posix_executor(5), recorder);
    (runner, catalog, audit_path)
}

fn audit_lines(path: &std::path::Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

#[cfg(unix)]
#[tokio::test]
async fn test_run_writes_one_audit_line() {
    let dir = TempDir::new().unwrap();
    let (runner, _, audit_path) = yaml_runner(&dir).await;

    let request = ExecutionRequest::new("问候", "alice").with_value("name", "world");
    let result = runner.run(&request).await.unwrap();

    assert!(result.exit_succeeded);
    assert_eq!(result.stdout, "hello world");

    let lines = audit_lines(&audit_path);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].ends_with(" - User: alice, Command: echo hello world, Result: hello world"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_known_command_uses_posix_template() {
    let dir = TempDir::new().unwrap();
    let (runner, _, audit_path) = yaml_runner(&dir).await;
    let target = dir.path().join("新目录");

    let mut values = HashMap::new();
    values.insert(
        "dirName".to_string(),
        target.to_string_lossy().to_string(),
    );
    let result = runner.execute("创建目录", &values, "bob").await.unwrap();

    assert!(result.exit_succeeded, "{:?}", result);
    assert!(target.is_dir());
    let lines = audit_lines(&audit_path);
    assert!(lines[0].contains(&format!("Command: mkdir -p {}", target.display())));
}

#[tokio::test]
async fn test_unknown_command_spawns_nothing_and_audits_nothing() {
    let dir = TempDir::new().unwrap();
    let (runner, _, audit_path) = yaml_runner(&dir).await;

    let err = runner
        .execute("不存在", &HashMap::new(), "alice")
        .await
        .unwrap_err();

    assert_eq!(err, RunError::NotFound("不存在".to_string()));
    assert!(!audit_path.exists());
}

#[cfg(unix)]
#[tokio::test]
async fn test_timeout_is_audited_as_failure() {
    let dir = TempDir::new().unwrap();
    let catalog_path = dir.path().join("commands.yaml");
    std::fs::write(&catalog_path, CATALOG).unwrap();
    let catalog = Arc::new(YamlCatalog::open(&catalog_path).await.unwrap());
    let log = Arc::new(MemoryAuditLog::new());
    let runner = CommandRunner::new(catalog, posix_executor(1), AuditRecorder::new(log.clone()));

    let request = ExecutionRequest::new("睡眠", "carol").with_value("seconds", "10");
    let result = runner.run(&request).await.unwrap();

    assert!(result.timed_out());
    let entries = log.entries().await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].command, "sleep 10");
    assert!(entries[0].result.starts_with("错误: "));
}

#[cfg(unix)]
#[tokio::test]
async fn test_concurrent_requests_are_independent() {
    let catalog = Arc::new(
        smartcode::MemoryCatalog::from_definitions(vec![CommandDefinition::new(
            "echo",
            "echo {{n}}",
        )
        .with_param(ParameterSpec::new("n", ParamKind::Number, true))])
        .unwrap(),
    );
    let log = Arc::new(MemoryAuditLog::new());
    let runner = Arc::new(CommandRunner::new(
        catalog,
        posix_executor(10),
        AuditRecorder::new(log.clone()),
    ));

    let futures = (0..16).map(|i| {
        let runner = Arc::clone(&runner);
        async move {
            let request = ExecutionRequest::new("echo", format!("user{}", i))
                .with_value("n", i.to_string());
            (i, runner.run(&request).await.unwrap())
        }
    });
    let results = futures::future::join_all(futures).await;

    for (i, result) in &results {
        assert_eq!(result.stdout, i.to_string());
    }

    let entries = log.entries().await;
    assert_eq!(entries.len(), 16);
    for entry in entries {
        let n = entry.principal.trim_start_matches("user");
        assert_eq!(entry.command, format!("echo {}", n));
        assert_eq!(entry.result, n);
    }
}

#[cfg(unix)]
#[tokio::test]
async fn test_slow_command_does_not_hold_up_a_fast_one() {
    let catalog = Arc::new(
        smartcode::MemoryCatalog::from_definitions(vec![
            CommandDefinition::new("慢", "sleep 2; echo slow"),
            CommandDefinition::new("快", "echo fast"),
        ])
        .unwrap(),
    );
    let log = Arc::new(MemoryAuditLog::new());
    let runner = CommandRunner::new(catalog, posix_executor(10), AuditRecorder::new(log.clone()));

    let timed = |name: &'static str, principal: &'static str| {
        let runner = &runner;
        async move {
            let started = Instant::now();
            let result = runner.run(&ExecutionRequest::new(name, principal)).await.unwrap();
            (result, started.elapsed())
        }
    };
    let ((slow, slow_elapsed), (fast, fast_elapsed)) =
        tokio::join!(timed("慢", "alice"), timed("快", "bob"));

    assert_eq!(slow.stdout, "slow");
    assert_eq!(fast.stdout, "fast");
    assert!(fast_elapsed < Duration::from_secs(1), "{:?}", fast_elapsed);
    assert!(slow_elapsed >= Duration::from_millis(1900), "{:?}", slow_elapsed);

    let entries = log.entries().await;
    assert_eq!(entries.len(), 2);
    // the fast run finishes, and is recorded, first
    assert_eq!(
        (entries[0].principal.as_str(), entries[0].command.as_str(), entries[0].result.as_str()),
        ("bob", "echo fast", "fast")
    );
    assert_eq!(
        (entries[1].principal.as_str(), entries[1].command.as_str(), entries[1].result.as_str()),
        ("alice", "sleep 2; echo slow", "slow")
    );
}

#[cfg(unix)]
#[tokio::test]
async fn test_catalog_changes_are_visible_to_runner() {
    let dir = TempDir::new().unwrap();
    let (runner, catalog, _) = yaml_runner(&dir).await;

    catalog
        .add(CommandDefinition::new("当前目录", "pwd"))
        .await
        .unwrap();
    assert!(runner
        .execute("当前目录", &HashMap::new(), "alice")
        .await
        .unwrap()
        .exit_succeeded);

    catalog.remove("当前目录").await.unwrap();
    runner.command_removed("当前目录");
    assert!(matches!(
        runner.execute("当前目录", &HashMap::new(), "alice").await,
        Err(RunError::NotFound(_))
    ));

    // persisted wholesale
    let reopened = YamlCatalog::open(catalog.path()).await.unwrap();
    let names: Vec<_> = reopened.list().await.into_iter().map(|c| c.name).collect();
    assert_eq!(names, vec!["问候", "创建目录", "睡眠"]);
}
