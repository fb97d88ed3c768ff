use std::fs;

use skiff_core::audit::{AGENTS_DIR, AUDIT_LOG_FILE, AuditAction, AuditEntry, AuditLog};

fn entry(action: AuditAction, skill: &str) -> AuditEntry {
    AuditEntry {
        action,
        skill_name: skill.to_string(),
        agents: vec!["Cursor".into()],
        success: 1,
        failed: 0,
        forced: (action != AuditAction::Remove).then_some(false),
        timestamp: chrono::Utc::now(),
    }
}

#[tokio::test]
async fn appends_ndjson_under_agents_dir() {
    let tmp = tempfile::tempdir().expect("tempdir should succeed");
    let log = AuditLog::for_project(tmp.path());
    assert_eq!(log.path(), tmp.path().join(AGENTS_DIR).join(AUDIT_LOG_FILE));

    log.append(&[entry(AuditAction::Install, "alpha")])
        .await
        .expect("append should succeed");
    log.append(&[entry(AuditAction::Remove, "alpha")])
        .await
        .expect("append should succeed");

    let raw = fs::read_to_string(log.path()).expect("read should succeed");
    let lines: Vec<&str> = raw.lines().collect();
    assert_eq!(lines.len(), 2);

    let first: serde_json::Value = serde_json::from_str(lines[0]).expect("line should be JSON");
    assert_eq!(first["action"], "install");
    assert_eq!(first["skillName"], "alpha");
    assert_eq!(first["forced"], false);
    let second: serde_json::Value = serde_json::from_str(lines[1]).expect("line should be JSON");
    assert_eq!(second["action"], "remove");
    assert!(second.get("forced").is_none());
}

#[tokio::test]
async fn malformed_lines_are_skipped() {
    let tmp = tempfile::tempdir().expect("tempdir should succeed");
    let log = AuditLog::for_project(tmp.path());
    log.append(&[entry(AuditAction::Update, "beta")])
        .await
        .expect("append should succeed");
    let mut raw = fs::read_to_string(log.path()).expect("read should succeed");
    raw.push_str("{ truncated\n");
    fs::write(log.path(), raw).expect("write should succeed");

    let entries = log.read_entries().await.expect("read_entries should succeed");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, AuditAction::Update);
}

#[tokio::test]
async fn missing_log_reads_empty() {
    let tmp = tempfile::tempdir().expect("tempdir should succeed");
    let log = AuditLog::for_project(tmp.path());
    assert!(log.read_entries().await.expect("read_entries should succeed").is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn unwritable_log_does_not_surface() {
    let tmp = tempfile::tempdir().expect("tempdir should succeed");
    // `.agents` is a file, so the log directory cannot be created.
    fs::write(tmp.path().join(AGENTS_DIR), "").expect("write should succeed");
    let log = AuditLog::for_project(tmp.path());

    struct Row;
    impl skiff_core::audit::AuditRow for Row {
        fn skill(&self) -> &str {
            "alpha"
        }
        fn agent(&self) -> &str {
            "Cursor"
        }
        fn succeeded(&self) -> bool {
            true
        }
    }

    let handle = log
        .record_batch(AuditAction::Install, &[Row], false)
        .expect("runtime should be available");
    handle.await.expect("audit task should not panic");
    assert!(log.append(&[entry(AuditAction::Install, "alpha")]).await.is_err());
}
