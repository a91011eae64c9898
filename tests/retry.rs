use std::sync::Arc;
use stowage::*;
use tempfile::tempdir;

fn opts() -> FormatOptions {
    FormatOptions::default()
}

#[test]
fn notify_on_empty_log_sends_nothing() -> anyhow::Result<()> {
    let sink = MemoryNotifier::new();
    let store = FileStore::new(LocalStorage).with_notifier(Arc::new(sink.clone()));

    store.notify_failures(Direction::Save)?;
    store.notify_failures(Direction::Load)?;
    assert!(sink.messages().is_empty());
    Ok(())
}

#[test]
fn notify_on_empty_log_needs_no_sink() -> anyhow::Result<()> {
    // No notifier configured at all: still a clean no-op.
    let store = FileStore::new(LocalStorage);
    store.notify_failures(Direction::Save)?;
    Ok(())
}

#[test]
fn notify_joins_affected_paths() -> anyhow::Result<()> {
    let tmp = tempdir()?;
    let dir = tmp.path().to_str().unwrap();
    let sink = MemoryNotifier::new();
    let mut store = FileStore::new(LocalStorage).with_notifier(Arc::new(sink.clone()));

    store.save("x".into(), FileReference::new(dir, "p.xlsx"), FormatTag::Excel, opts());
    store.save("y".into(), FileReference::new(dir, "q.xlsx"), FormatTag::Excel, opts());
    store.notify_failures(Direction::Save)?;

    let messages = sink.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("not saved successfully"));
    assert!(messages[0].contains(&format!("{dir}/p.xlsx")));
    assert!(messages[0].contains(&format!("{dir}/q.xlsx")));
    Ok(())
}

#[test]
fn retry_replays_each_entry_independently() -> anyhow::Result<()> {
    let tmp = tempdir()?;
    let dir = tmp.path().to_str().unwrap();
    let mut store = FileStore::new(LocalStorage);

    // Two failures at different locations with different options.
    let mut pretty = opts();
    pretty.pretty = true;
    store.save(
        serde_json::json!({"k": 1}).into(),
        FileReference::new(dir, "one.xlsx"),
        FormatTag::Excel,
        opts(),
    );
    store.save(
        serde_json::json!({"k": 2}).into(),
        FileReference::new(format!("{dir}/sub"), "two.xlsx"),
        FormatTag::Excel,
        pretty.clone(),
    );
    assert_eq!(store.failed_saves().len(), 2);

    // Fix the cause: register a handler for the tag, then retry.
    store.register_format(FormatTag::Excel, Arc::new(stowage::format::JsonFormat));
    let succeeded = store.retry_failed(Direction::Save, ExecMode::Sequential);
    assert_eq!(succeeded, 2);

    // Retry never clears the log by itself.
    assert_eq!(store.failed_saves().len(), 2);
    store.clear_failed_saves();
    assert!(store.failed_saves().is_empty());

    // Each entry replayed to its own location with its own options.
    assert!(tmp.path().join("one.xlsx").is_file());
    let two = std::fs::read_to_string(tmp.path().join("sub/two.xlsx"))?;
    assert!(two.contains('\n'), "pretty option should have been preserved");
    Ok(())
}

#[test]
fn retry_on_still_failing_log_reappends() -> anyhow::Result<()> {
    let tmp = tempdir()?;
    let dir = tmp.path().to_str().unwrap();
    let mut store = FileStore::new(LocalStorage);

    store.save("x".into(), FileReference::new(dir, "a.xlsx"), FormatTag::Excel, opts());
    assert_eq!(store.failed_saves().len(), 1);

    // Nothing was fixed; the replay fails again and re-appends.
    let succeeded = store.retry_failed(Direction::Save, ExecMode::Sequential);
    assert_eq!(succeeded, 0);
    assert_eq!(store.failed_saves().len(), 2);
    Ok(())
}

#[test]
fn persisted_failure_log_replays_with_identical_arguments() -> anyhow::Result<()> {
    let tmp = tempdir()?;
    let dir = tmp.path().to_str().unwrap();
    let mut store = FileStore::new(LocalStorage);

    let mut custom = opts();
    custom.has_headers = false;
    custom.delimiter = b';';
    store.save(
        serde_json::json!({"a": [1, 2]}).into(),
        FileReference::new(dir, "orig.xlsx"),
        FormatTag::Excel,
        custom,
    );
    let original = store.failed_saves().to_vec();
    assert_eq!(original.len(), 1);

    let at = store.persist_failures(Direction::Save, dir, FormatTag::Json)?;
    assert!(at.name.starts_with("save_fail_list_"));
    assert!(at.name.ends_with(".json"));

    // A fresh store restores the exact same replay context.
    let mut recovered = FileStore::new(LocalStorage);
    let count = recovered.restore_failures(Direction::Save, &at, FormatTag::Json)?;
    assert_eq!(count, 1);
    assert_eq!(recovered.failed_saves(), original.as_slice());
    Ok(())
}

#[test]
fn load_failure_log_persists_without_payload() -> anyhow::Result<()> {
    let tmp = tempdir()?;
    let dir = tmp.path().to_str().unwrap();
    let mut store = FileStore::new(LocalStorage);

    store.load(FileReference::new(dir, "never.json"), FormatTag::Json, opts());
    let at = store.persist_failures(Direction::Load, dir, FormatTag::Json)?;
    assert!(at.name.starts_with("load_fail_list_"));

    let mut recovered = FileStore::new(LocalStorage);
    recovered.restore_failures(Direction::Load, &at, FormatTag::Json)?;
    assert_eq!(recovered.failed_loads().len(), 1);
    assert_eq!(recovered.failed_loads()[0].at.name, "never.json");
    Ok(())
}
