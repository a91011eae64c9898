use stowage::*;
use tempfile::tempdir;

fn opts() -> FormatOptions {
    FormatOptions::default()
}

fn names(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}

#[test]
fn store_dispatch_works_over_object_backend() -> anyhow::Result<()> {
    let client = MemoryObjectClient::new();
    let mut store = FileStore::new(ObjectStore::new(client));

    let at = FileReference::new("bucket/data", "doc.json");
    assert!(store.save(
        serde_json::json!({"a": 1}).into(),
        at.clone(),
        FormatTag::Json,
        opts()
    ));
    assert_eq!(
        store.load(at, FormatTag::Json, opts()),
        Some(Payload::Json(serde_json::json!({"a": 1})))
    );
    Ok(())
}

#[test]
fn failure_log_persists_through_object_backend() -> anyhow::Result<()> {
    let client = MemoryObjectClient::new();
    let mut store = FileStore::new(ObjectStore::new(client.clone()));

    store.save("x".into(), FileReference::new("b/d", "a.xlsx"), FormatTag::Excel, opts());
    let at = store.persist_failures(Direction::Save, "b/tmp", FormatTag::Json)?;

    let mut recovered = FileStore::new(ObjectStore::new(client));
    assert_eq!(recovered.restore_failures(Direction::Save, &at, FormatTag::Json)?, 1);
    assert_eq!(recovered.failed_saves()[0].at.name, "a.xlsx");
    Ok(())
}

#[test]
fn empty_objects_are_tagged_not_just_zero_byte() -> anyhow::Result<()> {
    let client = MemoryObjectClient::new();
    let store = ObjectStore::new(client.clone());

    store.save_empty("bucket/in", "placeholder.txt")?;
    client.put("bucket/in/real.txt", b"content")?;
    // A zero-byte object without the tag still counts as non-empty.
    client.put("bucket/in/zero.txt", b"")?;

    let all = names(&["placeholder.txt", "real.txt", "zero.txt"]);
    let kept = store.filter_non_empty("bucket/in", &all)?;
    assert_eq!(kept, names(&["real.txt", "zero.txt"]));
    Ok(())
}

#[test]
fn modified_listings_tolerate_absent_directories() -> anyhow::Result<()> {
    let store = ObjectStore::new(MemoryObjectClient::new());

    assert_eq!(store.list_modified_after("no/such/prefix", 0)?, Vec::<String>::new());
    assert_eq!(
        store.list_modified_between("no/such/prefix", 0, i64::MAX)?,
        Vec::<String>::new()
    );
    assert_eq!(store.modified_in_dir("no/such/prefix", None)?, None);
    Ok(())
}

#[test]
fn modified_listings_filter_by_timestamp() -> anyhow::Result<()> {
    let client = MemoryObjectClient::new();
    let store = ObjectStore::new(client.clone());

    client.put("logs/old.txt", b"1")?;
    client.put("logs/mid.txt", b"2")?;
    client.put("logs/new.txt", b"3")?;
    client.set_modified("logs/old.txt", 100);
    client.set_modified("logs/mid.txt", 200);
    client.set_modified("logs/new.txt", 300);

    assert_eq!(store.list_modified_after("logs", 150)?, names(&["mid.txt", "new.txt"]));
    // Half-open interval: the end bound is excluded.
    assert_eq!(store.list_modified_between("logs", 100, 300)?, names(&["mid.txt", "old.txt"]));
    assert_eq!(store.modified_in_dir("logs", None)?, Some(300));
    assert_eq!(store.modified_in_dir("logs", Some("mid.txt"))?, Some(200));
    assert_eq!(store.modified_in_dir("logs", Some("gone.txt"))?, None);
    Ok(())
}

#[test]
fn upload_download_with_verification() -> anyhow::Result<()> {
    let tmp = tempdir()?;
    let local = tmp.path().to_str().unwrap();
    std::fs::write(tmp.path().join("a.txt"), "aaa")?;
    std::fs::write(tmp.path().join("b.txt"), "bbb")?;

    let client = MemoryObjectClient::new();
    let store = ObjectStore::new(client.clone());

    store.upload_many(local, "bucket/up", &names(&["a.txt", "b.txt"]))?;
    let verified = store.verify_uploaded("bucket/up", &names(&["a.txt", "b.txt"]))?;
    assert_eq!(verified, Verification::ok());

    let incomplete = store.verify_uploaded("bucket/up", &names(&["a.txt", "c.txt"]))?;
    assert!(!incomplete.ok);
    assert_eq!(incomplete.missing, vec!["bucket/up/c.txt".to_string()]);

    // Round-trip back to a fresh local directory; empty-tagged objects are
    // skipped on the way down.
    store.save_empty("bucket/up", "ghost.txt")?;
    let dest = tmp.path().join("down");
    let dest_str = dest.to_str().unwrap();
    store.download_many("bucket/up", dest_str, &names(&["a.txt", "b.txt", "ghost.txt"]))?;

    assert_eq!(std::fs::read_to_string(dest.join("a.txt"))?, "aaa");
    assert!(!dest.join("ghost.txt").exists());

    let down = store.verify_downloaded(dest_str, &names(&["a.txt", "b.txt"]));
    assert_eq!(down, Verification::ok());
    let down_missing = store.verify_downloaded(dest_str, &names(&["a.txt", "ghost.txt"]));
    assert!(!down_missing.ok);
    assert_eq!(down_missing.missing, vec![format!("{dest_str}/ghost.txt")]);
    Ok(())
}

#[test]
fn bulk_remove_and_pattern_remove() -> anyhow::Result<()> {
    let client = MemoryObjectClient::new();
    let store = ObjectStore::new(client.clone());

    client.put("tmp/save_fail_list_100.json", b"{}")?;
    client.put("tmp/load_fail_list_200.json", b"{}")?;
    client.put("tmp/keep.txt", b"k")?;

    store.remove_matching("tmp", "save_fail_list")?;
    // Listings come back key-sorted.
    assert_eq!(
        Storage::list(&store, "tmp")?,
        names(&["keep.txt", "load_fail_list_200.json"])
    );

    store.remove_all("tmp")?;
    assert!(Storage::list(&store, "tmp")?.is_empty());
    Ok(())
}

#[test]
fn clone_empty_files_mirrors_names() -> anyhow::Result<()> {
    let client = MemoryObjectClient::new();
    let store = ObjectStore::new(client.clone());

    store.clone_empty_files("bucket/mirror", &names(&["x.txt", "y.txt"]))?;
    assert!(client.exists("bucket/mirror/x.txt")?);
    let kept = store.filter_non_empty("bucket/mirror", &names(&["x.txt", "y.txt"]))?;
    assert!(kept.is_empty());
    Ok(())
}
