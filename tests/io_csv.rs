#![cfg(feature = "io-csv")]

use stowage::*;
use tempfile::tempdir;

fn sample_table() -> Table {
    let mut t = Table::new(vec!["id".into(), "name".into(), "score".into()]);
    t.push_row(vec![Cell::Int(1), Cell::Str("alice".into()), Cell::Float(3.5)]);
    t.push_row(vec![Cell::Int(2), Cell::Str("bob".into()), Cell::Null]);
    t.push_row(vec![Cell::Int(3), Cell::Str("carol".into()), Cell::Float(1.25)]);
    t
}

#[test]
fn csv_roundtrip_with_headers() -> anyhow::Result<()> {
    let tmp = tempdir()?;
    let dir = tmp.path().to_str().unwrap();
    let mut store = FileStore::new(LocalStorage);

    let at = FileReference::new(dir, "scores.csv");
    assert!(store.save(sample_table().into(), at.clone(), FormatTag::Csv, FormatOptions::default()));

    let contents = std::fs::read_to_string(tmp.path().join("scores.csv"))?;
    assert!(contents.starts_with("id,name,score"));

    let back = store.load(at, FormatTag::Csv, FormatOptions::default());
    assert_eq!(back, Some(Payload::Table(sample_table())));
    Ok(())
}

#[test]
fn csv_headerless_synthesizes_positional_columns() -> anyhow::Result<()> {
    let tmp = tempdir()?;
    let dir = tmp.path().to_str().unwrap();
    let mut store = FileStore::new(LocalStorage);

    let mut options = FormatOptions::default();
    options.has_headers = false;

    let at = FileReference::new(dir, "raw.csv");
    assert!(store.save(sample_table().into(), at.clone(), FormatTag::Csv, options.clone()));

    let back = store.load(at, FormatTag::Csv, options).expect("load csv");
    let table = back.as_table().expect("table payload");
    assert_eq!(table.columns, vec!["0", "1", "2"]);
    assert_eq!(table.rows, sample_table().rows);
    Ok(())
}

#[test]
fn csv_custom_delimiter() -> anyhow::Result<()> {
    let tmp = tempdir()?;
    let dir = tmp.path().to_str().unwrap();
    let mut store = FileStore::new(LocalStorage);

    let mut options = FormatOptions::default();
    options.delimiter = b';';

    let at = FileReference::new(dir, "semi.csv");
    assert!(store.save(sample_table().into(), at.clone(), FormatTag::Csv, options.clone()));

    let contents = std::fs::read_to_string(tmp.path().join("semi.csv"))?;
    assert!(contents.starts_with("id;name;score"));
    assert_eq!(
        store.load(at, FormatTag::Csv, options),
        Some(Payload::Table(sample_table()))
    );
    Ok(())
}

#[test]
fn csv_cell_inference() {
    assert_eq!(Cell::infer(""), Cell::Null);
    assert_eq!(Cell::infer("42"), Cell::Int(42));
    assert_eq!(Cell::infer("-1.5"), Cell::Float(-1.5));
    assert_eq!(Cell::infer("true"), Cell::Bool(true));
    assert_eq!(Cell::infer("hello"), Cell::Str("hello".into()));
}
