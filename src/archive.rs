//! tar-based archival helper.
//!
//! Wraps the tar format with codec selection from the archive file name (see
//! [`crate::compression::Codec`]): compress one file, a filtered directory
//! listing, or an explicit file list; extract; list members; and verify that
//! every expected path made it into the archive.

use crate::compression::Codec;
use crate::verify::Verification;
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs::File;
use std::path::Path;
use tracing::info;

fn open_builder(archive_path: &str) -> Result<tar::Builder<Box<dyn std::io::Write>>> {
    let codec = Codec::from_name(archive_path)?;
    let file = File::create(archive_path).with_context(|| format!("create {archive_path}"))?;
    Ok(tar::Builder::new(codec.wrap_writer(file)?))
}

fn open_archive(archive_path: &str) -> Result<tar::Archive<Box<dyn std::io::Read>>> {
    let codec = Codec::from_name(archive_path)?;
    let file = File::open(archive_path).with_context(|| format!("open {archive_path}"))?;
    Ok(tar::Archive::new(codec.wrap_reader(file)?))
}

/// Relative member name for a full path under `root`.
fn member_name(full_path: &str, root: &str) -> String {
    full_path
        .strip_prefix(root)
        .map(|rest| rest.trim_start_matches('/').to_string())
        .unwrap_or_else(|| full_path.to_string())
}

/// Archive a single file from `dir` into `dir/archive_name`.
///
/// # Errors
/// Returns an error if the file is absent or the archive cannot be written.
pub fn compress_file(dir: &str, name: &str, archive_name: &str) -> Result<()> {
    let full_path = format!("{}/{}", dir.trim_end_matches('/'), name);
    anyhow::ensure!(
        Path::new(&full_path).is_file(),
        "{full_path} does not exist, unable to compress"
    );
    let archive_path = format!("{}/{}", dir.trim_end_matches('/'), archive_name);
    let mut builder = open_builder(&archive_path)?;
    builder
        .append_path_with_name(&full_path, name)
        .with_context(|| format!("add {full_path} to {archive_path}"))?;
    builder.into_inner().context("finish archive")?;
    Ok(())
}

/// Archive the files directly under `dir` into `dir/archive_name`, keeping
/// only the names `filter` accepts (everything, if `None`). Subdirectories
/// and the archive itself are skipped.
///
/// # Errors
/// Returns an error if the directory cannot be listed or the archive written.
pub fn compress_dir(
    dir: &str,
    archive_name: &str,
    filter: Option<&dyn Fn(&str) -> bool>,
) -> Result<()> {
    anyhow::ensure!(
        Path::new(dir).is_dir(),
        "{dir} does not exist, unable to compress"
    );
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("list {dir}"))? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name == archive_name {
            continue;
        }
        if filter.is_none_or(|f| f(&name)) {
            names.push(name);
        }
    }
    names.sort();
    let archive_path = format!("{}/{}", dir.trim_end_matches('/'), archive_name);
    let mut builder = open_builder(&archive_path)?;
    for name in &names {
        let full_path = format!("{}/{}", dir.trim_end_matches('/'), name);
        builder
            .append_path_with_name(&full_path, name)
            .with_context(|| format!("add {full_path} to {archive_path}"))?;
    }
    builder.into_inner().context("finish archive")?;
    Ok(())
}

/// Archive an explicit list of full paths into `root/archive_name`,
/// preserving each path relative to `root` as its member name. With an empty
/// list no archive is written.
///
/// # Errors
/// Returns an error if any input path cannot be added or the archive written.
pub fn compress_files(full_paths: &[String], root: &str, archive_name: &str) -> Result<()> {
    if full_paths.is_empty() {
        info!("no files to add to {archive_name}");
        return Ok(());
    }
    let archive_path = format!("{}/{}", root.trim_end_matches('/'), archive_name);
    let mut builder = open_builder(&archive_path)?;
    for full_path in full_paths {
        builder
            .append_path_with_name(full_path, member_name(full_path, root))
            .with_context(|| format!("add {full_path} to {archive_path}"))?;
    }
    builder.into_inner().context("finish archive")?;
    Ok(())
}

/// Extract `root/archive_name` into `root`.
///
/// # Errors
/// Returns an error if the archive cannot be opened or unpacked.
pub fn extract(root: &str, archive_name: &str) -> Result<()> {
    let archive_path = format!("{}/{}", root.trim_end_matches('/'), archive_name);
    let mut archive = open_archive(&archive_path)?;
    archive
        .unpack(root)
        .with_context(|| format!("extract {archive_path}"))
}

/// Member names inside `root/archive_name`.
///
/// # Errors
/// Returns an error if the archive cannot be opened or walked.
pub fn list_members(root: &str, archive_name: &str) -> Result<Vec<String>> {
    let archive_path = format!("{}/{}", root.trim_end_matches('/'), archive_name);
    let mut archive = open_archive(&archive_path)?;
    let mut members = Vec::new();
    for entry in archive.entries().context("walk archive entries")? {
        let entry = entry.context("read archive entry")?;
        members.push(entry.path()?.to_string_lossy().into_owned());
    }
    Ok(members)
}

/// Check that every expected full path appears in the archive's member list
/// (members are resolved against `root` before comparing). Same result shape
/// as upload/download verification.
///
/// # Errors
/// Returns an error if the archive cannot be read.
pub fn verify_members(
    expected_full_paths: &[String],
    root: &str,
    archive_name: &str,
) -> Result<Verification> {
    let members: HashSet<String> = list_members(root, archive_name)?
        .into_iter()
        .map(|m| format!("{}/{}", root.trim_end_matches('/'), m))
        .collect();
    let missing = expected_full_paths
        .iter()
        .filter(|p| !members.contains(*p))
        .cloned()
        .collect();
    Ok(Verification::from_missing(missing))
}
