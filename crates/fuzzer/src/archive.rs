//! Failure archival.

use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

/// Recursively copy a directory tree.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)
        .with_context(|| format!("failed to read directory {}", src.display()))?
    {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_tree(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)
                .with_context(|| format!("failed to copy {}", entry.path().display()))?;
        }
    }
    Ok(())
}

fn append_log(file: &Path, reason: &str) -> Result<()> {
    let mut out = OpenOptions::new().create(true).append(true).open(file)?;
    writeln!(out, "{reason}")?;
    Ok(())
}

/// Copy a failing iteration into `bucket/<iter_id>/` with a reason log.
///
/// The archive holds the failing artifact tree, the seed's `kernel/` tree for
/// context (when the failing tree is not itself the seed), and the
/// iteration's `data/` directory, so the case replays standalone.
pub fn archive_failure_case(
    bucket: &Path,
    iter_id: &str,
    iter_dir: &Path,
    kernel_dir: &Path,
    reason: &str,
) -> Result<()> {
    let case_dir = bucket.join(iter_id);
    fs::create_dir_all(&case_dir)?;

    let stem = kernel_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "kernel".to_string());
    copy_tree(kernel_dir, &case_dir.join(&stem))?;

    if stem != "kernel" {
        let ref_dir = kernel_dir
            .parent()
            .map(|p| p.join("kernel"))
            .filter(|p| p.is_dir());
        if let Some(ref_dir) = ref_dir {
            copy_tree(&ref_dir, &case_dir.join("kernel"))?;
        }
    }

    let data_dir = iter_dir.join("data");
    if data_dir.is_dir() {
        copy_tree(&data_dir, &case_dir.join("data"))?;
    }

    append_log(&case_dir.join("failure.log"), reason)?;
    Ok(())
}
