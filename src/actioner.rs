//! Safe move or copy of a single file, with companion files, overwrite policy,
//! chunked progress and cooperative cancellation.
//!
//! Every outcome is an [`ActionResult`]. I/O errors are reported and mapped to
//! [`ActionResult::Failed`] after any partially written destination has been removed.

use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::types::ActionResult;
use crate::{print_error, print_warning};

/// Block size for the chunked copy.
pub const CHUNK_SIZE: usize = 32 * 1024;

/// Files smaller than this are always moved or copied with a single native call.
pub const DEFAULT_CHUNKED_THRESHOLD: u64 = 1024 * 1024;

/// Progress reported during the chunked copy never exceeds this before verification is done.
const COPY_PROGRESS_CAP: u64 = 90;

/// Default subtitle and sidecar extensions renamed together with the media file.
pub const DEFAULT_COMPANION_EXTENSIONS: &[&str] = &["srt", "sub", "idx", "ass", "ssa", "smi", "vtt"];

/// Progress callback: receives a percentage, returns `Break` to cancel.
pub type ProgressFn<'a> = dyn FnMut(u8) -> ControlFlow<()> + 'a;

/// Options for a single file action.
#[derive(Debug, Clone)]
pub struct ActionOptions {
    /// Replace an existing destination file.
    pub overwrite: bool,
    /// Copy instead of move.
    pub keep_source: bool,
    /// Lowercase extensions of companion files to carry along.
    pub companion_extensions: Vec<String>,
    /// Minimum size for the chunked copy when a progress callback is given.
    pub chunked_threshold: u64,
    /// Use a native call when source and destination are on the same volume.
    pub same_volume_fast_path: bool,
}

/// The action was cancelled through the progress callback.
#[derive(Debug, Clone, Copy)]
struct Cancelled;

impl Default for ActionOptions {
    fn default() -> Self {
        Self {
            overwrite: false,
            keep_source: false,
            companion_extensions: DEFAULT_COMPANION_EXTENSIONS.iter().map(ToString::to_string).collect(),
            chunked_threshold: DEFAULT_CHUNKED_THRESHOLD,
            same_volume_fast_path: true,
        }
    }
}

impl ActionOptions {
    const fn verb(&self) -> &'static str {
        if self.keep_source { "copy" } else { "move" }
    }
}

impl std::fmt::Display for Cancelled {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Operation cancelled")
    }
}

impl std::error::Error for Cancelled {}

/// Move or copy `source` to `dest`.
///
/// Checks run in order: missing source, invalid destination name, same path (no-op success),
/// existing destination without overwrite. Companion files are handled on a best-effort basis
/// and never change the returned result.
pub fn apply(
    source: &Path,
    dest: &Path,
    options: &ActionOptions,
    progress: Option<&mut ProgressFn<'_>>,
) -> ActionResult {
    if !source.exists() {
        return ActionResult::SourceMissing;
    }

    let name_is_valid = dest
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(crate::naming::is_valid_filename);
    if !name_is_valid {
        return ActionResult::InvalidDestinationName;
    }

    if source == dest {
        return ActionResult::Success;
    }

    let case_only = !options.keep_source && is_case_only_change(source, dest);
    if dest.exists() && !options.overwrite && !case_only {
        return ActionResult::DestinationExistsNoOverwrite;
    }

    if let Err(error) = ensure_parent_dir(dest) {
        print_error!("{error:#}");
        return ActionResult::Failed;
    }

    let result = if case_only {
        rename_with_temp_file(source, dest).context("Failed to rename with temp file")
    } else {
        transfer(source, dest, options, progress)
    };

    if let Err(error) = result {
        if error.downcast_ref::<Cancelled>().is_none() {
            print_error!("Failed to {} {}: {error:#}", options.verb(), source.display());
        }
        return ActionResult::Failed;
    }

    for (companion_source, companion_dest) in companion_files(source, dest, &options.companion_extensions) {
        if let Err(error) = transfer_companion(&companion_source, &companion_dest, options) {
            print_warning!(
                "Companion file {} not handled: {error:#}",
                crate::path_to_filename_string(&companion_source)
            );
        }
    }

    ActionResult::Success
}

/// Find companion files of `source` and their counterparts next to `dest`.
///
/// A companion shares the source file stem followed by a dot, and its final extension is in the set,
/// so `Show.S01E01.en.srt` belongs to `Show.S01E01.mkv` and becomes `<dest stem>.en.srt`.
#[must_use]
pub fn companion_files(source: &Path, dest: &Path, extensions: &[String]) -> Vec<(PathBuf, PathBuf)> {
    if extensions.is_empty() {
        return Vec::new();
    }
    let Some(source_dir) = source.parent() else {
        return Vec::new();
    };
    let dest_dir = dest.parent().unwrap_or_else(|| Path::new(""));
    let source_stem = crate::path_to_file_stem_string(source);
    let dest_stem = crate::path_to_file_stem_string(dest);
    let prefix = format!("{source_stem}.");

    let Ok(entries) = fs::read_dir(source_dir) else {
        return Vec::new();
    };

    let mut companions: Vec<(PathBuf, PathBuf)> = entries
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
        .map(|entry| entry.path())
        .filter(|path| path != source)
        .filter_map(|path| {
            let name = crate::path_to_filename_string(&path);
            let suffix = name.strip_prefix(&prefix)?;
            let extension = crate::path_to_file_extension_string(&path);
            if !extensions.iter().any(|e| e.eq_ignore_ascii_case(&extension)) {
                return None;
            }
            let target = dest_dir.join(format!("{dest_stem}.{suffix}"));
            Some((path, target))
        })
        .collect();

    companions.sort();
    companions
}

/// Move or copy one companion file using the same policy as the primary file, without progress.
fn transfer_companion(source: &Path, dest: &Path, options: &ActionOptions) -> Result<()> {
    if source == dest {
        return Ok(());
    }
    let name = crate::path_to_filename_string(dest);
    if !crate::naming::is_valid_filename(&name) {
        anyhow::bail!("Invalid destination name: {name}");
    }
    if dest.exists() && !options.overwrite {
        anyhow::bail!("Destination exists: {}", dest.display());
    }
    transfer(source, dest, options, None)
}

/// Perform the actual move or copy, choosing between the native call and the chunked copy.
fn transfer(source: &Path, dest: &Path, options: &ActionOptions, progress: Option<&mut ProgressFn<'_>>) -> Result<()> {
    let size = fs::metadata(source)
        .with_context(|| format!("Failed to read metadata: {}", source.display()))?
        .len();

    let use_native = match progress {
        None => true,
        Some(_) if size < options.chunked_threshold => true,
        Some(_) => options.same_volume_fast_path && same_volume(source, dest),
    };

    let mut noop = |_: u8| ControlFlow::<()>::Continue(());
    let callback: &mut ProgressFn<'_> = match progress {
        Some(callback) => callback,
        None => &mut noop,
    };

    if use_native {
        native_transfer(source, dest, options.keep_source, size, callback)?;
    } else {
        chunked_transfer(source, dest, options.keep_source, size, callback)?;
    }
    let _ = callback(100);
    Ok(())
}

/// Single native rename or copy. A move across devices falls back to a verified chunked copy.
///
/// A failed copy removes whatever part of the destination was written.
fn native_transfer(
    source: &Path,
    dest: &Path,
    keep_source: bool,
    size: u64,
    progress: &mut ProgressFn<'_>,
) -> Result<()> {
    if keep_source {
        if let Err(error) = fs::copy(source, dest) {
            remove_partial(dest);
            return Err(error).with_context(|| format!("Failed to copy to {}", dest.display()));
        }
        return Ok(());
    }

    finish_rename(fs::rename(source, dest), source, dest, size, progress)
}

/// Outcome of a native rename. A cross-device error becomes a chunked move that reports to `progress`.
fn finish_rename(
    renamed: io::Result<()>,
    source: &Path,
    dest: &Path,
    size: u64,
    progress: &mut ProgressFn<'_>,
) -> Result<()> {
    match renamed {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == io::ErrorKind::CrossesDevices => {
            chunked_transfer(source, dest, false, size, progress)
        }
        Err(error) => Err(error).with_context(|| format!("Failed to rename to {}", dest.display())),
    }
}

/// Copy block by block, verify the size, then remove the source for a move.
///
/// The destination is removed again on cancellation, I/O error or size mismatch.
fn chunked_transfer(
    source: &Path,
    dest: &Path,
    keep_source: bool,
    size: u64,
    progress: &mut ProgressFn<'_>,
) -> Result<()> {
    if let Err(error) = copy_blocks(source, dest, size, progress) {
        remove_partial(dest);
        return Err(error);
    }

    let written = match fs::metadata(dest) {
        Ok(metadata) => metadata.len(),
        Err(error) => {
            remove_partial(dest);
            return Err(error).with_context(|| format!("Failed to read metadata: {}", dest.display()));
        }
    };
    if written != size {
        remove_partial(dest);
        anyhow::bail!("Size mismatch after copy: expected {size} bytes, got {written} bytes");
    }

    if !keep_source && let Err(error) = fs::remove_file(source) {
        // Undo the copy so the file only exists in one place
        remove_partial(dest);
        return Err(error).with_context(|| format!("Failed to remove source {}", source.display()));
    }

    Ok(())
}

fn copy_blocks(source: &Path, dest: &Path, size: u64, progress: &mut ProgressFn<'_>) -> Result<()> {
    let mut reader = File::open(source).with_context(|| format!("Failed to open {}", source.display()))?;
    let mut writer =
        BufWriter::new(File::create(dest).with_context(|| format!("Failed to create {}", dest.display()))?);

    let mut buffer = vec![0_u8; CHUNK_SIZE];
    let mut copied: u64 = 0;
    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        writer.write_all(&buffer[..read])?;
        copied += read as u64;

        let percent = if size == 0 {
            COPY_PROGRESS_CAP
        } else {
            (copied * 100 / size).min(COPY_PROGRESS_CAP)
        };
        if progress(u8::try_from(percent).unwrap_or(u8::MAX)).is_break() {
            return Err(Cancelled.into());
        }
    }

    writer.flush()?;
    writer.into_inner().map_err(io::IntoInnerError::into_error)?.sync_all()?;
    Ok(())
}

fn remove_partial(dest: &Path) {
    if dest.exists()
        && let Err(error) = fs::remove_file(dest)
    {
        print_warning!("Failed to remove partial file {}: {error}", dest.display());
    }
}

fn ensure_parent_dir(dest: &Path) -> Result<()> {
    match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display())),
        _ => Ok(()),
    }
}

/// Paths differ only in letter case and point to the same file: needs a temp file on case-insensitive file systems.
fn is_case_only_change(source: &Path, dest: &Path) -> bool {
    source != dest
        && crate::path_to_string(source).to_lowercase() == crate::path_to_string(dest).to_lowercase()
        && is_same_file(source, dest)
}

#[cfg(unix)]
fn is_same_file(a: &Path, b: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    match (fs::metadata(a), fs::metadata(b)) {
        (Ok(x), Ok(y)) => x.dev() == y.dev() && x.ino() == y.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
fn is_same_file(_: &Path, b: &Path) -> bool {
    b.exists()
}

fn rename_with_temp_file(source: &Path, dest: &Path) -> io::Result<()> {
    let temp = crate::append_extension_to_path(source.to_path_buf(), "eprename.tmp");
    fs::rename(source, &temp)?;
    fs::rename(&temp, dest)
}

/// Heuristic check that both paths live on the same volume.
#[cfg(unix)]
fn same_volume(source: &Path, dest: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    let dest_anchor = dest.ancestors().skip(1).find(|p| p.exists());
    match (fs::metadata(source), dest_anchor.map(fs::metadata)) {
        (Ok(a), Some(Ok(b))) => a.dev() == b.dev(),
        _ => false,
    }
}

/// Heuristic check that both paths live on the same volume: same drive or share prefix.
#[cfg(not(unix))]
fn same_volume(source: &Path, dest: &Path) -> bool {
    match (source.components().next(), dest.components().next()) {
        (Some(a), Some(b)) => a.as_os_str().eq_ignore_ascii_case(b.as_os_str()),
        _ => false,
    }
}
