//! Staging of source text into a project's `input_new/` area.

use crate::error::IntakeError;
use crate::layout::ProjectLayout;
use chrono::{DateTime, Local};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Prefix format for files rotated into `input_archive/`.
const ARCHIVE_PREFIX_FORMAT: &str = "%Y%m%d_%H%M%S";

fn archive_err(path: &Path) -> impl FnOnce(io::Error) -> IntakeError + '_ {
    move |source| IntakeError::Archive {
        path: path.to_path_buf(),
        source,
    }
}

/// First free path for `file_name` in `dir`, appending `_1`, `_2`, ... to the stem.
pub fn unique_destination(dir: &Path, file_name: &str) -> PathBuf {
    let candidate = dir.join(file_name);
    if !candidate.exists() {
        return candidate;
    }

    let as_path = Path::new(file_name);
    let stem = as_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name);
    let ext = as_path.extension().and_then(|e| e.to_str());

    (1..)
        .map(|n| match ext {
            Some(ext) => dir.join(format!("{stem}_{n}.{ext}")),
            None => dir.join(format!("{stem}_{n}")),
        })
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

/// Move a file, falling back to copy + remove across filesystems.
fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(_) => {
            fs::copy(from, to)?;
            fs::remove_file(from)
        }
    }
}

/// Move everything in `input_new/` to `input_archive/` under a timestamp prefix.
///
/// Returns the archived paths.
pub fn rotate_previous_inputs(
    layout: &ProjectLayout,
    now: DateTime<Local>,
) -> Result<Vec<PathBuf>, IntakeError> {
    let input_new = layout.input_new();
    let archive = layout.input_archive();
    fs::create_dir_all(&input_new).map_err(archive_err(&input_new))?;
    fs::create_dir_all(&archive).map_err(archive_err(&archive))?;

    let prefix = now.format(ARCHIVE_PREFIX_FORMAT).to_string();
    let mut entries: Vec<PathBuf> = fs::read_dir(&input_new)
        .map_err(archive_err(&input_new))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    entries.sort();

    let mut archived = Vec::with_capacity(entries.len());
    for path in entries {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let dest = unique_destination(&archive, &format!("{prefix}_{name}"));
        move_file(&path, &dest).map_err(archive_err(&path))?;
        debug!("Archived {:?} -> {:?}", path, dest);
        archived.push(dest);
    }

    if !archived.is_empty() {
        info!("Archived {} previous input file(s)", archived.len());
    }
    Ok(archived)
}

/// Stage `files` for the next index run.
///
/// Previous contents of `input_new/` rotate into `input_archive/` first, so
/// the indexer only sees this run's sources. Source files are copied unless
/// `remove_sources` is set, in which case they are moved.
pub fn stage_inputs(
    layout: &ProjectLayout,
    files: &[PathBuf],
    remove_sources: bool,
    now: DateTime<Local>,
) -> Result<Vec<PathBuf>, IntakeError> {
    rotate_previous_inputs(layout, now)?;

    let input_new = layout.input_new();
    let mut staged = Vec::with_capacity(files.len());
    for file in files {
        let name = file
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| IntakeError::Archive {
                path: file.clone(),
                source: io::Error::new(io::ErrorKind::InvalidInput, "file name is not valid UTF-8"),
            })?;
        let dest = unique_destination(&input_new, name);

        if remove_sources {
            move_file(file, &dest).map_err(archive_err(file))?;
        } else {
            fs::copy(file, &dest).map_err(archive_err(file))?;
        }
        debug!("Staged {:?} -> {:?}", file, dest);
        staged.push(dest);
    }

    info!("Staged {} file(s) into {:?}", staged.len(), input_new);
    Ok(staged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 10, 17, 9, 30, 5).unwrap()
    }

    fn project() -> (tempfile::TempDir, ProjectLayout) {
        let dir = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path().join("proj"));
        fs::create_dir_all(layout.root()).unwrap();
        (dir, layout)
    }

    #[test]
    fn test_unique_destination() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(unique_destination(dir.path(), "a.txt"), dir.path().join("a.txt"));
        fs::write(dir.path().join("a.txt"), "").unwrap();
        assert_eq!(unique_destination(dir.path(), "a.txt"), dir.path().join("a_1.txt"));
        fs::write(dir.path().join("a_1.txt"), "").unwrap();
        assert_eq!(unique_destination(dir.path(), "a.txt"), dir.path().join("a_2.txt"));
        fs::write(dir.path().join("notes"), "").unwrap();
        assert_eq!(unique_destination(dir.path(), "notes"), dir.path().join("notes_1"));
    }

    #[test]
    fn test_stage_copies_and_keeps_originals() {
        let (dir, layout) = project();
        let src = dir.path().join("a.txt");
        fs::write(&src, "hello").unwrap();

        let staged = stage_inputs(&layout, &[src.clone()], false, fixed_now()).unwrap();
        assert_eq!(staged, vec![layout.input_new().join("a.txt")]);
        assert_eq!(fs::read_to_string(&staged[0]).unwrap(), "hello");
        assert!(src.exists());
    }

    #[test]
    fn test_stage_moves_when_removing_sources() {
        let (dir, layout) = project();
        let src = dir.path().join("a.txt");
        fs::write(&src, "hello").unwrap();

        stage_inputs(&layout, &[src.clone()], true, fixed_now()).unwrap();
        assert!(!src.exists());
        assert!(layout.input_new().join("a.txt").exists());
    }

    #[test]
    fn test_previous_inputs_rotate_into_archive() {
        let (dir, layout) = project();
        fs::create_dir_all(layout.input_new()).unwrap();
        fs::write(layout.input_new().join("old.txt"), "old").unwrap();
        let src = dir.path().join("new.txt");
        fs::write(&src, "new").unwrap();

        stage_inputs(&layout, &[src], false, fixed_now()).unwrap();

        let archived = layout.input_archive().join("20261017_093005_old.txt");
        assert_eq!(fs::read_to_string(archived).unwrap(), "old");
        let remaining: Vec<_> = fs::read_dir(layout.input_new())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(remaining, vec!["new.txt".to_string()]);
    }

    #[test]
    fn test_colliding_names_get_suffix() {
        let (dir, layout) = project();
        let a = dir.path().join("one").join("notes.txt");
        let b = dir.path().join("two").join("notes.txt");
        for p in [&a, &b] {
            fs::create_dir_all(p.parent().unwrap()).unwrap();
            fs::write(p, "x").unwrap();
        }

        let staged = stage_inputs(&layout, &[a, b], false, fixed_now()).unwrap();
        assert_eq!(
            staged,
            vec![
                layout.input_new().join("notes.txt"),
                layout.input_new().join("notes_1.txt")
            ]
        );
    }

    #[test]
    fn test_missing_source_is_archive_error() {
        let (dir, layout) = project();
        let err = stage_inputs(&layout, &[dir.path().join("gone.txt")], false, fixed_now())
            .unwrap_err();
        match err {
            IntakeError::Archive { path, .. } => assert!(path.ends_with("gone.txt")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
