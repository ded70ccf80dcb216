use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use tempfile::Builder;

use crate::domain::{ThingId, Tracker};
use crate::error::TrackerError;

/// Directory name, relative to the asset base, that staged thumbnails live under.
pub const THUMBNAILS_DIR: &str = "thumbnails";

#[derive(Debug, Clone)]
pub struct Store {
    tracker_path: Utf8PathBuf,
    thumbnails_root: Utf8PathBuf,
}

impl Store {
    pub fn new_with_paths(tracker_path: Utf8PathBuf, thumbnails_root: Utf8PathBuf) -> Self {
        Self {
            tracker_path,
            thumbnails_root,
        }
    }

    pub fn tracker_path(&self) -> &Utf8Path {
        &self.tracker_path
    }

    pub fn thumbnails_root(&self) -> &Utf8Path {
        &self.thumbnails_root
    }

    pub fn thing_thumbnail_dir(&self, id: &ThingId) -> Utf8PathBuf {
        self.thumbnails_root.join(id.as_str())
    }

    /// Index-relative reference for a staged file, e.g. `thumbnails/{id}/img/a.jpg`.
    pub fn staged_reference(id: &ThingId, reference: &str) -> String {
        format!("{THUMBNAILS_DIR}/{id}/{reference}")
    }

    /// Drops everything staged for `id` by an earlier run and starts empty.
    pub fn reset_thing_dir(&self, id: &ThingId) -> Result<Utf8PathBuf, TrackerError> {
        let dir = self.thing_thumbnail_dir(id);
        if dir.as_std_path().exists() {
            fs::remove_dir_all(dir.as_std_path())
                .map_err(|err| TrackerError::Filesystem(format!("remove {dir}: {err}")))?;
        }
        fs::create_dir_all(dir.as_std_path())
            .map_err(|err| TrackerError::Filesystem(format!("create {dir}: {err}")))?;
        Ok(dir)
    }

    pub fn write_tracker(&self, tracker: &Tracker) -> Result<(), TrackerError> {
        Self::write_json(&self.tracker_path, tracker)
    }

    pub fn write_json<T: Serialize>(path: &Utf8Path, value: &T) -> Result<(), TrackerError> {
        let mut content = Vec::new();
        let formatter = PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut content, formatter);
        value
            .serialize(&mut serializer)
            .map_err(|err| TrackerError::Filesystem(err.to_string()))?;
        content.push(b'\n');
        Self::write_bytes_atomic(path, &content)
    }

    pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), TrackerError> {
        let parent = ensure_parent(path)?;
        let temp = Builder::new()
            .prefix(".thing-tracker")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| TrackerError::Filesystem(err.to_string()))?;
        fs::write(temp.path(), content)
            .map_err(|err| TrackerError::Filesystem(format!("write {path}: {err}")))?;
        temp.persist(path.as_std_path())
            .map_err(|err| TrackerError::Filesystem(format!("write {path}: {err}")))?;
        Ok(())
    }

    pub fn copy_file_atomic(source: &Utf8Path, dest: &Utf8Path) -> Result<(), TrackerError> {
        let parent = ensure_parent(dest)?;
        let temp = Builder::new()
            .prefix(".thing-tracker")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| TrackerError::Filesystem(err.to_string()))?;
        fs::copy(source.as_std_path(), temp.path())
            .map_err(|err| TrackerError::Filesystem(format!("copy {source}: {err}")))?;
        temp.persist(dest.as_std_path())
            .map_err(|err| TrackerError::Filesystem(format!("copy to {dest}: {err}")))?;
        Ok(())
    }
}

fn ensure_parent(path: &Utf8Path) -> Result<Utf8PathBuf, TrackerError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent.to_path_buf(),
        _ => Utf8PathBuf::from("."),
    };
    fs::create_dir_all(parent.as_std_path())
        .map_err(|err| TrackerError::Filesystem(format!("create {parent}: {err}")))?;
    Ok(parent)
}
