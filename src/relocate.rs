use std::collections::HashMap;

use camino::{Utf8Component, Utf8Path};

use crate::domain::ThingId;
use crate::error::TrackerError;
use crate::links::is_local;
use crate::store::Store;

/// Original local reference -> staged reference, built once per run.
/// Lookups are exact string matches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelocationMap {
    entries: HashMap<String, String>,
}

impl RelocationMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, original: impl Into<String>, staged: impl Into<String>) {
        self.entries.insert(original.into(), staged.into());
    }

    pub fn get(&self, original: &str) -> Option<&str> {
        self.entries.get(original).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Copies every local thumbnail reference into the thing's staging directory.
///
/// `source_dir` is the directory holding the thing description; references
/// are relative to it. The staging directory must already be reset.
pub fn relocate(
    store: &Store,
    id: &ThingId,
    source_dir: &Utf8Path,
    references: &[String],
) -> Result<RelocationMap, TrackerError> {
    let staging = store.thing_thumbnail_dir(id);
    let mut map = RelocationMap::new();

    for reference in references {
        if !is_local(reference) || map.get(reference).is_some() {
            continue;
        }
        let relative = confined(reference)?;
        let source = source_dir.join(relative);
        let dest = staging.join(relative);
        if !source.as_std_path().is_file() {
            return Err(TrackerError::AssetCopy {
                reference: reference.clone(),
                message: format!("{source} does not exist"),
            });
        }
        Store::copy_file_atomic(&source, &dest).map_err(|err| TrackerError::AssetCopy {
            reference: reference.clone(),
            message: err.to_string(),
        })?;
        tracing::debug!(%reference, %dest, "staged thumbnail");
        map.insert(reference.clone(), Store::staged_reference(id, reference));
    }

    Ok(map)
}

/// Rejects references that would land outside the staging directory.
pub(crate) fn confined(reference: &str) -> Result<&Utf8Path, TrackerError> {
    let path = Utf8Path::new(reference);
    let escapes = path.components().any(|component| {
        matches!(
            component,
            Utf8Component::ParentDir | Utf8Component::RootDir | Utf8Component::Prefix(_)
        )
    });
    if escapes || path.file_name().is_none() {
        return Err(TrackerError::AssetCopy {
            reference: reference.to_string(),
            message: "reference must be a relative file path inside the thing directory"
                .to_string(),
        });
    }
    Ok(path)
}
