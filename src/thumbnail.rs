use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use camino::{Utf8Path, Utf8PathBuf};

use crate::domain::Thing;
use crate::error::TrackerError;
use crate::links::is_local;
use crate::mime;
use crate::relocate::confined;
use crate::store::Store;

/// Edge length of rendered model previews, in pixels.
pub const PREVIEW_SIZE: u32 = 500;

/// Rasterizes a 3D model file into PNG bytes.
pub trait ThumbnailRenderer: Send + Sync {
    fn render(&self, source: &Utf8Path, width: u32, height: u32) -> Result<Vec<u8>, TrackerError>;
}

impl<R: ThumbnailRenderer + ?Sized> ThumbnailRenderer for &R {
    fn render(&self, source: &Utf8Path, width: u32, height: u32) -> Result<Vec<u8>, TrackerError> {
        (**self).render(source, width, height)
    }
}

/// Renders through the `stl-thumb` command line tool.
#[derive(Debug, Clone)]
pub struct CommandRenderer {
    program: Option<PathBuf>,
}

impl CommandRenderer {
    pub const DEFAULT_PROGRAM: &'static str = "stl-thumb";

    pub fn new() -> Self {
        Self {
            program: find_in_path(Self::DEFAULT_PROGRAM),
        }
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: Some(program.into()),
        }
    }

    fn require_program(&self) -> Result<&Path, TrackerError> {
        self.program
            .as_deref()
            .ok_or_else(|| TrackerError::MissingTool(Self::DEFAULT_PROGRAM.to_string()))
    }
}

impl Default for CommandRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl ThumbnailRenderer for CommandRenderer {
    fn render(&self, source: &Utf8Path, width: u32, height: u32) -> Result<Vec<u8>, TrackerError> {
        let program = self.require_program()?;
        let out_dir = tempfile::tempdir().map_err(|err| TrackerError::Filesystem(err.to_string()))?;
        let out_path = out_dir.path().join("preview.png");
        let render_err = |message: String| TrackerError::Render {
            source_path: source.to_path_buf(),
            message,
        };

        let output = Command::new(program)
            .arg("--size")
            .arg(width.max(height).to_string())
            .arg(source.as_std_path())
            .arg(&out_path)
            .output()
            .map_err(|err| render_err(err.to_string()))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let message = if stderr.is_empty() {
                format!("command failed: {}", program.display())
            } else {
                stderr
            };
            return Err(render_err(message));
        }
        fs::read(&out_path).map_err(|err| render_err(format!("no image produced: {err}")))
    }
}

fn find_in_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for path in std::env::split_paths(&path_var) {
        let exe = path.join(format!("{name}.exe"));
        if exe.exists() {
            return Some(exe);
        }
        let plain = path.join(name);
        if plain.exists() {
            return Some(plain);
        }
    }
    None
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderJob {
    pub source: Utf8PathBuf,
    pub destination: Utf8PathBuf,
    pub width: u32,
    pub height: u32,
}

/// Pending render jobs, drained strictly in scheduling order by one worker.
#[derive(Debug, Default)]
pub struct RenderQueue {
    jobs: VecDeque<RenderJob>,
}

impl RenderQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, job: RenderJob) {
        self.jobs.push_back(job);
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn jobs(&self) -> impl Iterator<Item = &RenderJob> {
        self.jobs.iter()
    }

    /// Runs every job in order. The first failure stops the chain; jobs after
    /// it never start.
    pub fn drain<R: ThumbnailRenderer + ?Sized>(mut self, renderer: &R) -> Result<usize, TrackerError> {
        let mut done = 0;
        while let Some(job) = self.jobs.pop_front() {
            tracing::info!(source = %job.source, "rendering thumbnail");
            let bytes = renderer.render(&job.source, job.width, job.height)?;
            Store::write_bytes_atomic(&job.destination, &bytes)?;
            done += 1;
        }
        Ok(done)
    }
}

/// Registers a generated thumbnail for every local 3D model entry that lacks
/// one and schedules its render.
///
/// The index-relative path is recorded on the entry and appended to the
/// thing's thumbnail list right away, so later rewriting treats it like any
/// other staged reference.
pub fn plan_thumbnails(
    thing: &mut Thing,
    store: &Store,
    source_dir: &Utf8Path,
) -> Result<RenderQueue, TrackerError> {
    let mut queue = RenderQueue::new();
    let id = thing.id.clone();
    let staging = store.thing_thumbnail_dir(&id);
    let mut generated = Vec::new();

    for entry in thing.bill_of_materials.iter_mut().flatten() {
        if !mime::is_model(entry) || entry.thumbnail_url.is_some() || !is_local(&entry.url) {
            continue;
        }
        let relative = confined(&entry.url)?;
        let thumb_ref = Store::staged_reference(&id, &format!("{}.png", entry.url));
        queue.schedule(RenderJob {
            source: source_dir.join(relative),
            destination: staging.join(format!("{relative}.png")),
            width: PREVIEW_SIZE,
            height: PREVIEW_SIZE,
        });
        entry.thumbnail_url = Some(thumb_ref.clone());
        generated.push(thumb_ref);
    }

    if !generated.is_empty() {
        thing
            .thumbnail_urls
            .get_or_insert_with(Vec::new)
            .extend(generated);
    }
    Ok(queue)
}
