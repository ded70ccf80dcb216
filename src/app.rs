use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::TrackerError;
use crate::input;
use crate::links::BaseUrls;
use crate::mime;
use crate::readme;
use crate::relocate::relocate;
use crate::rewrite::rewrite_thing;
use crate::store::Store;
use crate::thumbnail::{ThumbnailRenderer, plan_thumbnails};
use crate::tracker::{merge, timestamp};

#[derive(Debug, Clone)]
pub struct RefreshRequest {
    pub thing_path: Utf8PathBuf,
    pub base: Option<String>,
    pub readme: Option<Utf8PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshResult {
    pub thing_id: String,
    pub tracker_path: String,
    pub asset_base: String,
    pub viewer_base: Option<String>,
    pub replaced: bool,
    pub readme: bool,
    pub relocated: usize,
    pub rendered: usize,
    pub things_count: usize,
    pub updated: String,
}

pub struct App<R: ThumbnailRenderer> {
    store: Store,
    renderer: R,
}

impl<R: ThumbnailRenderer> App<R> {
    pub fn new(store: Store, renderer: R) -> Self {
        Self { store, renderer }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn refresh(&self, request: &RefreshRequest) -> Result<RefreshResult, TrackerError> {
        self.refresh_at(request, Utc::now())
    }

    /// Runs the whole pipeline for one thing. Inputs, the base URL and the
    /// README are all checked before the staging directory is touched, and
    /// the tracker is written only after every thumbnail has rendered.
    pub fn refresh_at(
        &self,
        request: &RefreshRequest,
        now: DateTime<Utc>,
    ) -> Result<RefreshResult, TrackerError> {
        let mut tracker = input::load_tracker(self.store.tracker_path())?;
        let mut thing = input::load_thing(&request.thing_path)?;
        let bases = BaseUrls::resolve(request.base.as_deref(), &thing.url)?;
        tracing::info!(id = %thing.id, asset = %bases.asset, "resolved base URL");

        let markdown = match &request.readme {
            Some(path) => Some(
                fs::read_to_string(path.as_std_path())
                    .map_err(|_| TrackerError::InputRead(path.clone()))?,
            ),
            None => None,
        };
        let used_readme = markdown.is_some();
        if let Some(markdown) = markdown {
            readme::extract(&markdown, &bases).apply(&mut thing);
            tracing::info!("applied README sections");
        }

        for entry in thing.bill_of_materials.iter_mut().flatten() {
            mime::infer_mime(entry);
        }

        let source_dir = source_dir(&request.thing_path);
        self.store.reset_thing_dir(&thing.id)?;
        let references = thing.thumbnail_urls.clone().unwrap_or_default();
        let relocated = relocate(&self.store, &thing.id, &source_dir, &references)?;
        tracing::info!(count = relocated.len(), "staged thumbnails");

        let queue = plan_thumbnails(&mut thing, &self.store, &source_dir)?;
        rewrite_thing(&mut thing, &relocated, &bases);

        let thing_id = thing.id.to_string();
        let replaced = merge(&mut tracker, thing, now);

        let scheduled = queue.len();
        let rendered = queue.drain(&self.renderer)?;
        tracing::info!(rendered, scheduled, "rendered thumbnails");

        self.store.write_tracker(&tracker)?;
        tracing::info!(path = %self.store.tracker_path(), replaced, "tracker updated");

        Ok(RefreshResult {
            thing_id,
            tracker_path: self.store.tracker_path().to_string(),
            asset_base: bases.asset,
            viewer_base: bases.viewer,
            replaced,
            readme: used_readme,
            relocated: relocated.len(),
            rendered,
            things_count: tracker.things_count,
            updated: timestamp(now),
        })
    }
}

fn source_dir(thing_path: &Utf8Path) -> Utf8PathBuf {
    match thing_path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent.to_path_buf(),
        _ => Utf8PathBuf::from("."),
    }
}
