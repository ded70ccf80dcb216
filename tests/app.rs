use std::fs;
use std::sync::Mutex;

use assert_matches::assert_matches;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Value, json};

use thing_tracker::app::{App, RefreshRequest};
use thing_tracker::domain::{Thing, Tracker};
use thing_tracker::error::TrackerError;
use thing_tracker::store::Store;
use thing_tracker::thumbnail::ThumbnailRenderer;

#[derive(Default)]
struct MockRenderer {
    calls: Mutex<Vec<(Utf8PathBuf, u32, u32)>>,
}

impl ThumbnailRenderer for MockRenderer {
    fn render(&self, source: &Utf8Path, width: u32, height: u32) -> Result<Vec<u8>, TrackerError> {
        self.calls
            .lock()
            .unwrap()
            .push((source.to_path_buf(), width, height));
        Ok(b"\x89PNG mock".to_vec())
    }
}

struct FailingRenderer;

impl ThumbnailRenderer for FailingRenderer {
    fn render(&self, source: &Utf8Path, _width: u32, _height: u32) -> Result<Vec<u8>, TrackerError> {
        Err(TrackerError::Render {
            source_path: source.to_path_buf(),
            message: "renderer crashed".to_string(),
        })
    }
}

struct Fixture {
    _temp: tempfile::TempDir,
    root: Utf8PathBuf,
    thing_dir: Utf8PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let thing_dir = root.join("src/widget");
        fs::create_dir_all(thing_dir.join("img").as_std_path()).unwrap();
        fs::write(thing_dir.join("img/front.jpg").as_std_path(), b"jpeg").unwrap();
        fs::write(thing_dir.join("model.stl").as_std_path(), b"solid m\nendsolid m\n").unwrap();
        write_json(
            &root.join("tracker.json"),
            &json!({
                "things": [
                    {"id": "gadget", "url": "https://github.com/bob/gadget"},
                    {"id": "widget", "url": "https://github.com/alice/widget", "description": "old"}
                ],
                "thingsCount": 2,
                "updated": "2020-01-01T00:00:00.000Z"
            }),
        );
        Self {
            _temp: temp,
            root,
            thing_dir,
        }
    }

    fn store(&self) -> Store {
        Store::new_with_paths(self.root.join("tracker.json"), self.root.join("thumbnails"))
    }

    fn write_thing(&self, thing: &Value) -> Utf8PathBuf {
        let path = self.thing_dir.join("thing.json");
        write_json(&path, thing);
        path
    }

    fn request(&self, thing_path: Utf8PathBuf) -> RefreshRequest {
        RefreshRequest {
            thing_path,
            base: None,
            readme: None,
        }
    }

    fn tracker(&self) -> Tracker {
        let content = fs::read_to_string(self.root.join("tracker.json").as_std_path()).unwrap();
        serde_json::from_str(&content).unwrap()
    }

    fn tracker_bytes(&self) -> Vec<u8> {
        fs::read(self.root.join("tracker.json").as_std_path()).unwrap()
    }

    fn widget(&self) -> Thing {
        let id = "widget".parse().unwrap();
        self.tracker().find(&id).cloned().unwrap()
    }
}

fn write_json(path: &Utf8Path, value: &Value) {
    fs::write(path.as_std_path(), serde_json::to_vec_pretty(value).unwrap()).unwrap();
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 19, 9, 30, 0).unwrap()
}

fn widget_json() -> Value {
    json!({
        "id": "widget",
        "url": "https://github.com/alice/widget",
        "title": "Widget",
        "thumbnailUrls": ["img/front.jpg", "https://example.com/side.jpg"],
        "billOfMaterials": [
            {"url": "model.stl"},
            {"url": "docs/guide.pdf", "mimetype": "application/x-custom"},
            {"url": "https://example.com/remote.stl"}
        ]
    })
}

#[test]
fn stages_thumbnails_and_anchors_them() {
    let fixture = Fixture::new();
    let path = fixture.write_thing(&widget_json());
    let app = App::new(fixture.store(), MockRenderer::default());

    let result = app.refresh_at(&fixture.request(path), now()).unwrap();
    assert_eq!(result.relocated, 1);
    assert_eq!(result.asset_base, "https://github.com/alice/widget/raw/master/");
    assert_eq!(
        result.viewer_base.as_deref(),
        Some("https://github.com/alice/widget/blob/master/")
    );

    let widget = fixture.widget();
    assert_eq!(
        widget.thumbnail_urls.unwrap(),
        vec![
            "https://github.com/alice/widget/raw/master/thumbnails/widget/img/front.jpg",
            "https://example.com/side.jpg",
            "https://github.com/alice/widget/raw/master/thumbnails/widget/model.stl.png",
        ]
    );
    let staged = fixture.root.join("thumbnails/widget/img/front.jpg");
    assert_eq!(fs::read(staged.as_std_path()).unwrap(), b"jpeg");
}

#[test]
fn models_route_to_viewer_and_get_rendered_thumbnails() {
    let fixture = Fixture::new();
    let path = fixture.write_thing(&widget_json());
    let renderer = MockRenderer::default();
    let app = App::new(fixture.store(), renderer);

    let result = app.refresh_at(&fixture.request(path), now()).unwrap();
    assert_eq!(result.rendered, 1);

    let bom = fixture.widget().bill_of_materials.unwrap();
    assert_eq!(bom[0].url, "https://github.com/alice/widget/blob/master/model.stl");
    assert_eq!(bom[0].mimetype.as_deref(), Some("application/sla"));
    assert_eq!(
        bom[0].thumbnail_url.as_deref(),
        Some("https://github.com/alice/widget/raw/master/thumbnails/widget/model.stl.png")
    );
    assert_eq!(bom[1].url, "https://github.com/alice/widget/raw/master/docs/guide.pdf");
    assert_eq!(bom[1].mimetype.as_deref(), Some("application/x-custom"));
    assert_eq!(bom[2].url, "https://example.com/remote.stl");
    assert_eq!(bom[2].thumbnail_url, None);

    let png = fixture.root.join("thumbnails/widget/model.stl.png");
    assert_eq!(fs::read(png.as_std_path()).unwrap(), b"\x89PNG mock");
}

#[test]
fn renderer_gets_source_file_and_preview_size() {
    let fixture = Fixture::new();
    let path = fixture.write_thing(&widget_json());
    let store = fixture.store();
    let renderer = MockRenderer::default();
    let app = App::new(store, &renderer);

    app.refresh_at(&fixture.request(path), now()).unwrap();
    let calls = renderer.calls.lock().unwrap();
    assert_eq!(
        *calls,
        vec![(fixture.thing_dir.join("model.stl"), 500, 500)]
    );
}

#[test]
fn replaces_existing_entry_wholesale() {
    let fixture = Fixture::new();
    let path = fixture.write_thing(&widget_json());
    let app = App::new(fixture.store(), MockRenderer::default());

    let result = app.refresh_at(&fixture.request(path), now()).unwrap();
    assert!(result.replaced);

    let tracker = fixture.tracker();
    assert_eq!(tracker.things_count, 2);
    assert_eq!(tracker.things.len(), 2);
    assert_eq!(tracker.things[0].id.as_str(), "gadget");
    assert_eq!(tracker.things[1].id.as_str(), "widget");
    assert_eq!(tracker.things[1].description, None);
    assert_eq!(tracker.things[1].extra.get("title"), Some(&json!("Widget")));
    assert_eq!(tracker.updated.as_deref(), Some("2026-10-19T09:30:00.000Z"));
    assert_eq!(tracker.things[1].updated, tracker.updated);
}

#[test]
fn appends_unknown_thing() {
    let fixture = Fixture::new();
    let mut thing = widget_json();
    thing["id"] = json!("widget-mk2");
    let path = fixture.write_thing(&thing);
    let app = App::new(fixture.store(), MockRenderer::default());

    let result = app.refresh_at(&fixture.request(path), now()).unwrap();
    assert!(!result.replaced);
    assert_eq!(result.things_count, 3);
    assert_eq!(fixture.tracker().things[2].id.as_str(), "widget-mk2");
}

#[test]
fn rerunning_on_rewritten_record_is_stable() {
    let fixture = Fixture::new();
    let path = fixture.write_thing(&widget_json());
    let app = App::new(fixture.store(), MockRenderer::default());
    app.refresh_at(&fixture.request(path), now()).unwrap();
    let first = fixture.widget();

    let path = fixture.write_thing(&serde_json::to_value(&first).unwrap());
    let result = app.refresh_at(&fixture.request(path), now()).unwrap();
    assert_eq!(result.relocated, 0);
    assert_eq!(result.rendered, 0);

    let second = fixture.widget();
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn readme_sections_override_fields() {
    let fixture = Fixture::new();
    let mut thing = widget_json();
    thing["licenses"] = json!(["GPL-3.0-only"]);
    let path = fixture.write_thing(&thing);
    let readme = fixture.thing_dir.join("README.md");
    fs::write(
        readme.as_std_path(),
        "# Widget\n\n## Description\n\nA handy [widget](model.stl).\n\n\
         ## Instructions\n\n### Step 1: Cut\n\n![cut](./img/cut.jpg)\n\nCut.\n\n### Step 2: Drill\n\nDrill.\n\n\
         ## License\n\n[MIT](https://spdx.org/licenses/MIT.html)\n\n\
         ## Related\n\n- [Gadget](https://github.com/bob/gadget)\n",
    )
    .unwrap();
    let app = App::new(fixture.store(), MockRenderer::default());
    let mut request = fixture.request(path);
    request.readme = Some(readme);

    let result = app.refresh_at(&request, now()).unwrap();
    assert!(result.readme);

    let widget = fixture.widget();
    assert_eq!(
        widget.description.as_deref(),
        Some("<p>A handy <a href=\"https://github.com/alice/widget/blob/master/model.stl\">widget</a>.</p>")
    );
    assert_eq!(widget.licenses, Some(vec!["MIT".to_string()]));

    let steps = widget.instructions.unwrap();
    assert_eq!(steps.iter().map(|s| s.step).collect::<Vec<_>>(), vec![1, 2]);
    assert!(steps[0].text.starts_with("<strong>Cut</strong><br>"));
    assert!(steps[1].text.starts_with("<strong>Drill</strong><br>"));
    assert_eq!(
        steps[0].images,
        Some(vec!["https://github.com/alice/widget/raw/master/img/cut.jpg".to_string()])
    );

    let related = widget.relationships.unwrap();
    assert_eq!(related.len(), 1);
    assert_eq!(related[0].kind, "reference");
    assert_eq!(related[0].url, "https://github.com/bob/gadget");
    assert_eq!(related[0].title.as_deref(), Some("Gadget"));
}

#[test]
fn explicit_base_disables_viewer_routing() {
    let fixture = Fixture::new();
    let path = fixture.write_thing(&widget_json());
    let app = App::new(fixture.store(), MockRenderer::default());
    let mut request = fixture.request(path);
    request.base = Some("https://things.example.com/widget".to_string());

    let result = app.refresh_at(&request, now()).unwrap();
    assert_eq!(result.viewer_base, None);
    let bom = fixture.widget().bill_of_materials.unwrap();
    assert_eq!(bom[0].url, "https://things.example.com/widget/model.stl");
}

#[test]
fn render_failure_leaves_tracker_untouched() {
    let fixture = Fixture::new();
    let path = fixture.write_thing(&widget_json());
    let before = fixture.tracker_bytes();
    let app = App::new(fixture.store(), FailingRenderer);

    let err = app.refresh_at(&fixture.request(path), now()).unwrap_err();
    assert_matches!(err, TrackerError::Render { .. });
    assert_eq!(fixture.tracker_bytes(), before);
}

#[test]
fn unresolvable_base_fails_before_staging() {
    let fixture = Fixture::new();
    let stale = fixture.root.join("thumbnails/widget/stale.png");
    fs::create_dir_all(stale.parent().unwrap().as_std_path()).unwrap();
    fs::write(stale.as_std_path(), b"old").unwrap();
    let mut thing = widget_json();
    thing["url"] = json!("https://example.com/alice/widget");
    let path = fixture.write_thing(&thing);
    let before = fixture.tracker_bytes();
    let app = App::new(fixture.store(), MockRenderer::default());

    let err = app.refresh_at(&fixture.request(path), now()).unwrap_err();
    assert_matches!(err, TrackerError::BaseUnresolved(_));
    assert!(stale.as_std_path().exists());
    assert_eq!(fixture.tracker_bytes(), before);
}

#[test]
fn schema_violation_fails_before_staging() {
    let fixture = Fixture::new();
    let path = fixture.write_thing(&json!({"id": "widget", "billOfMaterials": "nope"}));
    let app = App::new(fixture.store(), MockRenderer::default());

    let err = app.refresh_at(&fixture.request(path), now()).unwrap_err();
    assert_matches!(err, TrackerError::InputSchema { .. });
    assert!(!fixture.root.join("thumbnails/widget").as_std_path().exists());
}

#[test]
fn missing_readme_is_input_error() {
    let fixture = Fixture::new();
    let path = fixture.write_thing(&widget_json());
    let app = App::new(fixture.store(), MockRenderer::default());
    let mut request = fixture.request(path);
    request.readme = Some(fixture.thing_dir.join("MISSING.md"));

    let err = app.refresh_at(&request, now()).unwrap_err();
    assert_matches!(err, TrackerError::InputRead(_));
}

#[test]
fn missing_thumbnail_source_aborts_without_writing() {
    let fixture = Fixture::new();
    let mut thing = widget_json();
    thing["thumbnailUrls"] = json!(["img/missing.jpg"]);
    let path = fixture.write_thing(&thing);
    let before = fixture.tracker_bytes();
    let app = App::new(fixture.store(), MockRenderer::default());

    let err = app.refresh_at(&fixture.request(path), now()).unwrap_err();
    assert_matches!(err, TrackerError::AssetCopy { .. });
    assert_eq!(fixture.tracker_bytes(), before);
}
