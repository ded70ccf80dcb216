use std::fs;

use camino::Utf8PathBuf;
use thing_tracker::domain::{Thing, ThingId, Tracker};
use thing_tracker::store::Store;

fn temp_store(temp: &tempfile::TempDir) -> (Utf8PathBuf, Store) {
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    let store = Store::new_with_paths(root.join("tracker.json"), root.join("thumbnails"));
    (root, store)
}

#[test]
fn reset_clears_previous_staging() {
    let temp = tempfile::tempdir().unwrap();
    let (_, store) = temp_store(&temp);
    let id: ThingId = "widget".parse().unwrap();
    let other: ThingId = "gadget".parse().unwrap();

    let dir = store.reset_thing_dir(&id).unwrap();
    fs::write(dir.join("old.png").as_std_path(), b"old").unwrap();
    let other_dir = store.reset_thing_dir(&other).unwrap();
    fs::write(other_dir.join("keep.png").as_std_path(), b"keep").unwrap();

    let dir = store.reset_thing_dir(&id).unwrap();
    assert!(dir.as_std_path().is_dir());
    assert!(!dir.join("old.png").as_std_path().exists());
    assert!(other_dir.join("keep.png").as_std_path().exists());
}

#[test]
fn tracker_is_written_with_four_space_indent() {
    let temp = tempfile::tempdir().unwrap();
    let (root, store) = temp_store(&temp);
    let mut tracker = Tracker::default();
    tracker
        .things
        .push(Thing::new("w".parse().unwrap(), "https://github.com/a/w"));
    tracker.things_count = 1;

    store.write_tracker(&tracker).unwrap();
    let content = fs::read_to_string(root.join("tracker.json").as_std_path()).unwrap();
    assert!(content.starts_with("{\n    \"things\": [\n        {\n"));
    assert!(content.ends_with("}\n"));

    let leftovers = fs::read_dir(temp.path())
        .unwrap()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_name().to_string_lossy().starts_with(".thing-tracker"))
        .count();
    assert_eq!(leftovers, 0);
}

#[test]
fn copy_creates_nested_destination() {
    let temp = tempfile::tempdir().unwrap();
    let (root, _) = temp_store(&temp);
    let source = root.join("front.jpg");
    fs::write(source.as_std_path(), b"jpeg").unwrap();

    let dest = root.join("thumbnails/widget/img/front.jpg");
    Store::copy_file_atomic(&source, &dest).unwrap();
    assert_eq!(fs::read(dest.as_std_path()).unwrap(), b"jpeg");
}
