use crate::domain::BomEntry;

/// MIME label of the 3D model format that gets rendered thumbnails and
/// routes to the viewer base.
pub const MODEL_MIME: &str = "application/sla";
pub const MODEL_SUFFIX: &str = ".stl";

const MIME_TABLE: &[(&str, &str)] = &[
    ("pdf", "application/pdf"),
    ("stl", MODEL_MIME),
    ("scad", "application/x-openscad"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("txt", "text/plain"),
    ("md", "text/markdown"),
];

pub fn mime_for(reference: &str) -> Option<&'static str> {
    let path = reference.split(['?', '#']).next().unwrap_or(reference);
    let file_name = path.rsplit('/').next().unwrap_or(path);
    let (_, suffix) = file_name.rsplit_once('.')?;
    let suffix = suffix.to_ascii_lowercase();
    MIME_TABLE
        .iter()
        .find(|(ext, _)| *ext == suffix)
        .map(|(_, mime)| *mime)
}

/// Fills in `mimetype` from the file suffix. An explicit value is kept.
pub fn infer_mime(entry: &mut BomEntry) {
    if entry.mimetype.is_some() {
        return;
    }
    entry.mimetype = mime_for(&entry.url).map(str::to_string);
}

pub fn is_model(entry: &BomEntry) -> bool {
    entry.mimetype.as_deref() == Some(MODEL_MIME)
}
