use std::sync::LazyLock;

use regex::Regex;

use crate::doc::{Document, Element, Node};
use crate::domain::{Instruction, RELATIONSHIP_REFERENCE, Relationship, Thing};
use crate::links::BaseUrls;

static STEP_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*step\s*\d+\s*[:.]?\s*").unwrap());

static LICENSE_REGISTRY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^https?://(www\.)?(spdx\.org|opensource\.org|choosealicense\.com)/").unwrap()
});

/// Relative prefix marking an image that belongs to an instruction step.
const STEP_IMAGE_PREFIX: &str = "./";

/// Fields mined from a README. `None` means the section was absent and the
/// thing's own value stands.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadmeFields {
    pub description: Option<String>,
    pub licenses: Option<Vec<String>>,
    pub instructions: Option<Vec<Instruction>>,
    pub relationships: Option<Vec<Relationship>>,
}

impl ReadmeFields {
    pub fn apply(self, thing: &mut Thing) {
        if let Some(description) = self.description {
            thing.description = Some(description);
        }
        if let Some(licenses) = self.licenses {
            thing.licenses = Some(licenses);
        }
        if let Some(instructions) = self.instructions {
            thing.instructions = Some(instructions);
        }
        if let Some(relationships) = self.relationships {
            thing.relationships = Some(relationships);
        }
    }
}

pub fn extract(markdown: &str, bases: &BaseUrls) -> ReadmeFields {
    let doc = Document::from_markdown(markdown);
    ReadmeFields {
        description: description(&doc, bases),
        licenses: licenses(&doc),
        instructions: instructions(&doc, bases),
        relationships: relationships(&doc, bases),
    }
}

/// Matches a heading whose anchor is `key` or starts with `key-`, so
/// "Related Things" answers to `related`.
fn anchored(key: &str) -> impl Fn(&Element) -> bool + '_ {
    move |el: &Element| {
        el.anchor().is_some_and(|anchor| {
            anchor == key
                || anchor
                    .strip_prefix(key)
                    .is_some_and(|rest| rest.starts_with('-'))
        })
    }
}

fn finish_body(mut body: Document, bases: &BaseUrls) -> String {
    body.rewrite_links(|value| bases.anchor(value));
    body.to_html().trim().to_string()
}

pub fn description(doc: &Document, bases: &BaseUrls) -> Option<String> {
    let mut section = doc.section(anchored("description"))?;
    section.strip_layout();
    let html = finish_body(section, bases);
    if html.is_empty() {
        return None;
    }
    Some(html)
}

pub fn licenses(doc: &Document) -> Option<Vec<String>> {
    let section = doc.section(anchored("license"))?;
    let licenses = section
        .elements("a")
        .into_iter()
        .filter_map(|link| {
            let text = link.text();
            let text = text.trim();
            if is_spdx(text) {
                return Some(text.to_string());
            }
            link.attr("href").and_then(license_from_registry)
        })
        .collect();
    Some(licenses)
}

fn is_spdx(candidate: &str) -> bool {
    !candidate.is_empty() && spdx::Expression::parse(candidate).is_ok()
}

fn license_from_registry(href: &str) -> Option<String> {
    if !LICENSE_REGISTRY_RE.is_match(href) {
        return None;
    }
    let path = href.split(['?', '#']).next().unwrap_or(href);
    let segment = path.rsplit('/').find(|segment| !segment.is_empty())?;
    let id = [".html", ".php", ".txt", ".json"]
        .iter()
        .find_map(|ext| segment.strip_suffix(ext))
        .unwrap_or(segment);
    is_spdx(id).then(|| id.to_string())
}

pub fn instructions(doc: &Document, bases: &BaseUrls) -> Option<Vec<Instruction>> {
    let matches = anchored("instructions");
    let parent_level = doc.heading(&matches)?.heading_level()?;
    let section = doc.section(&matches)?;

    let mut steps = Vec::new();
    for (index, node) in section.nodes.iter().enumerate() {
        let Some(heading) = node.as_element() else {
            continue;
        };
        if heading.heading_level() != Some(parent_level + 1) {
            continue;
        }
        let title = STEP_PREFIX_RE
            .replace(heading.text().trim(), "")
            .trim()
            .to_string();
        let mut body = section.section_at(index);

        let images: Vec<String> = body
            .elements("img")
            .into_iter()
            .filter_map(|img| img.attr("src"))
            .filter_map(|src| src.strip_prefix(STEP_IMAGE_PREFIX))
            .map(str::to_string)
            .collect();

        body.strip_layout();
        if !title.is_empty() {
            body.prepend(vec![
                Node::Element(Element::new("strong").with_text(title)),
                Node::Element(Element::new("br")),
            ]);
        }

        steps.push(Instruction {
            step: steps.len() as u32 + 1,
            text: finish_body(body, bases),
            images: (!images.is_empty()).then_some(images),
        });
    }
    Some(steps)
}

pub fn relationships(doc: &Document, bases: &BaseUrls) -> Option<Vec<Relationship>> {
    let section = doc.section(anchored("related"))?;
    let mut related = Vec::new();
    for item in section.elements("li") {
        let links = item.descendants("a");
        let [link] = links.as_slice() else {
            tracing::warn!(links = links.len(), "skipping related item without exactly one link");
            continue;
        };
        let Some(href) = link.attr("href") else {
            continue;
        };
        related.push(Relationship {
            kind: RELATIONSHIP_REFERENCE.to_string(),
            url: bases.anchor(href),
            title: Some(item.text().trim().to_string()),
        });
    }
    Some(related)
}
