use crate::domain::Thing;
use crate::links::{BaseUrls, is_local};
use crate::relocate::RelocationMap;

/// Final form of one reference: staged references become their staged path
/// under the asset base, other local references are anchored, absolute URLs
/// stay as they are.
pub fn rewrite_reference(reference: &str, relocated: &RelocationMap, bases: &BaseUrls) -> String {
    if let Some(staged) = relocated.get(reference) {
        return bases.anchor_asset(staged);
    }
    if is_local(reference) {
        return bases.anchor(reference);
    }
    reference.to_string()
}

/// Rewrites every URL-bearing field of `thing` in place. Running it again on
/// the result changes nothing.
pub fn rewrite_thing(thing: &mut Thing, relocated: &RelocationMap, bases: &BaseUrls) {
    let rewrite = |reference: &mut String| {
        let rewritten = rewrite_reference(reference, relocated, bases);
        if *reference != rewritten {
            tracing::debug!(from = %reference, to = %rewritten, "rewrote reference");
            *reference = rewritten;
        }
    };

    for thumb in thing.thumbnail_urls.iter_mut().flatten() {
        rewrite(thumb);
    }
    for entry in thing.bill_of_materials.iter_mut().flatten() {
        rewrite(&mut entry.url);
        if let Some(thumb) = entry.thumbnail_url.as_mut() {
            rewrite(thumb);
        }
    }
    for instruction in thing.instructions.iter_mut().flatten() {
        for image in instruction.images.iter_mut().flatten() {
            rewrite(image);
        }
    }
    for relationship in thing.relationships.iter_mut().flatten() {
        rewrite(&mut relationship.url);
    }
}
