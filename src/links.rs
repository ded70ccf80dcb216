use std::sync::LazyLock;

use regex::Regex;

use crate::error::TrackerError;
use crate::mime::MODEL_SUFFIX;

static SCHEME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:").unwrap());

/// A reference is local unless it carries a URI scheme. Scheme-relative
/// (`//host/x`), fragment-only and relative paths are all local.
pub fn is_local(reference: &str) -> bool {
    !SCHEME_RE.is_match(reference)
}

struct HostingPattern {
    name: &'static str,
    project: &'static str,
    raw: &'static str,
    viewer: &'static str,
}

static HOSTING_PATTERNS: &[HostingPattern] = &[
    HostingPattern {
        name: "github",
        project: r"^https?://github\.com/([^/]+)/([^/]+?)/?$",
        raw: "https://github.com/{owner}/{repo}/raw/master/",
        viewer: "https://github.com/{owner}/{repo}/blob/master/",
    },
    HostingPattern {
        name: "gitlab",
        project: r"^https?://gitlab\.com/([^/]+)/([^/]+?)/?$",
        raw: "https://gitlab.com/{owner}/{repo}/-/raw/master/",
        viewer: "https://gitlab.com/{owner}/{repo}/-/blob/master/",
    },
];

static HOSTING_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    HOSTING_PATTERNS
        .iter()
        .map(|pattern| Regex::new(pattern.project).unwrap())
        .collect()
});

/// Resolved URL prefixes that thing-local references are anchored at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseUrls {
    pub asset: String,
    pub viewer: Option<String>,
}

impl BaseUrls {
    pub fn resolve(explicit: Option<&str>, project_url: &str) -> Result<Self, TrackerError> {
        if let Some(base) = explicit.map(str::trim).filter(|base| !base.is_empty()) {
            return Ok(Self {
                asset: with_trailing_slash(base),
                viewer: None,
            });
        }

        for (pattern, re) in HOSTING_PATTERNS.iter().zip(HOSTING_RES.iter()) {
            let Some(caps) = re.captures(project_url.trim()) else {
                continue;
            };
            let owner = &caps[1];
            let repo = &caps[2];
            tracing::debug!(host = pattern.name, owner, repo, "guessed base URL");
            let fill = |template: &str| {
                template
                    .replace("{owner}", owner)
                    .replace("{repo}", repo)
            };
            return Ok(Self {
                asset: fill(pattern.raw),
                viewer: Some(fill(pattern.viewer)),
            });
        }

        Err(TrackerError::BaseUnresolved(project_url.to_string()))
    }

    /// Joins a local reference to the asset base, or to the viewer base for
    /// 3D models when one exists. Non-local references come back unchanged.
    pub fn anchor(&self, reference: &str) -> String {
        if !is_local(reference) {
            return reference.to_string();
        }
        let base = match &self.viewer {
            Some(viewer) if is_model(reference) => viewer,
            _ => &self.asset,
        };
        join(base, reference)
    }

    /// Joins a local reference to the asset base, never the viewer.
    pub fn anchor_asset(&self, reference: &str) -> String {
        if !is_local(reference) {
            return reference.to_string();
        }
        join(&self.asset, reference)
    }
}

fn join(base: &str, reference: &str) -> String {
    let mut path = reference;
    while let Some(rest) = path.strip_prefix("./") {
        path = rest;
    }
    let path = path.trim_start_matches('/');
    format!("{base}{path}")
}

fn with_trailing_slash(base: &str) -> String {
    format!("{}/", base.trim_end_matches('/'))
}

fn is_model(reference: &str) -> bool {
    let path = reference
        .split(['?', '#'])
        .next()
        .unwrap_or(reference)
        .to_ascii_lowercase();
    path.ends_with(MODEL_SUFFIX)
}
