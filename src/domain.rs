use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::TrackerError;

/// Relationship type emitted for links mined from a README.
pub const RELATIONSHIP_REFERENCE: &str = "reference";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ThingId(String);

impl ThingId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ThingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ThingId {
    type Err = TrackerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let is_valid = !trimmed.is_empty()
            && trimmed == value
            && trimmed != "."
            && trimmed != ".."
            && !trimmed.contains(['/', '\\']);
        if !is_valid {
            return Err(TrackerError::InvalidThingId(value.to_string()));
        }
        Ok(Self(value.to_string()))
    }
}

impl TryFrom<String> for ThingId {
    type Error = TrackerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ThingId> for String {
    fn from(value: ThingId) -> Self {
        value.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BomEntry {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mimetype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BomEntry {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            mimetype: None,
            thumbnail_url: None,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    pub step: u32,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// One fabrication project as stored in the tracker.
///
/// Fields the pipeline does not interpret ride along in `extra`, so replacing
/// a tracker entry with an incoming thing keeps exactly what the input said.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thing {
    pub id: ThingId,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub licenses: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bill_of_materials: Option<Vec<BomEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<Vec<Instruction>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationships: Option<Vec<Relationship>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_urls: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Thing {
    pub fn new(id: ThingId, url: impl Into<String>) -> Self {
        Self {
            id,
            url: url.into(),
            description: None,
            licenses: None,
            bill_of_materials: None,
            instructions: None,
            relationships: None,
            thumbnail_urls: None,
            updated: None,
            extra: Map::new(),
        }
    }

    /// Constraint violations beyond what deserialization already enforces.
    pub fn validate(&self) -> Vec<String> {
        let mut violations = Vec::new();
        if self.url.trim().is_empty() {
            violations.push("url: must not be empty".to_string());
        }
        for (i, entry) in self.bill_of_materials.iter().flatten().enumerate() {
            if entry.url.trim().is_empty() {
                violations.push(format!("billOfMaterials[{i}].url: must not be empty"));
            }
        }
        for (i, thumb) in self.thumbnail_urls.iter().flatten().enumerate() {
            if thumb.trim().is_empty() {
                violations.push(format!("thumbnailUrls[{i}]: must not be empty"));
            }
        }
        for (i, rel) in self.relationships.iter().flatten().enumerate() {
            if rel.url.trim().is_empty() {
                violations.push(format!("relationships[{i}].url: must not be empty"));
            }
        }
        for (i, instruction) in self.instructions.iter().flatten().enumerate() {
            if instruction.step == 0 {
                violations.push(format!("instructions[{i}].step: must be at least 1"));
            }
        }
        violations
    }
}

/// The persisted index of all known things.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tracker {
    #[serde(default)]
    pub things: Vec<Thing>,
    #[serde(default)]
    pub things_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Tracker {
    fn default() -> Self {
        Self {
            things: Vec::new(),
            things_count: 0,
            updated: None,
            extra: Map::new(),
        }
    }
}

impl Tracker {
    pub fn validate(&self) -> Vec<String> {
        let mut violations = Vec::new();
        let mut seen = HashSet::new();
        for (i, thing) in self.things.iter().enumerate() {
            if !seen.insert(thing.id.as_str()) {
                violations.push(format!("things[{i}].id: duplicate thing id {}", thing.id));
            }
            violations.extend(
                thing
                    .validate()
                    .into_iter()
                    .map(|violation| format!("things[{i}].{violation}")),
            );
        }
        violations
    }

    pub fn find(&self, id: &ThingId) -> Option<&Thing> {
        self.things.iter().find(|thing| &thing.id == id)
    }
}
