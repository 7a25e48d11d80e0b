// Domain models shared by storage, sync, session and the HTTP layer

use std::collections::BTreeMap;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Milliseconds since the Unix epoch, as stored in `updatedAt`.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Last known reading position of one book.
///
/// `position` is an opaque token produced by the renderer and is never parsed here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionRecord {
    #[serde(alias = "cfi")]
    pub position: String,
    #[serde(alias = "updated")]
    pub updated_at: i64,
}

impl PositionRecord {
    pub fn new(position: impl Into<String>, updated_at: i64) -> Self {
        Self {
            position: position.into(),
            updated_at,
        }
    }

    /// Stamp a fresh local update. The timestamp never goes below the previous record for the
    /// same book, so a wall clock stepping backwards cannot make a newer local write lose.
    pub fn stamped(position: impl Into<String>, previous: Option<&PositionRecord>) -> Self {
        let now = now_millis();
        let updated_at = match previous {
            Some(prev) if prev.updated_at >= now => prev.updated_at.saturating_add(1),
            _ => now,
        };
        Self::new(position, updated_at)
    }
}

/// `bookId -> PositionRecord`, at most one record per book.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProgressMap(BTreeMap<String, PositionRecord>);

impl ProgressMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, book_id: &str) -> Option<&PositionRecord> {
        self.0.get(book_id)
    }

    pub fn insert(&mut self, book_id: impl Into<String>, record: PositionRecord) {
        self.0.insert(book_id.into(), record);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PositionRecord)> {
        self.0.iter()
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        serde_json::to_string(self).context("Failed to serialize progress map")
    }

    /// Parse a persisted map, dropping entries that do not conform to the data model.
    /// Fails only when the document is not JSON or not an object.
    pub fn from_json_lenient(raw: &str) -> anyhow::Result<Self> {
        let value: serde_json::Value =
            serde_json::from_str(raw).context("Progress document is not valid JSON")?;
        let serde_json::Value::Object(entries) = value else {
            anyhow::bail!("Progress document is not a JSON object");
        };
        let mut map = ProgressMap::new();
        for (book_id, entry) in entries {
            match serde_json::from_value::<PositionRecord>(entry) {
                Ok(record) => map.insert(book_id, record),
                Err(e) => {
                    tracing::warn!(%book_id, error = %e, "dropping malformed progress entry")
                }
            }
        }
        Ok(map)
    }
}

impl FromIterator<(String, PositionRecord)> for ProgressMap {
    fn from_iter<T: IntoIterator<Item = (String, PositionRecord)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for ProgressMap {
    type Item = (String, PositionRecord);
    type IntoIter = std::collections::btree_map::IntoIter<String, PositionRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontFamily {
    /// Inherit from the browser/OS
    #[default]
    Os,
    Serif,
    Sans,
    Opendyslexic,
    Atkinson,
    Roboto,
    Robotomono,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowMode {
    #[default]
    Paginated,
    Scrolled,
}

/// Display preferences. Single device, overwritten wholesale, never synchronized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub theme: Theme,
    pub font_scale: f64,
    pub line_height: f64,
    pub font_family: FontFamily,
    pub flow: FlowMode,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            theme: Theme::Light,
            font_scale: 1.0,
            line_height: 1.5,
            font_family: FontFamily::Os,
            flow: FlowMode::Paginated,
        }
    }
}

impl Settings {
    pub const FONT_SCALE_RANGE: std::ops::RangeInclusive<f64> = 0.5..=3.0;
    pub const LINE_HEIGHT_RANGE: std::ops::RangeInclusive<f64> = 1.0..=3.0;

    pub fn validate(&self) -> Result<(), String> {
        if !self.font_scale.is_finite() || !Self::FONT_SCALE_RANGE.contains(&self.font_scale) {
            return Err(format!(
                "fontScale must be between {} and {}",
                Self::FONT_SCALE_RANGE.start(),
                Self::FONT_SCALE_RANGE.end()
            ));
        }
        if !self.line_height.is_finite() || !Self::LINE_HEIGHT_RANGE.contains(&self.line_height) {
            return Err(format!(
                "lineHeight must be between {} and {}",
                Self::LINE_HEIGHT_RANGE.start(),
                Self::LINE_HEIGHT_RANGE.end()
            ));
        }
        Ok(())
    }
}

/// An EPUB found in the user's Drive.
#[derive(Debug, Clone, PartialEq)]
pub struct LibraryBook {
    pub id: String,
    pub name: String,
    /// `/`-joined parent folder names, empty for the Drive root
    pub path: String,
    pub modified_time: Option<String>,
    pub size: Option<u64>,
    pub icon_link: Option<String>,
}
