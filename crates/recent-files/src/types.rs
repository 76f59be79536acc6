//! Core types for the recent files registry

use crate::error::RecentFilesError;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

/// Name used when a document is opened without a usable display name
pub const DEFAULT_DISPLAY_NAME: &str = "Unknown Document";

/// Page rotation, restricted to quarter turns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u16")]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Normalise any multiple of 90 degrees (negative included) into a rotation
    pub fn from_degrees(degrees: i64) -> Option<Self> {
        if degrees % 90 != 0 {
            return None;
        }
        match degrees.rem_euclid(360) {
            0 => Some(Rotation::Deg0),
            90 => Some(Rotation::Deg90),
            180 => Some(Rotation::Deg180),
            270 => Some(Rotation::Deg270),
            _ => None,
        }
    }

    pub fn degrees(self) -> u16 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }
}

impl TryFrom<i64> for Rotation {
    type Error = RecentFilesError;

    fn try_from(degrees: i64) -> Result<Self, Self::Error> {
        Rotation::from_degrees(degrees).ok_or_else(|| {
            RecentFilesError::InvalidViewState(format!("rotation of {} degrees", degrees))
        })
    }
}

impl From<Rotation> for u16 {
    fn from(rotation: Rotation) -> Self {
        rotation.degrees()
    }
}

/// Where the reader was in a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ViewState {
    /// 1-based page number
    pub page: u32,
    pub zoom_factor: f64,
    pub scroll_offset_x: f64,
    pub scroll_offset_y: f64,
    #[serde(rename = "rotationDegrees")]
    pub rotation: Rotation,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            page: 1,
            zoom_factor: 1.0,
            scroll_offset_x: 0.0,
            scroll_offset_y: 0.0,
            rotation: Rotation::Deg0,
        }
    }
}

impl ViewState {
    /// Merge a patch field by field. Fields the patch leaves unset are kept,
    /// and out-of-range values are ignored.
    pub fn apply(&mut self, patch: &ViewStatePatch) {
        if let Some(page) = patch.page {
            if page >= 1 {
                self.page = page;
            } else {
                debug!(page, "Ignoring page outside the document");
            }
        }
        if let Some(zoom) = patch.zoom_factor {
            if zoom.is_finite() && zoom > 0.0 {
                self.zoom_factor = zoom;
            } else {
                debug!(zoom, "Ignoring non-positive zoom factor");
            }
        }
        if let Some(x) = patch.scroll_offset_x {
            if x.is_finite() {
                self.scroll_offset_x = x;
            }
        }
        if let Some(y) = patch.scroll_offset_y {
            if y.is_finite() {
                self.scroll_offset_y = y;
            }
        }
        if let Some(rotation) = patch.rotation {
            self.rotation = rotation;
        }
    }
}

/// Partial view state update; `None` fields leave the current value alone
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewStatePatch {
    pub page: Option<u32>,
    pub zoom_factor: Option<f64>,
    pub scroll_offset_x: Option<f64>,
    pub scroll_offset_y: Option<f64>,
    pub rotation: Option<Rotation>,
}

impl ViewStatePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    pub fn zoom(mut self, zoom_factor: f64) -> Self {
        self.zoom_factor = Some(zoom_factor);
        self
    }

    pub fn scroll(mut self, x: f64, y: f64) -> Self {
        self.scroll_offset_x = Some(x);
        self.scroll_offset_y = Some(y);
        self
    }

    pub fn rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = Some(rotation);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Metadata for one tracked document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    pub fingerprint: String,
    pub display_name: String,
    /// URL or path used to re-fetch the document when it is not cached
    pub source_locator: String,
    /// Epoch milliseconds of the last open or view state change
    pub last_opened_at: i64,
    #[serde(default, deserialize_with = "view_state_or_default")]
    pub view_state: ViewState,
    /// Encoded preview image supplied by a renderer
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub has_unsaved_edits: bool,
    /// Hint only; the content store decides whether a blob exists
    #[serde(default)]
    pub is_content_cached: bool,
    #[serde(default)]
    pub cached_byte_size: u64,
}

impl DocumentRecord {
    pub fn new(
        fingerprint: impl Into<String>,
        display_name: &str,
        source_locator: impl Into<String>,
        opened_at: i64,
    ) -> Self {
        Self {
            fingerprint: fingerprint.into(),
            display_name: display_name_or_default(display_name),
            source_locator: source_locator.into(),
            last_opened_at: opened_at,
            view_state: ViewState::default(),
            thumbnail: None,
            has_unsaved_edits: false,
            is_content_cached: false,
            cached_byte_size: 0,
        }
    }

    pub fn cache_status(&self) -> CacheStatus {
        if self.is_content_cached {
            CacheStatus::Claimed {
                byte_size: self.cached_byte_size,
            }
        } else {
            CacheStatus::NotCached
        }
    }
}

/// A stored view state that no longer parses resets to the defaults rather
/// than failing the whole record.
fn view_state_or_default<'de, D>(deserializer: D) -> Result<ViewState, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_else(|e| {
        debug!(error = %e, "Unreadable view state, using defaults");
        ViewState::default()
    }))
}

/// What the metadata believes about a document's cached content.
///
/// `Claimed` must be confirmed against the content store before use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    NotCached,
    Claimed { byte_size: u64 },
}

pub(crate) fn display_name_or_default(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        DEFAULT_DISPLAY_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Arguments for recording that a document was opened
#[derive(Debug, Clone)]
pub struct OpenedDocument {
    pub fingerprint: String,
    pub display_name: String,
    pub source_locator: String,
    pub view_state: ViewStatePatch,
    /// Raw document bytes to cache for instant reopen
    pub content: Option<Vec<u8>>,
}

impl OpenedDocument {
    pub fn new(
        fingerprint: impl Into<String>,
        display_name: impl Into<String>,
        source_locator: impl Into<String>,
    ) -> Self {
        Self {
            fingerprint: fingerprint.into(),
            display_name: display_name.into(),
            source_locator: source_locator.into(),
            view_state: ViewStatePatch::default(),
            content: None,
        }
    }

    pub fn with_view_state(mut self, patch: ViewStatePatch) -> Self {
        self.view_state = patch;
        self
    }

    pub fn with_content(mut self, content: Vec<u8>) -> Self {
        self.content = Some(content);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_normalises_quarter_turns() {
        assert_eq!(Rotation::from_degrees(0), Some(Rotation::Deg0));
        assert_eq!(Rotation::from_degrees(450), Some(Rotation::Deg90));
        assert_eq!(Rotation::from_degrees(-90), Some(Rotation::Deg270));
        assert_eq!(Rotation::from_degrees(45), None);
    }

    #[test]
    fn test_patch_merges_field_by_field() {
        let mut state = ViewState {
            page: 1,
            zoom_factor: 2.0,
            ..ViewState::default()
        };
        state.apply(&ViewStatePatch::new().page(5));

        assert_eq!(state.page, 5);
        assert_eq!(state.zoom_factor, 2.0);
    }

    #[test]
    fn test_patch_ignores_invalid_values() {
        let mut state = ViewState::default();
        state.apply(&ViewStatePatch::new().page(0).zoom(-1.0).scroll(f64::NAN, 12.0));

        assert_eq!(state.page, 1);
        assert_eq!(state.zoom_factor, 1.0);
        assert_eq!(state.scroll_offset_x, 0.0);
        assert_eq!(state.scroll_offset_y, 12.0);
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let mut record = DocumentRecord::new("fp", "report.pdf", "file:///tmp/report.pdf", 42);
        record.view_state.rotation = Rotation::Deg180;

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["displayName"], "report.pdf");
        assert_eq!(json["lastOpenedAt"], 42);
        assert_eq!(json["viewState"]["rotationDegrees"], 180);
        assert_eq!(json["isContentCached"], false);
    }

    #[test]
    fn test_record_tolerates_missing_optional_fields() {
        let json = r#"{
            "fingerprint": "fp",
            "displayName": "a.pdf",
            "sourceLocator": "https://example.com/a.pdf",
            "lastOpenedAt": 7,
            "viewState": { "page": 3 }
        }"#;

        let record: DocumentRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.view_state.page, 3);
        assert_eq!(record.view_state.zoom_factor, 1.0);
        assert!(record.thumbnail.is_none());
        assert_eq!(record.cache_status(), CacheStatus::NotCached);
    }

    #[test]
    fn test_invalid_rotation_is_rejected() {
        let json = r#"{ "page": 1, "rotationDegrees": 45 }"#;
        assert!(serde_json::from_str::<ViewState>(json).is_err());
    }

    #[test]
    fn test_bad_view_state_falls_back_to_defaults() {
        let json = r#"{
            "fingerprint": "fp",
            "displayName": "a.pdf",
            "sourceLocator": "/a.pdf",
            "lastOpenedAt": 7,
            "viewState": { "page": -3, "rotationDegrees": 45 },
            "isContentCached": true
        }"#;

        let record: DocumentRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.view_state, ViewState::default());
        assert!(record.is_content_cached);
    }

    #[test]
    fn test_blank_name_uses_placeholder() {
        let record = DocumentRecord::new("fp", "   ", "x", 0);
        assert_eq!(record.display_name, DEFAULT_DISPLAY_NAME);
    }
}
