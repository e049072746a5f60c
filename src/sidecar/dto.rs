//! Typed shapes for the sidecar JSON payloads.
//!
//! The detector services write loosely-structured JSON; these DTOs pin the
//! shape down with explicit optional fields. Unknown fields are ignored and
//! missing collections default to empty instead of null.

use serde::Deserialize;
use std::collections::HashMap;

/// `<image>.description.json`: LLM-written text plus content flags and
/// free-text classifications. Text is keyed by language.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescriptionDoc {
    #[serde(default)]
    pub languages: HashMap<String, LocalizedText>,

    #[serde(default)]
    pub has_nudity: bool,

    #[serde(default)]
    pub has_explicit_content: bool,

    #[serde(default)]
    pub picture_type: Option<String>,

    #[serde(default)]
    pub style_type: Option<String>,

    #[serde(default)]
    pub mood: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocalizedText {
    #[serde(default)]
    pub short: String,

    #[serde(default)]
    pub long: String,

    #[serde(default)]
    pub keywords: Vec<String>,
}

/// One entry of a `.people.json` / `.objects.json` / `.scenes.json` array.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    #[serde(alias = "name")]
    pub label: String,

    #[serde(default)]
    pub confidence: Option<f64>,

    #[serde(default)]
    pub bounding_box: Option<BoundingBox>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// `<image>.exif.json`: flat key/value map of camera data.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExifDoc {
    #[serde(default)]
    pub camera_make: Option<String>,

    #[serde(default)]
    pub camera_model: Option<String>,

    #[serde(default)]
    pub width: Option<i64>,

    #[serde(default)]
    pub height: Option<i64>,

    #[serde(default)]
    pub gps_latitude: Option<f64>,

    #[serde(default)]
    pub gps_longitude: Option<f64>,

    #[serde(default)]
    pub gps_altitude: Option<f64>,

    /// Exposure time in seconds.
    #[serde(default)]
    pub exposure_time: Option<f64>,

    #[serde(default)]
    pub f_number: Option<f64>,

    #[serde(default)]
    pub iso: Option<i64>,

    /// Focal length in millimeters.
    #[serde(default)]
    pub focal_length: Option<f64>,

    /// Capture timestamp; EXIF `YYYY:MM:DD HH:MM:SS` and ISO 8601 are both
    /// accepted.
    #[serde(default)]
    pub taken_at: Option<String>,
}
