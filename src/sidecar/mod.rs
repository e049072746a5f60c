//! Reading per-image companion metadata files.
//!
//! Each image may have up to five sidecar payloads next to it, keyed by a
//! suffix naming convention: `<image>.description.json`, `.people.json`,
//! `.objects.json`, `.scenes.json` and `.exif.json`. Every payload is read
//! and parsed independently; a missing or corrupt file degrades to empty
//! metadata for that category only and never aborts the others.

pub mod dto;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::config::DEFAULT_LANGUAGE;
use crate::error::{Error, ErrorKind};
use dto::{DescriptionDoc, Detection, ExifDoc, LocalizedText};

pub const DESCRIPTION_SUFFIX: &str = "description.json";
pub const PEOPLE_SUFFIX: &str = "people.json";
pub const OBJECTS_SUFFIX: &str = "objects.json";
pub const SCENES_SUFFIX: &str = "scenes.json";
pub const EXIF_SUFFIX: &str = "exif.json";

/// The five sidecar categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SidecarKind {
    Description,
    People,
    Objects,
    Scenes,
    Exif,
}

impl SidecarKind {
    fn suffix(&self) -> &'static str {
        match self {
            SidecarKind::Description => DESCRIPTION_SUFFIX,
            SidecarKind::People => PEOPLE_SUFFIX,
            SidecarKind::Objects => OBJECTS_SUFFIX,
            SidecarKind::Scenes => SCENES_SUFFIX,
            SidecarKind::Exif => EXIF_SUFFIX,
        }
    }
}

/// A non-fatal problem encountered while reading one sidecar category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SidecarIssue {
    /// The payload existed but was not valid JSON of the expected shape.
    Parse { kind: SidecarKind, message: String },
    /// The description document had no text for the requested language;
    /// the default language was used instead.
    PartialLanguage { requested: String },
}

/// Metadata assembled from all sidecar payloads of one image.
///
/// Missing categories come back as empty collections, never as errors.
#[derive(Debug, Clone, Default)]
pub struct ImageSidecar {
    /// Short description in the requested language (after fallback).
    pub short_description: String,
    /// Long description in the requested language (after fallback).
    pub long_description: String,
    /// Short description in the default language, kept for query-time
    /// fallback ranking.
    pub short_description_default: String,
    pub long_description_default: String,
    pub keywords: Vec<String>,
    pub has_nudity: bool,
    pub has_explicit_content: bool,
    pub picture_type: Option<String>,
    pub style_type: Option<String>,
    pub mood: Option<String>,
    pub people: Vec<Detection>,
    pub objects: Vec<Detection>,
    pub scenes: Vec<Detection>,
    pub exif: Option<ExifDoc>,
    pub issues: Vec<SidecarIssue>,
}

impl ImageSidecar {
    /// True when no sidecar payload contributed any data.
    pub fn is_empty(&self) -> bool {
        self.short_description.is_empty()
            && self.long_description.is_empty()
            && self.keywords.is_empty()
            && self.people.is_empty()
            && self.objects.is_empty()
            && self.scenes.is_empty()
            && self.exif.is_none()
    }
}

/// Reads sidecar files for a configured language. Pure read, no side
/// effects beyond debug logging.
#[derive(Debug, Clone)]
pub struct SidecarReader {
    language: String,
}

impl SidecarReader {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Path of one sidecar payload for an image.
    pub fn sidecar_path(image_path: &Path, kind: SidecarKind) -> PathBuf {
        let mut os = image_path.as_os_str().to_os_string();
        os.push(".");
        os.push(kind.suffix());
        PathBuf::from(os)
    }

    /// Read all sidecar payloads for one image.
    ///
    /// Missing payloads (`NotFound`) and parse failures are absorbed
    /// here: they degrade to empty metadata for their category and are
    /// not re-thrown through the indexer.
    pub fn read(&self, image_path: &Path) -> ImageSidecar {
        let mut sidecar = ImageSidecar::default();

        match self.read_payload::<DescriptionDoc>(image_path, SidecarKind::Description) {
            Ok(doc) => self.apply_description(&mut sidecar, doc),
            Err(e) => absorb(e, SidecarKind::Description, &mut sidecar.issues),
        }

        sidecar.people = self.read_detections(image_path, SidecarKind::People, &mut sidecar.issues);
        sidecar.objects =
            self.read_detections(image_path, SidecarKind::Objects, &mut sidecar.issues);
        sidecar.scenes = self.read_detections(image_path, SidecarKind::Scenes, &mut sidecar.issues);

        match self.read_payload::<ExifDoc>(image_path, SidecarKind::Exif) {
            Ok(doc) => sidecar.exif = Some(doc),
            Err(e) => absorb(e, SidecarKind::Exif, &mut sidecar.issues),
        }

        sidecar
    }

    fn apply_description(&self, sidecar: &mut ImageSidecar, doc: DescriptionDoc) {
        sidecar.has_nudity = doc.has_nudity;
        sidecar.has_explicit_content = doc.has_explicit_content;
        sidecar.picture_type = doc.picture_type;
        sidecar.style_type = doc.style_type;
        sidecar.mood = doc.mood;

        if let Some(text) = default_text(&doc.languages) {
            sidecar.short_description_default = text.short.clone();
            sidecar.long_description_default = text.long.clone();
        }

        let requested = doc.languages.get(&self.language);
        match requested {
            Some(text) => {
                sidecar.short_description = text.short.clone();
                sidecar.long_description = text.long.clone();
                sidecar.keywords = text.keywords.clone();
            }
            None => {
                // Fall back to the default language rather than dropping
                // the description entirely.
                if let Some(text) = default_text(&doc.languages) {
                    sidecar.short_description = text.short.clone();
                    sidecar.long_description = text.long.clone();
                    sidecar.keywords = text.keywords.clone();
                }
                if !doc.languages.is_empty() && self.language != DEFAULT_LANGUAGE {
                    sidecar.issues.push(SidecarIssue::PartialLanguage {
                        requested: self.language.clone(),
                    });
                }
            }
        }
    }

    fn read_detections(
        &self,
        image_path: &Path,
        kind: SidecarKind,
        issues: &mut Vec<SidecarIssue>,
    ) -> Vec<Detection> {
        match self.read_payload::<Vec<Detection>>(image_path, kind) {
            Ok(detections) => detections,
            Err(e) => {
                absorb(e, kind, issues);
                Vec::new()
            }
        }
    }

    /// Read and parse one payload. A missing file is `Error::NotFound`,
    /// which is normal for images the detectors have not seen yet.
    fn read_payload<T: serde::de::DeserializeOwned>(
        &self,
        image_path: &Path,
        kind: SidecarKind,
    ) -> crate::error::Result<T> {
        let path = Self::sidecar_path(image_path, kind);

        let content = std::fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::NotFound(path.display().to_string())
            } else {
                Error::Parse {
                    path: path.clone(),
                    message: e.to_string(),
                }
            }
        })?;

        serde_json::from_str(&content).map_err(|e| {
            tracing::debug!("Malformed sidecar {}: {}", path.display(), e);
            Error::Parse {
                path,
                message: e.to_string(),
            }
        })
    }
}

/// Translate a payload error into "empty metadata for this category".
/// Only parse failures are recorded; a missing file is not an issue.
fn absorb(error: Error, kind: SidecarKind, issues: &mut Vec<SidecarIssue>) {
    if error.kind() != ErrorKind::NotFound {
        issues.push(SidecarIssue::Parse {
            kind,
            message: error.to_string(),
        });
    }
}

fn default_text(languages: &HashMap<String, LocalizedText>) -> Option<&LocalizedText> {
    languages.get(DEFAULT_LANGUAGE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::tempdir;

    fn write_sidecar(image: &Path, kind: SidecarKind, content: &str) {
        fs::write(SidecarReader::sidecar_path(image, kind), content).unwrap();
    }

    #[test]
    fn missing_sidecars_give_empty_metadata() {
        let dir = tempdir().unwrap();
        let image = dir.path().join("photo.jpg");
        fs::write(&image, b"jpeg").unwrap();

        let reader = SidecarReader::new("en");
        let sidecar = reader.read(&image);

        assert!(sidecar.is_empty());
        assert!(sidecar.issues.is_empty());
        assert!(!sidecar.has_nudity);
    }

    #[test]
    fn corrupt_category_does_not_abort_others() {
        let dir = tempdir().unwrap();
        let image = dir.path().join("photo.jpg");
        fs::write(&image, b"jpeg").unwrap();

        write_sidecar(&image, SidecarKind::People, "{ not json ]");
        write_sidecar(
            &image,
            SidecarKind::Scenes,
            &json!([{"label": "beach", "confidence": 0.8}]).to_string(),
        );

        let reader = SidecarReader::new("en");
        let sidecar = reader.read(&image);

        assert!(sidecar.people.is_empty());
        assert_eq!(sidecar.scenes.len(), 1);
        assert_eq!(sidecar.scenes[0].label, "beach");
        assert_eq!(sidecar.issues.len(), 1);
        assert!(matches!(
            sidecar.issues[0],
            SidecarIssue::Parse {
                kind: SidecarKind::People,
                ..
            }
        ));
    }

    #[test]
    fn falls_back_to_default_language() {
        let dir = tempdir().unwrap();
        let image = dir.path().join("photo.jpg");
        fs::write(&image, b"jpeg").unwrap();

        write_sidecar(
            &image,
            SidecarKind::Description,
            &json!({
                "languages": {
                    "en": {"short": "A dog", "long": "A dog in the park.", "keywords": ["dog"]}
                }
            })
            .to_string(),
        );

        let reader = SidecarReader::new("de");
        let sidecar = reader.read(&image);

        assert_eq!(sidecar.short_description, "A dog");
        assert_eq!(sidecar.keywords, vec!["dog".to_string()]);
        assert!(sidecar
            .issues
            .iter()
            .any(|i| matches!(i, SidecarIssue::PartialLanguage { requested } if requested == "de")));
    }

    #[test]
    fn requested_language_wins_over_default() {
        let dir = tempdir().unwrap();
        let image = dir.path().join("photo.jpg");
        fs::write(&image, b"jpeg").unwrap();

        write_sidecar(
            &image,
            SidecarKind::Description,
            &json!({
                "languages": {
                    "en": {"short": "A dog", "long": "", "keywords": ["dog"]},
                    "de": {"short": "Ein Hund", "long": "", "keywords": ["hund"]}
                }
            })
            .to_string(),
        );

        let reader = SidecarReader::new("de");
        let sidecar = reader.read(&image);

        assert_eq!(sidecar.short_description, "Ein Hund");
        assert_eq!(sidecar.keywords, vec!["hund".to_string()]);
        // The default-language columns are still captured for fallback.
        assert_eq!(sidecar.short_description_default, "A dog");
        assert!(sidecar.issues.is_empty());
    }

    #[test]
    fn reads_exif_payload() {
        let dir = tempdir().unwrap();
        let image = dir.path().join("photo.jpg");
        fs::write(&image, b"jpeg").unwrap();

        write_sidecar(
            &image,
            SidecarKind::Exif,
            &json!({
                "cameraMake": "Canon",
                "cameraModel": "EOS R5",
                "iso": 100,
                "fNumber": 2.8,
                "gpsLatitude": 48.8584,
                "gpsLongitude": 2.2945
            })
            .to_string(),
        );

        let reader = SidecarReader::new("en");
        let sidecar = reader.read(&image);

        let exif = sidecar.exif.unwrap();
        assert_eq!(exif.camera_make.as_deref(), Some("Canon"));
        assert_eq!(exif.iso, Some(100));
        assert_eq!(exif.gps_latitude, Some(48.8584));
    }

    #[test]
    fn sidecar_path_appends_suffix() {
        let path = SidecarReader::sidecar_path(Path::new("/a/b.jpg"), SidecarKind::Objects);
        assert_eq!(path, PathBuf::from("/a/b.jpg.objects.json"));
    }
}
