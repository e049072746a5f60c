//! Multi-criteria search: specification, compilation and execution.

pub mod builder;
pub mod geo;
pub mod hydrate;
pub mod wildcard;

use chrono::NaiveDate;

use crate::error::{Error, Result};

pub use builder::{compile, CompiledQuery};
pub use hydrate::{execute, ExifSummary, SearchResult};

/// An inclusive numeric bound over one field.
///
/// Built from one- or two-element arrays. The convention for a
/// single-element array is uniform across every field: it is an inclusive
/// lower bound (`value >= min`), never an exact match.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeBound<T> {
    pub min: T,
    pub max: Option<T>,
}

impl<T: Copy + PartialOrd> RangeBound<T> {
    pub fn at_least(min: T) -> Self {
        Self { min, max: None }
    }

    pub fn between(min: T, max: T) -> Self {
        Self {
            min,
            max: Some(max),
        }
    }

    /// Interpret a caller-supplied array: `[]` means unconstrained,
    /// `[min]` means at-least, `[min, max]` means between. Extra elements
    /// are ignored.
    pub fn from_slice(values: &[T]) -> Option<Self> {
        match values {
            [] => None,
            [min] => Some(Self::at_least(*min)),
            [min, max, ..] => Some(Self::between(*min, *max)),
        }
    }

    fn is_valid(&self) -> bool {
        match self.max {
            Some(max) => self.min <= max,
            None => true,
        }
    }
}

/// Location filter: all matches lie within `max_distance_m` meters of the
/// center point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoFilter {
    pub latitude: f64,
    pub longitude: f64,
    pub max_distance_m: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    PathAscending,
    PathDescending,
    TakenAtAscending,
    TakenAtDescending,
    FileSizeAscending,
    FileSizeDescending,
}

impl SortOrder {
    /// ORDER BY clause for this sort. Path is always the final tiebreak
    /// so result order is stable.
    pub(crate) fn sql(&self) -> &'static str {
        match self {
            SortOrder::PathAscending => "i.path ASC",
            SortOrder::PathDescending => "i.path DESC",
            SortOrder::TakenAtAscending => "e.taken_at ASC, i.path ASC",
            SortOrder::TakenAtDescending => "e.taken_at DESC, i.path ASC",
            SortOrder::FileSizeAscending => "i.file_size ASC, i.path ASC",
            SortOrder::FileSizeDescending => "i.file_size DESC, i.path ASC",
        }
    }
}

/// A structured, read-only search request.
///
/// Pattern arrays accept `*`/`?` wildcards; patterns within one array are
/// OR-combined, distinct non-empty dimensions are AND-combined. Empty
/// arrays and unset bounds impose no constraint.
#[derive(Debug, Clone, Default)]
pub struct QuerySpec {
    // Category tags
    pub keywords: Vec<String>,
    pub people: Vec<String>,
    pub objects: Vec<String>,
    pub scenes: Vec<String>,

    /// Matched as substrings against the short and long description, with
    /// transparent fallback to the default language.
    pub descriptions: Vec<String>,

    // Categorical image attributes
    pub picture_types: Vec<String>,
    pub style_types: Vec<String>,
    pub moods: Vec<String>,

    // Camera
    pub camera_makes: Vec<String>,
    pub camera_models: Vec<String>,

    // Numeric EXIF / dimension ranges
    pub iso: Option<RangeBound<i64>>,
    pub exposure_time: Option<RangeBound<f64>>,
    pub f_number: Option<RangeBound<f64>>,
    pub focal_length: Option<RangeBound<f64>>,
    pub width: Option<RangeBound<i64>>,
    pub height: Option<RangeBound<i64>>,

    // Capture date range, inclusive on both ends
    pub taken_after: Option<NaiveDate>,
    pub taken_before: Option<NaiveDate>,

    pub geo: Option<GeoFilter>,

    // Content flags; the has/no pair of one dimension is mutually
    // exclusive
    pub has_nudity: bool,
    pub no_nudity: bool,
    pub has_explicit_content: bool,
    pub no_explicit_content: bool,

    pub sort: SortOrder,
    pub limit: Option<usize>,
}

impl QuerySpec {
    /// Reject contradictory or malformed specs before any SQL executes.
    pub fn validate(&self) -> Result<()> {
        if self.has_nudity && self.no_nudity {
            return Err(Error::InvalidSpec(
                "has_nudity and no_nudity are mutually exclusive".to_string(),
            ));
        }
        if self.has_explicit_content && self.no_explicit_content {
            return Err(Error::InvalidSpec(
                "has_explicit_content and no_explicit_content are mutually exclusive".to_string(),
            ));
        }

        if !self.iso.map_or(true, |r| r.is_valid()) {
            return Err(Error::InvalidSpec("iso range has min > max".to_string()));
        }
        if !self.exposure_time.map_or(true, |r| r.is_valid()) {
            return Err(Error::InvalidSpec(
                "exposure_time range has min > max".to_string(),
            ));
        }
        if !self.f_number.map_or(true, |r| r.is_valid()) {
            return Err(Error::InvalidSpec(
                "f_number range has min > max".to_string(),
            ));
        }
        if !self.focal_length.map_or(true, |r| r.is_valid()) {
            return Err(Error::InvalidSpec(
                "focal_length range has min > max".to_string(),
            ));
        }
        if !self.width.map_or(true, |r| r.is_valid()) {
            return Err(Error::InvalidSpec("width range has min > max".to_string()));
        }
        if !self.height.map_or(true, |r| r.is_valid()) {
            return Err(Error::InvalidSpec("height range has min > max".to_string()));
        }

        if let (Some(after), Some(before)) = (self.taken_after, self.taken_before) {
            if after > before {
                return Err(Error::InvalidSpec(
                    "taken_after is later than taken_before".to_string(),
                ));
            }
        }

        if let Some(geo) = &self.geo {
            if !(-90.0..=90.0).contains(&geo.latitude)
                || !(-180.0..=180.0).contains(&geo.longitude)
            {
                return Err(Error::InvalidSpec(format!(
                    "invalid coordinates ({}, {})",
                    geo.latitude, geo.longitude
                )));
            }
            if geo.max_distance_m <= 0.0 {
                return Err(Error::InvalidSpec(
                    "geo distance must be positive".to_string(),
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn empty_spec_is_valid() {
        assert!(QuerySpec::default().validate().is_ok());
    }

    #[test]
    fn contradictory_nudity_flags_are_rejected() {
        let spec = QuerySpec {
            has_nudity: true,
            no_nudity: true,
            ..Default::default()
        };
        assert_eq!(spec.validate().unwrap_err().kind(), ErrorKind::InvalidSpec);
    }

    #[test]
    fn contradictory_explicit_flags_are_rejected() {
        let spec = QuerySpec {
            has_explicit_content: true,
            no_explicit_content: true,
            ..Default::default()
        };
        assert_eq!(spec.validate().unwrap_err().kind(), ErrorKind::InvalidSpec);
    }

    #[test]
    fn inverted_range_is_rejected() {
        let spec = QuerySpec {
            iso: Some(RangeBound::between(800, 100)),
            ..Default::default()
        };
        assert_eq!(spec.validate().unwrap_err().kind(), ErrorKind::InvalidSpec);
    }

    #[test]
    fn invalid_coordinates_are_rejected() {
        let spec = QuerySpec {
            geo: Some(GeoFilter {
                latitude: 95.0,
                longitude: 0.0,
                max_distance_m: 100.0,
            }),
            ..Default::default()
        };
        assert_eq!(spec.validate().unwrap_err().kind(), ErrorKind::InvalidSpec);
    }

    #[test]
    fn range_from_slice_conventions() {
        assert_eq!(RangeBound::<i64>::from_slice(&[]), None);
        assert_eq!(
            RangeBound::from_slice(&[100]),
            Some(RangeBound::at_least(100))
        );
        assert_eq!(
            RangeBound::from_slice(&[50, 200]),
            Some(RangeBound::between(50, 200))
        );
    }
}
