//! Executes a compiled query and materializes result rows.
//!
//! Rows stream out of SQLite, category lists are attached via secondary
//! keyed queries, and when a geo filter is present the exact haversine
//! distance is applied here after the SQL bounding-box pre-filter.

use rusqlite::Row;

use super::builder::CompiledQuery;
use super::geo::haversine_m;
use crate::db::Database;
use crate::error::Result;
use crate::sidecar::dto::Detection;
use crate::sidecar::SidecarReader;

/// EXIF projection attached to each result. All fields optional; images
/// without an EXIF sidecar carry an empty summary.
#[derive(Debug, Clone, Default)]
pub struct ExifSummary {
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
    pub gps_latitude: Option<f64>,
    pub gps_longitude: Option<f64>,
    pub gps_altitude: Option<f64>,
    pub exposure_time: Option<f64>,
    pub f_number: Option<f64>,
    pub iso: Option<i64>,
    pub focal_length: Option<f64>,
    pub taken_at: Option<String>,
}

/// Full detection records re-read from sidecars on request; confidences
/// and bounding boxes are not denormalized into the index.
#[derive(Debug, Clone, Default)]
pub struct SidecarDetails {
    pub people: Vec<Detection>,
    pub objects: Vec<Detection>,
    pub scenes: Vec<Detection>,
}

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub id: i64,
    pub path: String,
    pub file_size: i64,
    pub modified_at: Option<String>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub short_description: Option<String>,
    pub long_description: Option<String>,
    pub has_nudity: bool,
    pub has_explicit_content: bool,
    pub picture_type: Option<String>,
    pub style_type: Option<String>,
    pub mood: Option<String>,
    pub keywords: Vec<String>,
    pub people: Vec<String>,
    pub objects: Vec<String>,
    pub scenes: Vec<String>,
    pub exif: ExifSummary,
    /// Distance from the geo filter center, set only for geo queries.
    pub distance_m: Option<f64>,
    /// Populated by [`attach_sidecar_details`].
    pub details: Option<SidecarDetails>,
}

/// Execute a compiled query and return hydrated results in the requested
/// order. Zero matches yields an empty vec, not an error.
pub fn execute(db: &Database, compiled: &CompiledQuery) -> Result<Vec<SearchResult>> {
    db.assert_complete()?;

    let mut stmt = db.conn().prepare(&compiled.sql)?;
    let param_refs: Vec<&dyn rusqlite::types::ToSql> =
        compiled.params.iter().map(|p| p.as_ref()).collect();

    let mut results: Vec<SearchResult> = stmt
        .query_map(&param_refs[..], map_row)?
        .filter_map(|r| r.ok())
        .collect();

    if let Some(geo) = &compiled.geo {
        results.retain_mut(|result| {
            match (result.exif.gps_latitude, result.exif.gps_longitude) {
                (Some(lat), Some(lon)) => {
                    let distance = haversine_m(geo.latitude, geo.longitude, lat, lon);
                    result.distance_m = Some(distance);
                    distance <= geo.max_distance_m
                }
                _ => false,
            }
        });
        if let Some(limit) = compiled.limit {
            results.truncate(limit);
        }
    }

    for result in &mut results {
        result.keywords = tag_values(db, "image_keywords", "keyword", result.id)?;
        result.people = tag_values(db, "image_people", "person", result.id)?;
        result.objects = tag_values(db, "image_objects", "object", result.id)?;
        result.scenes = tag_values(db, "image_scenes", "scene", result.id)?;
    }

    Ok(results)
}

/// Re-read sidecars for fields not denormalized into the index
/// (detection confidences, bounding boxes).
pub fn attach_sidecar_details(results: &mut [SearchResult], reader: &SidecarReader) {
    for result in results.iter_mut() {
        let sidecar = reader.read(std::path::Path::new(&result.path));
        result.details = Some(SidecarDetails {
            people: sidecar.people,
            objects: sidecar.objects,
            scenes: sidecar.scenes,
        });
    }
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<SearchResult> {
    Ok(SearchResult {
        id: row.get(0)?,
        path: row.get(1)?,
        file_size: row.get(2)?,
        modified_at: row.get(3)?,
        width: row.get(4)?,
        height: row.get(5)?,
        short_description: row.get(6)?,
        long_description: row.get(7)?,
        has_nudity: row.get(8)?,
        has_explicit_content: row.get(9)?,
        picture_type: row.get(10)?,
        style_type: row.get(11)?,
        mood: row.get(12)?,
        keywords: Vec::new(),
        people: Vec::new(),
        objects: Vec::new(),
        scenes: Vec::new(),
        exif: ExifSummary {
            camera_make: row.get(13)?,
            camera_model: row.get(14)?,
            gps_latitude: row.get(15)?,
            gps_longitude: row.get(16)?,
            gps_altitude: row.get(17)?,
            exposure_time: row.get(18)?,
            f_number: row.get(19)?,
            iso: row.get(20)?,
            focal_length: row.get(21)?,
            taken_at: row.get(22)?,
        },
        distance_m: None,
        details: None,
    })
}

fn tag_values(db: &Database, table: &str, column: &str, image_id: i64) -> Result<Vec<String>> {
    let mut stmt = db.conn().prepare_cached(&format!(
        "SELECT {column} FROM {table} WHERE image_id = ? ORDER BY {column}"
    ))?;
    let values = stmt
        .query_map([image_id], |row| row.get(0))?
        .filter_map(|r| r.ok())
        .collect();
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::{Fingerprint, NewExif, NewImage};
    use crate::query::{compile, GeoFilter, QuerySpec, RangeBound, SortOrder};
    use tempfile::tempdir;

    fn image(path: &str) -> NewImage {
        NewImage {
            path: path.to_string(),
            file_size: 1000,
            ..Default::default()
        }
    }

    fn seeded_db(images: Vec<NewImage>) -> (tempfile::TempDir, Database) {
        let dir = tempdir().unwrap();
        let mut db = Database::open(&dir.path().join("index.db")).unwrap();
        db.initialize().unwrap();
        db.begin_build().unwrap();
        let count = images.len();
        db.insert_batch(&images).unwrap();
        db.finalize_build(&Fingerprint::compute(&Config::default()), count)
            .unwrap();
        (dir, db)
    }

    #[test]
    fn keyword_wildcard_matches_and_misses() {
        let mut beach = image("/photos/beach.jpg");
        beach.keywords = vec!["beach".to_string(), "sunset".to_string()];
        let (_dir, db) = seeded_db(vec![beach]);

        let spec = QuerySpec {
            keywords: vec!["sun*".to_string()],
            ..Default::default()
        };
        let results = execute(&db, &compile(&spec).unwrap()).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].path, "/photos/beach.jpg");
        assert_eq!(results[0].keywords, vec!["beach", "sunset"]);

        let spec = QuerySpec {
            keywords: vec!["mountain".to_string()],
            ..Default::default()
        };
        let results = execute(&db, &compile(&spec).unwrap()).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn iso_range_includes_and_excludes() {
        let mut img = image("/photos/a.jpg");
        img.exif = Some(NewExif {
            iso: Some(100),
            ..Default::default()
        });
        let (_dir, db) = seeded_db(vec![img]);

        let spec = QuerySpec {
            iso: Some(RangeBound::between(50, 200)),
            ..Default::default()
        };
        assert_eq!(execute(&db, &compile(&spec).unwrap()).unwrap().len(), 1);

        let spec = QuerySpec {
            iso: Some(RangeBound::between(500, 1000)),
            ..Default::default()
        };
        assert!(execute(&db, &compile(&spec).unwrap()).unwrap().is_empty());
    }

    #[test]
    fn no_nudity_flag_filters_flagged_images() {
        let mut flagged = image("/photos/flagged.jpg");
        flagged.has_nudity = true;
        let clean = image("/photos/clean.jpg");
        let (_dir, db) = seeded_db(vec![flagged, clean]);

        let spec = QuerySpec {
            no_nudity: true,
            ..Default::default()
        };
        let results = execute(&db, &compile(&spec).unwrap()).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].path, "/photos/clean.jpg");
    }

    #[test]
    fn geo_filter_never_matches_images_without_gps() {
        let mut located = image("/photos/paris.jpg");
        located.exif = Some(NewExif {
            gps_latitude: Some(48.8584),
            gps_longitude: Some(2.2945),
            ..Default::default()
        });
        let mut unlocated = image("/photos/nowhere.jpg");
        unlocated.exif = Some(NewExif {
            iso: Some(100),
            ..Default::default()
        });
        let no_exif = image("/photos/bare.jpg");
        let (_dir, db) = seeded_db(vec![located, unlocated, no_exif]);

        let spec = QuerySpec {
            geo: Some(GeoFilter {
                latitude: 48.8738,
                longitude: 2.2950,
                max_distance_m: 5000.0,
            }),
            ..Default::default()
        };
        let results = execute(&db, &compile(&spec).unwrap()).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].path, "/photos/paris.jpg");
        assert!(results[0].distance_m.unwrap() < 5000.0);
    }

    #[test]
    fn geo_exact_distance_trims_bounding_box_survivors() {
        // Inside the bounding box of a 1.5km radius but farther than
        // 1.5km away on the great circle (box corner).
        let mut corner = image("/photos/corner.jpg");
        corner.exif = Some(NewExif {
            gps_latitude: Some(48.8584 + 0.0125),
            gps_longitude: Some(2.2945 + 0.019),
            ..Default::default()
        });
        let (_dir, db) = seeded_db(vec![corner]);

        let spec = QuerySpec {
            geo: Some(GeoFilter {
                latitude: 48.8584,
                longitude: 2.2945,
                max_distance_m: 1500.0,
            }),
            ..Default::default()
        };
        let results = execute(&db, &compile(&spec).unwrap()).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn results_default_to_path_ascending() {
        let (_dir, db) = seeded_db(vec![
            image("/photos/c.jpg"),
            image("/photos/a.jpg"),
            image("/photos/b.jpg"),
        ]);

        let results = execute(&db, &compile(&QuerySpec::default()).unwrap()).unwrap();
        let paths: Vec<&str> = results.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["/photos/a.jpg", "/photos/b.jpg", "/photos/c.jpg"]);
    }

    #[test]
    fn file_size_sort_with_path_tiebreak() {
        let mut big = image("/photos/big.jpg");
        big.file_size = 5000;
        let (_dir, db) = seeded_db(vec![image("/photos/a.jpg"), big, image("/photos/b.jpg")]);

        let spec = QuerySpec {
            sort: SortOrder::FileSizeDescending,
            ..Default::default()
        };
        let results = execute(&db, &compile(&spec).unwrap()).unwrap();
        let paths: Vec<&str> = results.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["/photos/big.jpg", "/photos/a.jpg", "/photos/b.jpg"]);
    }

    #[test]
    fn description_fallback_finds_default_language_text() {
        let mut img = image("/photos/dog.jpg");
        // No text in the indexed language; only the default column is set.
        img.short_description_default = "A dog in the park".to_string();
        let (_dir, db) = seeded_db(vec![img]);

        let spec = QuerySpec {
            descriptions: vec!["dog".to_string()],
            ..Default::default()
        };
        let results = execute(&db, &compile(&spec).unwrap()).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(
            results[0].short_description.as_deref(),
            Some("A dog in the park")
        );
    }

    #[test]
    fn incomplete_database_is_rejected() {
        let dir = tempdir().unwrap();
        let db = Database::open(&dir.path().join("index.db")).unwrap();
        db.initialize().unwrap();
        db.begin_build().unwrap();

        let err = execute(&db, &compile(&QuerySpec::default()).unwrap()).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::RebuildInProgress);
    }
}
