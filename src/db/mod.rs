//! Embedded database: schema management, metadata bookkeeping and the
//! single write path used by the indexer.

mod schema;

pub mod fingerprint;

use rusqlite::Connection;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub use fingerprint::Fingerprint;
pub use schema::{SCHEMA, SCHEMA_VERSION};

// Keys of the internal meta table.
const META_SCHEMA_VERSION: &str = "schema_version";
const META_FINGERPRINT: &str = "fingerprint";
const META_STATE: &str = "state";
const META_BUILT_AT: &str = "built_at";
const META_RECORD_COUNT: &str = "record_count";

/// Build states stored under the `state` meta key. Anything other than
/// `complete` means the data cannot be trusted.
pub const STATE_BUILDING: &str = "building";
pub const STATE_COMPLETE: &str = "complete";

/// A fully parsed image record ready for insertion. Junction values are
/// normalized (lowercased, deduplicated) at insert time.
#[derive(Debug, Clone, Default)]
pub struct NewImage {
    pub path: String,
    pub file_size: i64,
    pub modified_at: Option<String>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub short_description: String,
    pub long_description: String,
    pub short_description_default: String,
    pub long_description_default: String,
    pub has_nudity: bool,
    pub has_explicit_content: bool,
    pub picture_type: Option<String>,
    pub style_type: Option<String>,
    pub mood: Option<String>,
    pub embedded_image: Option<String>,
    pub keywords: Vec<String>,
    pub people: Vec<String>,
    pub objects: Vec<String>,
    pub scenes: Vec<String>,
    pub exif: Option<NewExif>,
}

#[derive(Debug, Clone, Default)]
pub struct NewExif {
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

/// Facts about an existing index, surfaced without touching image rows.
#[derive(Debug, Clone)]
pub struct IndexStatus {
    pub schema_version: Option<i64>,
    pub fingerprint: Option<String>,
    pub state: Option<String>,
    pub built_at: Option<String>,
    pub record_count: i64,
}

pub struct Database {
    conn: Connection,
    path: PathBuf,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    /// Create all tables and indexes. Idempotent, safe on every open.
    /// A failure here is fatal; there is no degraded mode.
    pub fn initialize(&self) -> Result<()> {
        self.conn.execute_batch(SCHEMA).map_err(Error::Schema)?;
        if self.meta_get(META_SCHEMA_VERSION)?.is_none() {
            self.meta_set(META_SCHEMA_VERSION, &SCHEMA_VERSION.to_string())?;
        }
        Ok(())
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // ========================================================================
    // Meta bookkeeping
    // ========================================================================

    pub fn meta_get(&self, key: &str) -> Result<Option<String>> {
        let result = self.conn.query_row(
            "SELECT value FROM meta WHERE key = ?",
            [key],
            |row| row.get::<_, String>(0),
        );
        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn meta_set(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO meta (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            rusqlite::params![key, value],
        )?;
        Ok(())
    }

    pub fn schema_version(&self) -> Result<Option<i64>> {
        Ok(self
            .meta_get(META_SCHEMA_VERSION)?
            .and_then(|v| v.parse().ok()))
    }

    pub fn stored_fingerprint(&self) -> Result<Option<String>> {
        self.meta_get(META_FINGERPRINT)
    }

    pub fn state(&self) -> Result<Option<String>> {
        self.meta_get(META_STATE)
    }

    pub fn built_at(&self) -> Result<Option<String>> {
        self.meta_get(META_BUILT_AT)
    }

    pub fn record_count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM images", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Mark the database as mid-rebuild. Until [`finalize_build`] runs,
    /// freshness checks treat the file as stale.
    ///
    /// [`finalize_build`]: Database::finalize_build
    pub fn begin_build(&self) -> Result<()> {
        self.meta_set(META_STATE, STATE_BUILDING)
    }

    /// Record fingerprint, completion state and build facts. Only called
    /// after every batch committed successfully.
    pub fn finalize_build(&self, fingerprint: &Fingerprint, record_count: usize) -> Result<()> {
        self.meta_set(META_FINGERPRINT, fingerprint.as_str())?;
        self.meta_set(META_BUILT_AT, &chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S").to_string())?;
        self.meta_set(META_RECORD_COUNT, &record_count.to_string())?;
        self.meta_set(META_STATE, STATE_COMPLETE)
    }

    /// Guard used by readers: an index that is missing its completion
    /// marker is either mid-rebuild or a cancelled leftover.
    pub fn assert_complete(&self) -> Result<()> {
        match self.state()?.as_deref() {
            Some(STATE_COMPLETE) => Ok(()),
            Some(STATE_BUILDING) => Err(Error::RebuildInProgress(self.path.clone())),
            _ => Err(Error::DatabaseUnavailable(format!(
                "{} has no completed index",
                self.path.display()
            ))),
        }
    }

    pub fn status(&self) -> Result<IndexStatus> {
        Ok(IndexStatus {
            schema_version: self.schema_version()?,
            fingerprint: self.stored_fingerprint()?,
            state: self.state()?,
            built_at: self.built_at()?,
            record_count: self.record_count()?,
        })
    }

    // ========================================================================
    // Write path (single writer, called only by the indexer)
    // ========================================================================

    /// Insert a batch of images in one transaction.
    pub fn insert_batch(&mut self, images: &[NewImage]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let mut inserted = 0;

        for image in images {
            let exif = image.exif.as_ref();
            // GPS coordinates are stored pair-or-neither; an unpaired
            // value is dropped.
            let (gps_lat, gps_lon) = match exif {
                Some(e) => match (e.gps_latitude, e.gps_longitude) {
                    (Some(lat), Some(lon)) => (Some(lat), Some(lon)),
                    (Some(_), None) | (None, Some(_)) => {
                        tracing::debug!("Dropping unpaired GPS coordinate for {}", image.path);
                        (None, None)
                    }
                    (None, None) => (None, None),
                },
                None => (None, None),
            };

            tx.execute(
                r#"
                INSERT INTO images (
                    path, file_size, modified_at, width, height,
                    short_description, long_description,
                    short_description_default, long_description_default,
                    has_nudity, has_explicit_content,
                    picture_type, style_type, mood, embedded_image
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
                rusqlite::params![
                    image.path,
                    image.file_size,
                    image.modified_at,
                    image.width,
                    image.height,
                    image.short_description,
                    image.long_description,
                    image.short_description_default,
                    image.long_description_default,
                    image.has_nudity,
                    image.has_explicit_content,
                    image.picture_type,
                    image.style_type,
                    image.mood,
                    image.embedded_image,
                ],
            )?;
            let image_id = tx.last_insert_rowid();

            insert_tags(&tx, "INSERT OR IGNORE INTO image_keywords (image_id, keyword) VALUES (?, ?)", image_id, &image.keywords)?;
            insert_tags(&tx, "INSERT OR IGNORE INTO image_people (image_id, person) VALUES (?, ?)", image_id, &image.people)?;
            insert_tags(&tx, "INSERT OR IGNORE INTO image_objects (image_id, object) VALUES (?, ?)", image_id, &image.objects)?;
            insert_tags(&tx, "INSERT OR IGNORE INTO image_scenes (image_id, scene) VALUES (?, ?)", image_id, &image.scenes)?;

            if let Some(e) = exif {
                tx.execute(
                    r#"
                    INSERT INTO exif_metadata (
                        image_id, camera_make, camera_model,
                        gps_latitude, gps_longitude, gps_altitude,
                        exposure_time, f_number, iso, focal_length, taken_at
                    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                    rusqlite::params![
                        image_id,
                        e.camera_make,
                        e.camera_model,
                        gps_lat,
                        gps_lon,
                        e.gps_altitude,
                        e.exposure_time,
                        e.f_number,
                        e.iso,
                        e.focal_length,
                        e.taken_at,
                    ],
                )?;
            }

            inserted += 1;
        }

        tx.commit()?;
        Ok(inserted)
    }
}

/// Tag values are case-insensitive: lowercased and deduplicated per image.
fn insert_tags(
    tx: &rusqlite::Transaction<'_>,
    sql: &str,
    image_id: i64,
    values: &[String],
) -> Result<()> {
    let normalized: BTreeSet<String> = values
        .iter()
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
        .collect();

    let mut stmt = tx.prepare_cached(sql)?;
    for value in normalized {
        stmt.execute(rusqlite::params![image_id, value])?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open_temp() -> (tempfile::TempDir, Database) {
        let dir = tempdir().unwrap();
        let db = Database::open(&dir.path().join("index.db")).unwrap();
        db.initialize().unwrap();
        (dir, db)
    }

    #[test]
    fn initialize_is_idempotent() {
        let (_dir, db) = open_temp();
        db.initialize().unwrap();
        db.initialize().unwrap();
        assert_eq!(db.schema_version().unwrap(), Some(SCHEMA_VERSION));
    }

    #[test]
    fn meta_roundtrip_overwrites() {
        let (_dir, db) = open_temp();
        db.meta_set("state", "building").unwrap();
        db.meta_set("state", "complete").unwrap();
        assert_eq!(db.meta_get("state").unwrap().as_deref(), Some("complete"));
        assert_eq!(db.meta_get("missing").unwrap(), None);
    }

    #[test]
    fn tags_are_lowercased_and_deduplicated() {
        let (_dir, mut db) = open_temp();
        let image = NewImage {
            path: "/photos/a.jpg".to_string(),
            file_size: 10,
            keywords: vec![
                "Beach".to_string(),
                "beach".to_string(),
                "  SUNSET ".to_string(),
                "".to_string(),
            ],
            ..Default::default()
        };
        db.insert_batch(&[image]).unwrap();

        let mut stmt = db
            .conn()
            .prepare("SELECT keyword FROM image_keywords ORDER BY keyword")
            .unwrap();
        let keywords: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();
        assert_eq!(keywords, vec!["beach".to_string(), "sunset".to_string()]);
    }

    #[test]
    fn unpaired_gps_is_dropped() {
        let (_dir, mut db) = open_temp();
        let image = NewImage {
            path: "/photos/a.jpg".to_string(),
            file_size: 10,
            exif: Some(NewExif {
                gps_latitude: Some(48.0),
                gps_longitude: None,
                iso: Some(100),
                ..Default::default()
            }),
            ..Default::default()
        };
        db.insert_batch(&[image]).unwrap();

        let (lat, lon, iso): (Option<f64>, Option<f64>, Option<i64>) = db
            .conn()
            .query_row(
                "SELECT gps_latitude, gps_longitude, iso FROM exif_metadata",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .unwrap();
        assert_eq!(lat, None);
        assert_eq!(lon, None);
        assert_eq!(iso, Some(100));
    }

    #[test]
    fn assert_complete_reports_build_state() {
        let (_dir, db) = open_temp();
        assert_eq!(
            db.assert_complete().unwrap_err().kind(),
            crate::error::ErrorKind::DatabaseUnavailable
        );
        db.begin_build().unwrap();
        assert_eq!(
            db.assert_complete().unwrap_err().kind(),
            crate::error::ErrorKind::RebuildInProgress
        );
        let fingerprint = Fingerprint::compute(&crate::config::Config::default());
        db.finalize_build(&fingerprint, 0).unwrap();
        assert!(db.assert_complete().is_ok());
    }
}
