//! Full database (re)population from the filesystem.
//!
//! A rebuild deletes the database file and repopulates it from scratch:
//! discovery enumerates candidate files, a bounded worker pool parses
//! sidecars in parallel, and all parsed records funnel through a channel
//! into a single writer performing chunked transactional inserts. The
//! fingerprint is only finalized after the last batch commits, so a
//! cancelled or crashed rebuild is detected as stale on the next open.

pub mod discovery;

use base64::Engine;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::time::SystemTime;

use crate::config::Config;
use crate::db::{Database, Fingerprint, NewExif, NewImage};
use crate::error::Result;
use crate::sidecar::SidecarReader;

pub use discovery::discover_images;

/// Rows inserted per transaction. Bounds both transaction size and how
/// much parsed data is ever held in memory.
const BATCH_SIZE: usize = 200;

/// Parsed records in flight between the worker pool and the writer.
const CHANNEL_DEPTH: usize = 512;

/// One file that could not be indexed. Recorded, never fatal.
#[derive(Debug, Clone)]
pub struct IndexFailure {
    pub path: PathBuf,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct RebuildReport {
    /// Successfully indexed records.
    pub indexed: usize,
    /// Per-file failures; the rebuild completed despite them.
    pub failures: Vec<IndexFailure>,
    /// True when the cancel flag stopped the rebuild. The database is
    /// left unfinalized and will be rebuilt on the next freshness check.
    pub cancelled: bool,
}

#[derive(Debug, Clone)]
pub enum RebuildProgress {
    Started { total_files: usize },
    Indexing { indexed: usize, total: usize },
    Completed { indexed: usize, failed: usize },
    Cancelled { indexed: usize },
}

enum Parsed {
    Record(Box<NewImage>),
    Failed(IndexFailure),
}

pub struct Indexer {
    config: Config,
}

impl Indexer {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Rebuild the database from the configured roots.
    ///
    /// The cancel flag is honored between batches; per-file errors are
    /// collected into the report instead of aborting the run.
    pub fn rebuild(
        &self,
        cancel: &AtomicBool,
        progress_tx: Option<mpsc::Sender<RebuildProgress>>,
    ) -> Result<RebuildReport> {
        remove_database_files(&self.config.db_path)?;

        let mut db = Database::open(&self.config.db_path)?;
        db.initialize()?;
        db.begin_build()?;

        let mut paths = Vec::new();
        for root in &self.config.roots {
            paths.extend(discovery::discover_images(
                root,
                &self.config.image_extensions,
                self.config.recursive,
                &self.config.path_filters,
            )?);
        }
        paths.sort();
        paths.dedup();

        let total = paths.len();
        tracing::info!("Rebuilding index with {} candidate files", total);
        if let Some(ref tx) = progress_tx {
            let _ = tx.send(RebuildProgress::Started { total_files: total });
        }

        let reader = SidecarReader::new(self.config.language.clone());

        let config = &self.config;
        let reader_ref = &reader;
        let paths_ref = &paths;

        std::thread::scope(|scope| -> Result<RebuildReport> {
            // The receiver lives inside the scope so that an early return
            // drops it and unblocks workers before the scope joins them.
            let (tx, rx) = mpsc::sync_channel::<Parsed>(CHANNEL_DEPTH);

            // Workers parse sidecars in parallel; all writes go through
            // the single writer below.
            scope.spawn(move || {
                paths_ref.par_iter().for_each_with(tx, |tx, path| {
                    if cancel.load(Ordering::Relaxed) {
                        return;
                    }
                    let _ = tx.send(parse_image(config, reader_ref, path));
                });
            });

            let mut indexed = 0usize;
            let mut failures: Vec<IndexFailure> = Vec::new();
            let mut batch: Vec<NewImage> = Vec::with_capacity(BATCH_SIZE);
            let mut cancelled = false;

            loop {
                match rx.recv() {
                    Ok(Parsed::Record(image)) => {
                        batch.push(*image);
                        if batch.len() >= BATCH_SIZE {
                            indexed += db.insert_batch(&batch)?;
                            batch.clear();
                            if let Some(ref tx) = progress_tx {
                                let _ = tx.send(RebuildProgress::Indexing { indexed, total });
                            }
                            if cancel.load(Ordering::Relaxed) {
                                cancelled = true;
                                break;
                            }
                        }
                    }
                    Ok(Parsed::Failed(failure)) => {
                        tracing::warn!(
                            "Failed to index {}: {}",
                            failure.path.display(),
                            failure.message
                        );
                        failures.push(failure);
                    }
                    Err(_) => break, // workers finished
                }
            }

            if cancel.load(Ordering::Relaxed) {
                cancelled = true;
            }

            if cancelled {
                // Leave the fingerprint unfinalized; the partial data is
                // never trusted.
                tracing::info!("Rebuild cancelled after {} records", indexed);
                if let Some(ref tx) = progress_tx {
                    let _ = tx.send(RebuildProgress::Cancelled { indexed });
                }
                return Ok(RebuildReport {
                    indexed,
                    failures,
                    cancelled: true,
                });
            }

            if !batch.is_empty() {
                indexed += db.insert_batch(&batch)?;
            }
            db.finalize_build(&Fingerprint::compute(config), indexed)?;

            tracing::info!(
                "Rebuild complete: {} indexed, {} failed",
                indexed,
                failures.len()
            );
            if let Some(ref tx) = progress_tx {
                let _ = tx.send(RebuildProgress::Completed {
                    indexed,
                    failed: failures.len(),
                });
            }

            Ok(RebuildReport {
                indexed,
                failures,
                cancelled: false,
            })
        })
    }
}

/// Delete the database file and SQLite's journal companions.
fn remove_database_files(db_path: &Path) -> Result<()> {
    for suffix in ["", "-wal", "-shm"] {
        let mut os = db_path.as_os_str().to_os_string();
        os.push(suffix);
        let path = PathBuf::from(os);
        match std::fs::remove_file(&path) {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

fn parse_image(config: &Config, reader: &SidecarReader, path: &Path) -> Parsed {
    match parse_image_record(config, reader, path) {
        Ok(image) => Parsed::Record(Box::new(image)),
        Err(e) => Parsed::Failed(IndexFailure {
            path: path.to_path_buf(),
            message: e.to_string(),
        }),
    }
}

fn parse_image_record(config: &Config, reader: &SidecarReader, path: &Path) -> Result<NewImage> {
    let file_meta = std::fs::metadata(path)?;
    let modified_at = file_meta.modified().ok().map(format_timestamp);

    let sidecar = reader.read(path);

    let embedded_image = if config.embed_images {
        embed_image(path, file_meta.len(), config.max_embed_bytes)?
    } else {
        None
    };

    let (width, height) = sidecar
        .exif
        .as_ref()
        .map(|e| (e.width, e.height))
        .unwrap_or((None, None));

    let exif = sidecar.exif.as_ref().map(|e| NewExif {
        camera_make: e.camera_make.clone(),
        camera_model: e.camera_model.clone(),
        gps_latitude: e.gps_latitude,
        gps_longitude: e.gps_longitude,
        gps_altitude: e.gps_altitude,
        exposure_time: e.exposure_time,
        f_number: e.f_number,
        iso: e.iso,
        focal_length: e.focal_length,
        taken_at: e.taken_at.as_deref().and_then(normalize_timestamp),
    });

    Ok(NewImage {
        path: path.to_string_lossy().into_owned(),
        file_size: file_meta.len() as i64,
        modified_at,
        width,
        height,
        short_description: sidecar.short_description,
        long_description: sidecar.long_description,
        short_description_default: sidecar.short_description_default,
        long_description_default: sidecar.long_description_default,
        has_nudity: sidecar.has_nudity,
        has_explicit_content: sidecar.has_explicit_content,
        picture_type: sidecar.picture_type,
        style_type: sidecar.style_type,
        mood: sidecar.mood,
        embedded_image,
        keywords: sidecar.keywords,
        people: sidecar.people.iter().map(|d| d.label.clone()).collect(),
        objects: sidecar.objects.iter().map(|d| d.label.clone()).collect(),
        scenes: sidecar.scenes.iter().map(|d| d.label.clone()).collect(),
        exif,
    })
}

/// Base64-encode the file bytes, skipping files above the size ceiling.
fn embed_image(path: &Path, file_size: u64, max_bytes: u64) -> Result<Option<String>> {
    if file_size > max_bytes {
        tracing::warn!(
            "Skipping embed for {} ({} bytes exceeds ceiling of {})",
            path.display(),
            file_size,
            max_bytes
        );
        return Ok(None);
    }
    let bytes = std::fs::read(path)?;
    Ok(Some(
        base64::engine::general_purpose::STANDARD.encode(&bytes),
    ))
}

fn format_timestamp(time: SystemTime) -> String {
    let datetime: chrono::DateTime<chrono::Utc> = time.into();
    datetime.format("%Y-%m-%dT%H:%M:%S").to_string()
}

/// Normalize a capture timestamp to ISO 8601 so date-range queries can
/// compare lexicographically. Accepts EXIF (`2023:06:01 14:30:00`) and
/// ISO variants; anything else is dropped with a debug log.
fn normalize_timestamp(raw: &str) -> Option<String> {
    const FORMATS: [&str; 4] = [
        "%Y:%m:%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d",
    ];
    let trimmed = raw.trim();
    for format in FORMATS {
        if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(dt.format("%Y-%m-%dT%H:%M:%S").to_string());
        }
        if let Ok(d) = chrono::NaiveDate::parse_from_str(trimmed, format) {
            return Some(format!("{}T00:00:00", d.format("%Y-%m-%d")));
        }
    }
    tracing::debug!("Unparseable capture timestamp: {raw}");
    None
}
