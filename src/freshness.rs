//! Decides whether an existing database file can be reused as-is.
//!
//! Reuse requires the file to exist, carry the current schema version, a
//! finalized build state and a fingerprint matching the configuration.
//! Anything else triggers a rebuild, unless rebuilds are disabled, in
//! which case a typed error (or a stale-but-usable database) is returned.

use std::sync::atomic::AtomicBool;

use crate::config::Config;
use crate::db::{Database, Fingerprint, SCHEMA_VERSION, STATE_COMPLETE};
use crate::error::{Error, Result};
use crate::indexer::Indexer;

/// Why a database file could not be reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildReason {
    MissingFile,
    Forced,
    FingerprintMismatch,
    SchemaVersionMismatch,
    IncompleteBuild,
    ExceededMaxAge,
}

impl std::fmt::Display for RebuildReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            RebuildReason::MissingFile => "database file missing",
            RebuildReason::Forced => "rebuild forced",
            RebuildReason::FingerprintMismatch => "configuration fingerprint changed",
            RebuildReason::SchemaVersionMismatch => "incompatible schema version",
            RebuildReason::IncompleteBuild => "previous build did not complete",
            RebuildReason::ExceededMaxAge => "database file exceeded maximum age",
        };
        f.write_str(text)
    }
}

/// Return a ready database handle, rebuilding first when needed.
///
/// The second tuple element reports why a rebuild ran, or `None` when the
/// existing file was served. `force_rebuild` and `never_rebuild` are
/// mutually exclusive; if both are set, `force_rebuild` wins and a
/// warning is logged.
pub fn get_ready_database(
    config: &Config,
    force_rebuild: bool,
    never_rebuild: bool,
    cancel: &AtomicBool,
) -> Result<(Database, Option<RebuildReason>)> {
    if force_rebuild && never_rebuild {
        tracing::warn!("Both force_rebuild and never_rebuild are set; forcing the rebuild");
    }

    let fingerprint = Fingerprint::compute(config);
    let mut reason = evaluate(config, &fingerprint)?;
    if reason.is_none() && force_rebuild {
        reason = Some(RebuildReason::Forced);
    }

    let Some(reason) = reason else {
        return Ok((open_ready(config)?, None));
    };

    if never_rebuild && !force_rebuild {
        return match reason {
            // The file is usable, just built under a different
            // configuration or older than the age heuristic allows.
            RebuildReason::FingerprintMismatch | RebuildReason::ExceededMaxAge => {
                tracing::warn!("Serving stale database ({reason}); rebuilds are disabled");
                Ok((open_ready(config)?, None))
            }
            _ => Err(Error::DatabaseUnavailable(format!(
                "{} needs a rebuild ({reason}) but rebuilds are disabled",
                config.db_path.display()
            ))),
        };
    }

    tracing::info!("Rebuilding {}: {reason}", config.db_path.display());
    let report = Indexer::new(config.clone()).rebuild(cancel, None)?;
    if report.cancelled {
        return Err(Error::DatabaseUnavailable(format!(
            "rebuild of {} was cancelled",
            config.db_path.display()
        )));
    }

    Ok((open_ready(config)?, Some(reason)))
}

/// Check an existing file against the current configuration. `None`
/// means it can be served as-is.
fn evaluate(config: &Config, fingerprint: &Fingerprint) -> Result<Option<RebuildReason>> {
    if !config.db_path.exists() {
        return Ok(Some(RebuildReason::MissingFile));
    }

    // A foreign or truncated file degrades to a version mismatch and
    // gets rebuilt instead of surfacing an open error.
    let db = match Database::open(&config.db_path) {
        Ok(db) => db,
        Err(e) => {
            tracing::debug!("Cannot open {}: {e}", config.db_path.display());
            return Ok(Some(RebuildReason::SchemaVersionMismatch));
        }
    };
    if let Err(e) = db.initialize() {
        tracing::debug!("Cannot initialize {}: {e}", config.db_path.display());
        return Ok(Some(RebuildReason::SchemaVersionMismatch));
    }

    if db.schema_version()? != Some(SCHEMA_VERSION) {
        return Ok(Some(RebuildReason::SchemaVersionMismatch));
    }
    if db.state()?.as_deref() != Some(STATE_COMPLETE) {
        return Ok(Some(RebuildReason::IncompleteBuild));
    }
    if db.stored_fingerprint()?.as_deref() != Some(fingerprint.as_str()) {
        return Ok(Some(RebuildReason::FingerprintMismatch));
    }

    if let Some(max_age_hours) = config.max_age_hours {
        let modified = std::fs::metadata(&config.db_path)?.modified()?;
        let age = std::time::SystemTime::now()
            .duration_since(modified)
            .unwrap_or_default();
        if age.as_secs() > max_age_hours * 3600 {
            return Ok(Some(RebuildReason::ExceededMaxAge));
        }
    }

    Ok(None)
}

fn open_ready(config: &Config) -> Result<Database> {
    let db = Database::open(&config.db_path)?;
    db.initialize()?;
    db.assert_complete()?;
    Ok(db)
}
