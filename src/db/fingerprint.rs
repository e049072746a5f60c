//! Configuration fingerprint for staleness detection.
//!
//! The fingerprint summarizes the configuration a database was built
//! under. Any drift (different roots, filters, language or embed flag)
//! mandates a rebuild even if the file is recent.

use sha2::{Digest, Sha256};

use super::schema::SCHEMA_VERSION;
use crate::config::Config;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Compute the fingerprint for a configuration.
    ///
    /// Roots and filters are sorted first so that ordering differences in
    /// the config file do not invalidate the index.
    pub fn compute(config: &Config) -> Self {
        let mut roots: Vec<String> = config
            .roots
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        roots.sort();

        let mut filters = config.path_filters.clone();
        filters.sort();

        let mut hasher = Sha256::new();
        for root in &roots {
            hasher.update(root.as_bytes());
            hasher.update([0u8]);
        }
        hasher.update([1u8]);
        for filter in &filters {
            hasher.update(filter.as_bytes());
            hasher.update([0u8]);
        }
        hasher.update([1u8]);
        hasher.update(config.language.as_bytes());
        hasher.update([config.embed_images as u8]);
        hasher.update([config.recursive as u8]);
        hasher.update(SCHEMA_VERSION.to_le_bytes());

        Fingerprint(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
