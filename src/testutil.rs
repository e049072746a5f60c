//! Shared fixtures for tests: a tempdir with an image root, stub image
//! files and sidecar JSON writers.

use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::config::Config;
use crate::db::Database;

pub struct Fixture {
    pub dir: TempDir,
    pub config: Config,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("photos");
        fs::create_dir_all(&root).unwrap();

        let mut config = Config::default();
        config.roots = vec![root];
        config.db_path = dir.path().join("index.db");

        Self { dir, config }
    }

    pub fn root(&self) -> &Path {
        &self.config.roots[0]
    }

    pub fn add_image(&self, name: &str) -> PathBuf {
        self.add_image_with_bytes(name, b"stub-image-bytes")
    }

    pub fn add_image_with_bytes(&self, name: &str, bytes: &[u8]) -> PathBuf {
        let path = self.root().join(name);
        fs::write(&path, bytes).unwrap();
        path
    }

    pub fn write_raw_sidecar(&self, image_name: &str, suffix: &str, content: &str) {
        let path = self.root().join(format!("{image_name}.{suffix}"));
        fs::write(path, content).unwrap();
    }

    pub fn write_description(&self, image_name: &str, short: &str, long: &str, keywords: &[&str]) {
        self.write_raw_sidecar(
            image_name,
            "description.json",
            &json!({
                "languages": {
                    "en": {"short": short, "long": long, "keywords": keywords}
                }
            })
            .to_string(),
        );
    }

    pub fn write_detections(&self, image_name: &str, suffix: &str, labels: &[&str]) {
        let detections: Vec<serde_json::Value> = labels
            .iter()
            .map(|label| json!({"label": label, "confidence": 0.9}))
            .collect();
        self.write_raw_sidecar(
            image_name,
            suffix,
            &serde_json::Value::Array(detections).to_string(),
        );
    }

    pub fn write_exif(&self, image_name: &str, value: serde_json::Value) {
        self.write_raw_sidecar(image_name, "exif.json", &value.to_string());
    }

    pub fn open_db(&self) -> Database {
        Database::open(&self.config.db_path).unwrap()
    }
}
