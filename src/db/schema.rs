/// Bumped whenever the table layout changes in an incompatible way. An
/// index built with a different version is rebuilt, never read.
pub const SCHEMA_VERSION: i64 = 1;

pub const SCHEMA: &str = r#"
-- Internal metadata: schema version, fingerprint, build state
CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- Images table: one row per indexed file
CREATE TABLE IF NOT EXISTS images (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    path TEXT NOT NULL UNIQUE,
    file_size INTEGER NOT NULL,
    modified_at TEXT,
    width INTEGER,
    height INTEGER,

    -- Descriptions in the indexed language, with default-language fallback
    short_description TEXT,
    long_description TEXT,
    short_description_default TEXT,
    long_description_default TEXT,

    -- Content-safety flags
    has_nudity INTEGER NOT NULL DEFAULT 0,
    has_explicit_content INTEGER NOT NULL DEFAULT 0,

    -- Free-text classifications
    picture_type TEXT,
    style_type TEXT,
    mood TEXT,

    -- Base64 file bytes, only populated when embedding is enabled
    embedded_image TEXT
);

CREATE INDEX IF NOT EXISTS idx_images_width ON images(width);
CREATE INDEX IF NOT EXISTS idx_images_height ON images(height);
CREATE INDEX IF NOT EXISTS idx_images_has_nudity ON images(has_nudity);
CREATE INDEX IF NOT EXISTS idx_images_has_explicit ON images(has_explicit_content);

-- Junction tables: many-to-many between images and normalized tag values
CREATE TABLE IF NOT EXISTS image_keywords (
    image_id INTEGER NOT NULL,
    keyword TEXT NOT NULL,
    PRIMARY KEY (image_id, keyword),
    FOREIGN KEY (image_id) REFERENCES images(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_image_keywords_keyword ON image_keywords(keyword);

CREATE TABLE IF NOT EXISTS image_people (
    image_id INTEGER NOT NULL,
    person TEXT NOT NULL,
    PRIMARY KEY (image_id, person),
    FOREIGN KEY (image_id) REFERENCES images(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_image_people_person ON image_people(person);

CREATE TABLE IF NOT EXISTS image_objects (
    image_id INTEGER NOT NULL,
    object TEXT NOT NULL,
    PRIMARY KEY (image_id, object),
    FOREIGN KEY (image_id) REFERENCES images(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_image_objects_object ON image_objects(object);

CREATE TABLE IF NOT EXISTS image_scenes (
    image_id INTEGER NOT NULL,
    scene TEXT NOT NULL,
    PRIMARY KEY (image_id, scene),
    FOREIGN KEY (image_id) REFERENCES images(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_image_scenes_scene ON image_scenes(scene);

-- EXIF data: one-to-one with images
CREATE TABLE IF NOT EXISTS exif_metadata (
    image_id INTEGER PRIMARY KEY,
    camera_make TEXT,
    camera_model TEXT,
    gps_latitude REAL,
    gps_longitude REAL,
    gps_altitude REAL,
    exposure_time REAL,
    f_number REAL,
    iso INTEGER,
    focal_length REAL,
    taken_at TEXT,
    FOREIGN KEY (image_id) REFERENCES images(id) ON DELETE CASCADE
);

-- Range-scan indexes for numeric EXIF queries
CREATE INDEX IF NOT EXISTS idx_exif_iso ON exif_metadata(iso);
CREATE INDEX IF NOT EXISTS idx_exif_exposure_time ON exif_metadata(exposure_time);
CREATE INDEX IF NOT EXISTS idx_exif_f_number ON exif_metadata(f_number);
CREATE INDEX IF NOT EXISTS idx_exif_focal_length ON exif_metadata(focal_length);
CREATE INDEX IF NOT EXISTS idx_exif_taken_at ON exif_metadata(taken_at);
CREATE INDEX IF NOT EXISTS idx_exif_camera_make ON exif_metadata(camera_make);
CREATE INDEX IF NOT EXISTS idx_exif_camera_model ON exif_metadata(camera_model);

-- Bounding-box pre-filter for geo queries
CREATE INDEX IF NOT EXISTS idx_exif_gps_latitude ON exif_metadata(gps_latitude);
CREATE INDEX IF NOT EXISTS idx_exif_gps_longitude ON exif_metadata(gps_longitude);
"#;
