//! Compiles a [`QuerySpec`] into one parameterized SQL statement.
//!
//! Composition rules: patterns within one category array are OR-combined
//! inside a parenthesized group, distinct categories are AND-combined.
//! Category groups probe the junction tables through `IN (SELECT …)`
//! subqueries so each group stays independent of the others.

use rusqlite::types::ToSql;

use super::geo::bounding_box;
use super::wildcard::to_like_pattern;
use super::{GeoFilter, QuerySpec, RangeBound};
use crate::error::Result;

/// A compiled query ready for execution.
///
/// When a geo filter is present the row limit is withheld from the SQL:
/// the exact haversine check runs after the bounding-box pre-filter, and
/// limiting before it could drop rows that survive the precise test.
pub struct CompiledQuery {
    pub sql: String,
    pub params: Vec<Box<dyn ToSql>>,
    pub geo: Option<GeoFilter>,
    pub limit: Option<usize>,
}

/// Compile a validated spec into SQL plus bind parameters.
pub fn compile(spec: &QuerySpec) -> Result<CompiledQuery> {
    spec.validate()?;

    let mut clauses: Vec<String> = Vec::new();
    let mut params: Vec<Box<dyn ToSql>> = Vec::new();

    junction_group(
        &mut clauses,
        &mut params,
        "image_keywords",
        "keyword",
        &spec.keywords,
    );
    junction_group(
        &mut clauses,
        &mut params,
        "image_people",
        "person",
        &spec.people,
    );
    junction_group(
        &mut clauses,
        &mut params,
        "image_objects",
        "object",
        &spec.objects,
    );
    junction_group(
        &mut clauses,
        &mut params,
        "image_scenes",
        "scene",
        &spec.scenes,
    );

    description_group(&mut clauses, &mut params, &spec.descriptions);

    column_group(&mut clauses, &mut params, "i.picture_type", &spec.picture_types);
    column_group(&mut clauses, &mut params, "i.style_type", &spec.style_types);
    column_group(&mut clauses, &mut params, "i.mood", &spec.moods);
    column_group(&mut clauses, &mut params, "e.camera_make", &spec.camera_makes);
    column_group(&mut clauses, &mut params, "e.camera_model", &spec.camera_models);

    range_clause(&mut clauses, &mut params, "e.iso", &spec.iso);
    range_clause(&mut clauses, &mut params, "e.exposure_time", &spec.exposure_time);
    range_clause(&mut clauses, &mut params, "e.f_number", &spec.f_number);
    range_clause(&mut clauses, &mut params, "e.focal_length", &spec.focal_length);
    range_clause(&mut clauses, &mut params, "i.width", &spec.width);
    range_clause(&mut clauses, &mut params, "i.height", &spec.height);

    if let Some(after) = spec.taken_after {
        clauses.push("e.taken_at >= ?".to_string());
        params.push(Box::new(format!("{}T00:00:00", after.format("%Y-%m-%d"))));
    }
    if let Some(before) = spec.taken_before {
        clauses.push("e.taken_at <= ?".to_string());
        params.push(Box::new(format!("{}T23:59:59", before.format("%Y-%m-%d"))));
    }

    if spec.has_nudity {
        clauses.push("i.has_nudity = 1".to_string());
    }
    if spec.no_nudity {
        clauses.push("i.has_nudity = 0".to_string());
    }
    if spec.has_explicit_content {
        clauses.push("i.has_explicit_content = 1".to_string());
    }
    if spec.no_explicit_content {
        clauses.push("i.has_explicit_content = 0".to_string());
    }

    if let Some(geo) = &spec.geo {
        // Cheap indexed pre-filter; rows lacking either coordinate can
        // never match a distance query.
        let bounds = bounding_box(geo.latitude, geo.longitude, geo.max_distance_m);
        clauses.push(
            "e.gps_latitude IS NOT NULL AND e.gps_longitude IS NOT NULL \
             AND e.gps_latitude BETWEEN ? AND ? AND e.gps_longitude BETWEEN ? AND ?"
                .to_string(),
        );
        params.push(Box::new(bounds.min_lat));
        params.push(Box::new(bounds.max_lat));
        params.push(Box::new(bounds.min_lon));
        params.push(Box::new(bounds.max_lon));
    }

    let mut sql = String::from(
        r#"SELECT i.id, i.path, i.file_size, i.modified_at, i.width, i.height,
       COALESCE(NULLIF(i.short_description, ''), i.short_description_default) AS short_description,
       COALESCE(NULLIF(i.long_description, ''), i.long_description_default) AS long_description,
       i.has_nudity, i.has_explicit_content, i.picture_type, i.style_type, i.mood,
       e.camera_make, e.camera_model, e.gps_latitude, e.gps_longitude, e.gps_altitude,
       e.exposure_time, e.f_number, e.iso, e.focal_length, e.taken_at
FROM images i
LEFT JOIN exif_metadata e ON e.image_id = i.id"#,
    );

    if !clauses.is_empty() {
        sql.push_str("\nWHERE ");
        sql.push_str(&clauses.join("\n  AND "));
    }

    sql.push_str("\nORDER BY ");
    sql.push_str(spec.sort.sql());

    if spec.geo.is_none() {
        if let Some(limit) = spec.limit {
            sql.push_str("\nLIMIT ?");
            params.push(Box::new(limit as i64));
        }
    }

    Ok(CompiledQuery {
        sql,
        params,
        geo: spec.geo,
        limit: spec.limit,
    })
}

/// `i.id IN (SELECT image_id FROM <table> WHERE <col> LIKE ? OR …)`
fn junction_group(
    clauses: &mut Vec<String>,
    params: &mut Vec<Box<dyn ToSql>>,
    table: &str,
    column: &str,
    patterns: &[String],
) {
    if patterns.is_empty() {
        return;
    }

    let alternatives: Vec<String> = patterns
        .iter()
        .map(|_| format!("{column} LIKE ? ESCAPE '\\'"))
        .collect();
    clauses.push(format!(
        "i.id IN (SELECT image_id FROM {table} WHERE {})",
        alternatives.join(" OR ")
    ));
    for pattern in patterns {
        // Junction values are stored lowercased
        params.push(Box::new(to_like_pattern(&pattern.to_lowercase())));
    }
}

/// `(<expr> LIKE ? OR <expr> LIKE ? …)` over one column.
fn column_group(
    clauses: &mut Vec<String>,
    params: &mut Vec<Box<dyn ToSql>>,
    expr: &str,
    patterns: &[String],
) {
    if patterns.is_empty() {
        return;
    }

    let alternatives: Vec<String> = patterns
        .iter()
        .map(|_| format!("{expr} LIKE ? ESCAPE '\\'"))
        .collect();
    clauses.push(format!("({})", alternatives.join(" OR ")));
    for pattern in patterns {
        params.push(Box::new(to_like_pattern(pattern)));
    }
}

/// Description search matches substrings of the short or the long text,
/// reading through the default-language fallback so a row with any
/// language's data is never dropped.
fn description_group(
    clauses: &mut Vec<String>,
    params: &mut Vec<Box<dyn ToSql>>,
    patterns: &[String],
) {
    if patterns.is_empty() {
        return;
    }

    const SHORT: &str = "COALESCE(NULLIF(i.short_description, ''), i.short_description_default)";
    const LONG: &str = "COALESCE(NULLIF(i.long_description, ''), i.long_description_default)";

    let mut alternatives = Vec::with_capacity(patterns.len() * 2);
    for pattern in patterns {
        alternatives.push(format!("{SHORT} LIKE ? ESCAPE '\\'"));
        alternatives.push(format!("{LONG} LIKE ? ESCAPE '\\'"));
        let like = format!("%{}%", to_like_pattern(pattern));
        params.push(Box::new(like.clone()));
        params.push(Box::new(like));
    }
    clauses.push(format!("({})", alternatives.join(" OR ")));
}

fn range_clause<T>(
    clauses: &mut Vec<String>,
    params: &mut Vec<Box<dyn ToSql>>,
    expr: &str,
    bound: &Option<RangeBound<T>>,
) where
    T: Copy + ToSql + 'static,
{
    let Some(bound) = bound else { return };

    clauses.push(format!("{expr} >= ?"));
    params.push(Box::new(bound.min));
    if let Some(max) = bound.max {
        clauses.push(format!("{expr} <= ?"));
        params.push(Box::new(max));
    }
}
