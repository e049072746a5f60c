use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

use photodex::query::{GeoFilter, RangeBound, SortOrder};
use photodex::{compile, execute, get_ready_database, Config, Indexer, QuerySpec};

enum Command {
    Index,
    Search,
    Status,
}

fn main() -> Result<()> {
    photodex::logging::init(None)?;

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_help();
        std::process::exit(1);
    }

    let command = match args[1].as_str() {
        "index" => Command::Index,
        "search" => Command::Search,
        "status" => Command::Status,
        "--help" | "-h" => {
            print_help();
            return Ok(());
        }
        "--version" | "-V" => {
            println!("photodex {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        other => {
            eprintln!("Unknown command: {other}");
            print_help();
            std::process::exit(1);
        }
    };

    match command {
        Command::Index => run_index(&args[2..]),
        Command::Search => run_search(&args[2..]),
        Command::Status => run_status(&args[2..]),
    }
}

/// Flags shared by every subcommand: config file and overrides.
fn parse_config(args: &[String], i: &mut usize) -> Result<Option<ConfigFlag>> {
    let flag = match args[*i].as_str() {
        "--config" | "-c" => ConfigFlag::ConfigPath(take_value(args, i, "--config")?.into()),
        "--db" => ConfigFlag::DbPath(take_value(args, i, "--db")?.into()),
        "--root" | "-r" => ConfigFlag::Root(take_value(args, i, "--root")?.into()),
        "--filter" => ConfigFlag::Filter(take_value(args, i, "--filter")?),
        "--language" | "-l" => ConfigFlag::Language(take_value(args, i, "--language")?),
        "--embed" => ConfigFlag::Embed,
        _ => return Ok(None),
    };
    Ok(Some(flag))
}

enum ConfigFlag {
    ConfigPath(PathBuf),
    DbPath(PathBuf),
    Root(PathBuf),
    Filter(String),
    Language(String),
    Embed,
}

struct ConfigBuilder {
    config_path: Option<PathBuf>,
    db_path: Option<PathBuf>,
    roots: Vec<PathBuf>,
    filters: Vec<String>,
    language: Option<String>,
    embed: bool,
}

impl ConfigBuilder {
    fn new() -> Self {
        Self {
            config_path: None,
            db_path: None,
            roots: Vec::new(),
            filters: Vec::new(),
            language: None,
            embed: false,
        }
    }

    fn apply(&mut self, flag: ConfigFlag) {
        match flag {
            ConfigFlag::ConfigPath(path) => self.config_path = Some(path),
            ConfigFlag::DbPath(path) => self.db_path = Some(path),
            ConfigFlag::Root(path) => self.roots.push(path),
            ConfigFlag::Filter(filter) => self.filters.push(filter),
            ConfigFlag::Language(language) => self.language = Some(language),
            ConfigFlag::Embed => self.embed = true,
        }
    }

    fn build(self) -> Result<Config> {
        let mut config = match &self.config_path {
            Some(path) => Config::load_from(path)?,
            None => Config::load()?,
        };
        if let Some(db_path) = self.db_path {
            config.db_path = db_path;
        }
        if !self.roots.is_empty() {
            config.roots = self.roots;
        }
        if !self.filters.is_empty() {
            config.path_filters = self.filters;
        }
        if let Some(language) = self.language {
            config.language = language;
        }
        if self.embed {
            config.embed_images = true;
        }
        Ok(config)
    }
}

fn require_roots(config: &Config) -> Result<()> {
    if config.roots.is_empty() {
        bail!("No search roots configured; pass --root or set roots in the config file");
    }
    Ok(())
}

fn run_index(args: &[String]) -> Result<()> {
    let mut builder = ConfigBuilder::new();

    let mut i = 0;
    while i < args.len() {
        if let Some(flag) = parse_config(args, &mut i)? {
            builder.apply(flag);
        } else {
            bail!("Unknown argument for index: {}", args[i]);
        }
        i += 1;
    }

    let config = builder.build()?;
    require_roots(&config)?;
    let indexer = Indexer::new(config.clone());
    let report = indexer.rebuild(&AtomicBool::new(false), None)?;

    println!("Indexed {} images into {}", report.indexed, config.db_path.display());
    if !report.failures.is_empty() {
        println!("{} files could not be indexed:", report.failures.len());
        for failure in &report.failures {
            println!("  {}: {}", failure.path.display(), failure.message);
        }
    }
    Ok(())
}

fn run_search(args: &[String]) -> Result<()> {
    let mut builder = ConfigBuilder::new();
    let mut spec = QuerySpec::default();
    let mut force_rebuild = false;
    let mut never_rebuild = false;

    let mut i = 0;
    while i < args.len() {
        if let Some(flag) = parse_config(args, &mut i)? {
            builder.apply(flag);
            i += 1;
            continue;
        }
        match args[i].as_str() {
            "--keyword" | "-k" => spec.keywords.push(take_value(args, &mut i, "--keyword")?),
            "--person" | "-p" => spec.people.push(take_value(args, &mut i, "--person")?),
            "--object" | "-o" => spec.objects.push(take_value(args, &mut i, "--object")?),
            "--scene" | "-s" => spec.scenes.push(take_value(args, &mut i, "--scene")?),
            "--text" | "-t" => spec.descriptions.push(take_value(args, &mut i, "--text")?),
            "--camera-make" => spec.camera_makes.push(take_value(args, &mut i, "--camera-make")?),
            "--camera-model" => spec.camera_models.push(take_value(args, &mut i, "--camera-model")?),
            "--iso" => spec.iso = parse_range_i64(&take_value(args, &mut i, "--iso")?)?,
            "--f-number" => spec.f_number = parse_range_f64(&take_value(args, &mut i, "--f-number")?)?,
            "--focal-length" => {
                spec.focal_length = parse_range_f64(&take_value(args, &mut i, "--focal-length")?)?
            }
            "--exposure" => {
                spec.exposure_time = parse_range_f64(&take_value(args, &mut i, "--exposure")?)?
            }
            "--near" => spec.geo = Some(parse_near(&take_value(args, &mut i, "--near")?)?),
            "--taken-after" => {
                spec.taken_after = Some(parse_date(&take_value(args, &mut i, "--taken-after")?)?)
            }
            "--taken-before" => {
                spec.taken_before = Some(parse_date(&take_value(args, &mut i, "--taken-before")?)?)
            }
            "--has-nudity" => spec.has_nudity = true,
            "--no-nudity" => spec.no_nudity = true,
            "--has-explicit" => spec.has_explicit_content = true,
            "--no-explicit" => spec.no_explicit_content = true,
            "--limit" | "-n" => {
                spec.limit = Some(take_value(args, &mut i, "--limit")?.parse()?)
            }
            "--sort" => spec.sort = parse_sort(&take_value(args, &mut i, "--sort")?)?,
            "--force-rebuild" => force_rebuild = true,
            "--never-rebuild" => never_rebuild = true,
            other => bail!("Unknown argument for search: {other}"),
        }
        i += 1;
    }

    let config = builder.build()?;
    require_roots(&config)?;
    let (db, rebuilt) =
        get_ready_database(&config, force_rebuild, never_rebuild, &AtomicBool::new(false))?;
    if let Some(reason) = rebuilt {
        eprintln!("(index rebuilt: {reason})");
    }

    let compiled = compile(&spec)?;
    let results = execute(&db, &compiled)?;

    if results.is_empty() {
        println!("No matches.");
        return Ok(());
    }
    for result in &results {
        let mut line = result.path.clone();
        if let (Some(w), Some(h)) = (result.width, result.height) {
            line.push_str(&format!("  {w}x{h}"));
        }
        if let Some(distance) = result.distance_m {
            line.push_str(&format!("  {:.0}m", distance));
        }
        if let Some(short) = result.short_description.as_deref().filter(|s| !s.is_empty()) {
            line.push_str(&format!("  \"{short}\""));
        }
        println!("{line}");
    }
    println!("{} match(es).", results.len());
    Ok(())
}

fn run_status(args: &[String]) -> Result<()> {
    let mut builder = ConfigBuilder::new();

    let mut i = 0;
    while i < args.len() {
        if let Some(flag) = parse_config(args, &mut i)? {
            builder.apply(flag);
        } else {
            bail!("Unknown argument for status: {}", args[i]);
        }
        i += 1;
    }

    let config = builder.build()?;
    if !config.db_path.exists() {
        println!("No database at {}", config.db_path.display());
        return Ok(());
    }

    let db = photodex::Database::open(&config.db_path)?;
    db.initialize()?;
    let status = db.status()?;

    println!("Database:       {}", config.db_path.display());
    println!("Schema version: {}", display_opt(&status.schema_version));
    println!("State:          {}", status.state.as_deref().unwrap_or("-"));
    println!("Built at:       {}", status.built_at.as_deref().unwrap_or("-"));
    println!("Fingerprint:    {}", status.fingerprint.as_deref().unwrap_or("-"));
    println!("Records:        {}", status.record_count);
    Ok(())
}

fn take_value(args: &[String], i: &mut usize, flag: &str) -> Result<String> {
    *i += 1;
    args.get(*i)
        .cloned()
        .with_context(|| format!("{flag} requires a value"))
}

/// `MIN` or `MIN:MAX`. A lone value is an inclusive lower bound.
fn parse_range_i64(raw: &str) -> Result<Option<RangeBound<i64>>> {
    let parts: Vec<&str> = raw.splitn(2, ':').collect();
    let min: i64 = parts[0].parse().with_context(|| format!("bad range: {raw}"))?;
    Ok(Some(match parts.get(1) {
        Some(max) => RangeBound::between(min, max.parse()?),
        None => RangeBound::at_least(min),
    }))
}

fn parse_range_f64(raw: &str) -> Result<Option<RangeBound<f64>>> {
    let parts: Vec<&str> = raw.splitn(2, ':').collect();
    let min: f64 = parts[0].parse().with_context(|| format!("bad range: {raw}"))?;
    Ok(Some(match parts.get(1) {
        Some(max) => RangeBound::between(min, max.parse()?),
        None => RangeBound::at_least(min),
    }))
}

/// `LAT,LON,METERS`
fn parse_near(raw: &str) -> Result<GeoFilter> {
    let parts: Vec<&str> = raw.split(',').collect();
    if parts.len() != 3 {
        bail!("--near expects LAT,LON,METERS");
    }
    Ok(GeoFilter {
        latitude: parts[0].trim().parse()?,
        longitude: parts[1].trim().parse()?,
        max_distance_m: parts[2].trim().parse()?,
    })
}

fn parse_date(raw: &str) -> Result<chrono::NaiveDate> {
    chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .with_context(|| format!("bad date (expected YYYY-MM-DD): {raw}"))
}

fn parse_sort(raw: &str) -> Result<SortOrder> {
    Ok(match raw {
        "path" => SortOrder::PathAscending,
        "path-desc" => SortOrder::PathDescending,
        "date" => SortOrder::TakenAtAscending,
        "date-desc" => SortOrder::TakenAtDescending,
        "size" => SortOrder::FileSizeAscending,
        "size-desc" => SortOrder::FileSizeDescending,
        other => bail!("Unknown sort order: {other}"),
    })
}

fn display_opt(value: &Option<i64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

fn print_help() {
    println!(
        r#"photodex - image sidecar metadata indexer and search

USAGE:
    photodex <COMMAND> [OPTIONS]

COMMANDS:
    index       Rebuild the database from the configured roots
    search      Query the database, rebuilding first if it is stale
    status      Show facts about the current database

COMMON OPTIONS:
    --config, -c PATH     Path to config file
    --db PATH             Database file (overrides config)
    --root, -r DIR        Search root (repeatable, overrides config)
    --filter PATTERN      Path filter, substring or wildcard (repeatable)
    --language, -l LANG   Sidecar language (default: en)
    --embed               Embed base64 image bytes into the database

SEARCH OPTIONS:
    --keyword, -k PATTERN    Keyword wildcard (repeatable, OR-combined)
    --person, -p PATTERN     Person wildcard (repeatable)
    --object, -o PATTERN     Object wildcard (repeatable)
    --scene, -s PATTERN      Scene wildcard (repeatable)
    --text, -t PATTERN       Description substring (repeatable)
    --camera-make PATTERN    Camera make wildcard
    --camera-model PATTERN   Camera model wildcard
    --iso MIN[:MAX]          ISO range (lone value = at least)
    --f-number MIN[:MAX]     Aperture range
    --focal-length MIN[:MAX] Focal length range (mm)
    --exposure MIN[:MAX]     Exposure time range (seconds)
    --near LAT,LON,METERS    Only matches within a distance of a point
    --taken-after DATE       Capture date lower bound (YYYY-MM-DD)
    --taken-before DATE      Capture date upper bound (YYYY-MM-DD)
    --has-nudity / --no-nudity
    --has-explicit / --no-explicit
    --limit, -n N            Maximum number of results
    --sort ORDER             path, path-desc, date, date-desc, size, size-desc
    --force-rebuild          Rebuild even if the database looks fresh
    --never-rebuild          Fail instead of rebuilding

ENVIRONMENT:
    PHOTODEX_LOG    Log level (trace, debug, info, warn, error)
"#
    );
}
