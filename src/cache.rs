//! Persistent city -> (department, region) cache.
//!
//! Entries are only ever appended. The whole store is read once when the
//! cache is opened; after that every lookup is served from memory and every
//! new entry is written through to the store before `append` returns.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::{info, trace, warn};

use crate::config::{AppConfig, CacheBackend};
use crate::errors::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub department: String,
    pub region: String,
}

impl Location {
    pub fn new(department: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            department: department.into(),
            region: region.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationEntry {
    pub city: String,
    pub location: Location,
}

/// Durable backing for [`LocationCache`]. Implementations must never
/// overwrite or delete an entry.
pub trait LocationStore: Send + Sync {
    fn load_all(&self) -> AppResult<Vec<LocationEntry>>;
    fn put(&self, entry: &LocationEntry) -> AppResult<()>;
    fn describe(&self) -> String;
}

pub struct LocationCache {
    store: Box<dyn LocationStore>,
    index: HashMap<String, Location>,
}

impl LocationCache {
    pub fn open(store: Box<dyn LocationStore>) -> AppResult<Self> {
        let entries = store.load_all().map_err(|err| match err {
            AppError::CacheLoad { .. } => err,
            other => AppError::CacheLoad {
                location: store.describe(),
                reason: other.to_string(),
            },
        })?;
        let mut index = HashMap::with_capacity(entries.len());
        for entry in entries {
            index.entry(entry.city).or_insert(entry.location);
        }
        info!(
            store = %store.describe(),
            entries = index.len(),
            "location cache loaded"
        );
        Ok(Self { store, index })
    }

    pub fn in_memory() -> Self {
        Self {
            store: Box::new(MemoryLocationStore::default()),
            index: HashMap::new(),
        }
    }

    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        let store: Box<dyn LocationStore> = match config.cache_backend {
            CacheBackend::Csv => Box::new(CsvLocationStore::new(&config.cache_path)),
            CacheBackend::Sqlite => Box::new(SqliteLocationStore::open(&config.cache_path)?),
        };
        Self::open(store)
    }

    pub fn lookup(&self, city: &str) -> Option<&Location> {
        let hit = self.index.get(city);
        if hit.is_some() {
            trace!(city, "location cache hit");
        }
        hit
    }

    /// Records a new entry. The entry stays usable in memory even when the
    /// store write fails; the error only means the next run will not see it.
    pub fn append(&mut self, city: &str, location: Location) -> AppResult<()> {
        if self.index.contains_key(city) {
            return Ok(());
        }
        let entry = LocationEntry {
            city: city.to_string(),
            location,
        };
        self.index.insert(entry.city.clone(), entry.location.clone());
        self.store.put(&entry).map_err(|err| AppError::CacheWrite {
            city: entry.city.clone(),
            reason: err.to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

/// Three-column CSV file (city, department, region), no header.
pub struct CsvLocationStore {
    path: PathBuf,
}

impl CsvLocationStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_error(&self, reason: impl ToString) -> AppError {
        AppError::CacheLoad {
            location: self.describe(),
            reason: reason.to_string(),
        }
    }
}

impl LocationStore for CsvLocationStore {
    fn load_all(&self) -> AppResult<Vec<LocationEntry>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    fs::create_dir_all(parent).map_err(|err| self.load_error(err))?;
                }
                File::create(&self.path).map_err(|err| self.load_error(err))?;
                info!(path = %self.path.display(), "created empty location cache file");
                return Ok(Vec::new());
            }
            Err(err) => return Err(self.load_error(err)),
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(file);
        let mut entries = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record = record.map_err(|err| self.load_error(err))?;
            if record.len() == 1 && record.get(0).map_or(false, |f| f.trim().is_empty()) {
                continue;
            }
            if record.len() != 3 {
                return Err(self.load_error(format!(
                    "line {} has {} columns, expected 3",
                    line + 1,
                    record.len()
                )));
            }
            entries.push(LocationEntry {
                city: record[0].to_string(),
                location: Location::new(&record[1], &record[2]),
            });
        }
        Ok(entries)
    }

    fn put(&self, entry: &LocationEntry) -> AppResult<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)?;
        if ends_mid_line(&mut file)? {
            file.write_all(b"\n")?;
        }
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(file);
        writer.write_record([
            entry.city.as_str(),
            entry.location.department.as_str(),
            entry.location.region.as_str(),
        ])?;
        writer.flush()?;
        let file = writer
            .into_inner()
            .map_err(|err| AppError::Io(err.into_error()))?;
        file.sync_data()?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("csv:{}", self.path.display())
    }
}

// True when the file has content and its last byte is not a line break, as
// in a hand-edited cache. Appending there would extend the last record.
fn ends_mid_line(file: &mut File) -> io::Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}

pub struct SqliteLocationStore {
    connection: Mutex<Connection>,
    path: PathBuf,
}

impl SqliteLocationStore {
    pub fn open<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let path = path.as_ref().to_path_buf();
        let connection = Connection::open(&path).map_err(|err| AppError::CacheLoad {
            location: format!("sqlite:{}", path.display()),
            reason: err.to_string(),
        })?;
        run_migrations(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
            path,
        })
    }

    pub fn in_memory() -> AppResult<Self> {
        let connection = Connection::open_in_memory()?;
        run_migrations(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
            path: PathBuf::from(":memory:"),
        })
    }
}

fn run_migrations(connection: &Connection) -> AppResult<()> {
    connection.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;

        CREATE TABLE IF NOT EXISTS city_locations (
            city TEXT PRIMARY KEY,
            department TEXT NOT NULL,
            region TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (DATETIME('now'))
        );
        "#,
    )?;
    Ok(())
}

impl LocationStore for SqliteLocationStore {
    fn load_all(&self) -> AppResult<Vec<LocationEntry>> {
        let conn = self.connection.lock();
        let mut stmt =
            conn.prepare("SELECT city, department, region FROM city_locations ORDER BY rowid ASC")?;
        let entries = stmt
            .query_map([], |row| {
                Ok(LocationEntry {
                    city: row.get(0)?,
                    location: Location {
                        department: row.get(1)?,
                        region: row.get(2)?,
                    },
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    fn put(&self, entry: &LocationEntry) -> AppResult<()> {
        let conn = self.connection.lock();
        let inserted = conn.execute(
            "INSERT INTO city_locations (city, department, region)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(city) DO NOTHING",
            (
                entry.city.as_str(),
                entry.location.department.as_str(),
                entry.location.region.as_str(),
            ),
        )?;
        if inserted == 0 {
            warn!(city = %entry.city, "location already stored; keeping existing entry");
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("sqlite:{}", self.path.display())
    }
}

#[derive(Default)]
pub struct MemoryLocationStore {
    entries: Mutex<Vec<LocationEntry>>,
}

impl MemoryLocationStore {
    pub fn with_entries(entries: Vec<LocationEntry>) -> Self {
        Self {
            entries: Mutex::new(entries),
        }
    }
}

impl LocationStore for MemoryLocationStore {
    fn load_all(&self) -> AppResult<Vec<LocationEntry>> {
        Ok(self.entries.lock().clone())
    }

    fn put(&self, entry: &LocationEntry) -> AppResult<()> {
        let mut entries = self.entries.lock();
        if !entries.iter().any(|existing| existing.city == entry.city) {
            entries.push(entry.clone());
        }
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
