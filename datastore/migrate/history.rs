use anyhow::Context as _;
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use crate::error::{Result, ResultExt};
use super::migration::Migration;

/// Name of the directory that holds the migration files of an application.
pub const MIGRATIONS_DIR: &str = "migrations";
const MIGRATION_EXT: &str = "json";

/// Numbered migration files (`1.json`, `2.json`, ...) of one application.
///
/// The manager assumes it is the only writer of its directory: two processes committing at the
/// same time may race for the same file name, in which case one of the commits fails.
#[derive(Debug, Clone)]
pub struct MigrationFileManager {
    dir: PathBuf,
}

impl MigrationFileManager {
    /// Opens the history stored in `<app_dir>/migrations`.
    pub fn for_app(app_dir: &Path) -> Result<Self> {
        Self::open(app_dir.join(MIGRATIONS_DIR))
    }

    /// Opens the history stored in `dir`, creating the directory if it does not exist.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("could not create migrations directory {}", dir.display()))
            .err_internal()?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Migration files in history order. Hidden files are ignored; any other file must be named
    /// by its position in the sequence.
    pub fn files(&self) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(&self.dir)
            .with_context(|| format!("could not read migrations directory {}", self.dir.display()))
            .err_history()?;

        let mut files = Vec::new();
        for entry in entries {
            let path = entry.err_history()?.path();
            let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
                corrupt_history!("migration file name {} is not valid UTF-8", path.display())
            };
            if file_name.starts_with('.') {
                continue;
            }
            let number = match parse_file_name(file_name) {
                Some(number) => number,
                None => corrupt_history!("unexpected file {} in migrations directory", path.display()),
            };
            files.push((number, path));
        }
        files.sort_unstable_by_key(|(number, _)| *number);

        for (expected, (number, path)) in (1..).zip(files.iter()) {
            if *number != expected {
                corrupt_history!(
                    "migration history has a gap: expected migration {} but found {}",
                    expected, path.display()
                )
            }
        }
        Ok(files.into_iter().map(|(_, path)| path).collect())
    }

    /// Loads all migrations in history order, skipping empty files.
    pub fn load_history(&self) -> Result<Vec<Migration>> {
        let mut history = Vec::new();
        for path in self.files()? {
            if let Some(migration) = self.load(&path)? {
                history.push(migration);
            }
        }
        info!("Loaded {} migration(s) from {}", history.len(), self.dir.display());
        Ok(history)
    }

    /// Loads one migration file; an empty file holds no migration.
    pub fn load(&self, path: &Path) -> Result<Option<Migration>> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("could not read {}", path.display()))
            .err_history()?;
        if text.trim().is_empty() {
            return Ok(None);
        }
        Migration::from_json(&text)
            .map(Some)
            .map_err(|e| e.context(format!("could not parse {}", path.display())))
    }

    /// Path of the file the next commit will write.
    pub fn next_path(&self) -> Result<PathBuf> {
        let count = self.files()?.len();
        Ok(self.dir.join(format!("{}.{}", count + 1, MIGRATION_EXT)))
    }

    /// Appends the migration to the history. Empty migrations are not written and yield `None`.
    pub fn commit(&self, migration: &Migration) -> Result<Option<PathBuf>> {
        if migration.is_empty() {
            info!("No changes detected, nothing to commit");
            return Ok(None);
        }
        let path = self.next_path()?;
        let text = migration.to_json()?;
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .with_context(|| format!("could not create {}", path.display()))
            .err_internal()?;
        file.write_all(text.as_bytes())
            .and_then(|_| file.write_all(b"\n"))
            .with_context(|| format!("could not write {}", path.display()))
            .err_internal()?;
        info!("Committed migration {}", path.display());
        Ok(Some(path))
    }
}

fn parse_file_name(file_name: &str) -> Option<u64> {
    let stem = file_name.strip_suffix(MIGRATION_EXT)?.strip_suffix('.')?;
    if stem.is_empty() || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    stem.parse().ok()
}
