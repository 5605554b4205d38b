use std::{fs, io, path::PathBuf};

use directories::ProjectDirs;

/// Storage backend for one persistence tier.
///
/// Mirrors the web storage surface the records were designed for: whole
/// records are read and written as JSON strings under well-known keys.
/// Backends are injected into the store, so tests swap in an in-memory one.
pub trait KeyValueStore: Send + Sync {
    fn read(&self, key: &str) -> io::Result<Option<String>>;
    fn write(&self, key: &str, value: &str) -> io::Result<()>;
}

/// One `<key>.json` file per key inside a directory.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Durable tier: `~/.config/inner_world/state` on Linux,
    /// `%APPDATA%\inner_world\state` on Windows, etc.
    pub fn durable() -> io::Result<Self> {
        let proj = project_dirs()?;
        Self::at(proj.config_dir().join("state"))
    }

    /// Session tier: lives under the cache directory and may be wiped freely.
    pub fn session() -> io::Result<Self> {
        let proj = project_dirs()?;
        Self::at(proj.cache_dir().join("session"))
    }

    /// Open a store rooted at an explicit directory.
    pub fn at(dir: PathBuf) -> io::Result<Self> {
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn file_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

fn project_dirs() -> io::Result<ProjectDirs> {
    ProjectDirs::from("", "", "inner_world")
        .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "Unable to locate config dir"))
}

impl KeyValueStore for JsonFileStore {
    fn read(&self, key: &str) -> io::Result<Option<String>> {
        match fs::read_to_string(self.file_for(key)) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write(&self, key: &str, value: &str) -> io::Result<()> {
        // Temp file plus rename, so a crash mid-write never truncates the record.
        let path = self.file_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)
    }
}
