use std::path::PathBuf;

/// Storage and listen configuration shared by all services.
///
/// The daemon fills this from its config file and CLI flags, then resolves
/// the embedded store paths under `data_dir` unless explicit paths are set.
#[derive(Debug, Clone, Default)]
pub struct ServiceConfig {
    /// Base directory for all embedded stores.
    pub data_dir: Option<PathBuf>,

    /// Explicit path to the KV database (overrides `data_dir`).
    pub db_path: Option<PathBuf>,

    /// Explicit path to the SQLite database (overrides `data_dir`).
    pub sqlite_path: Option<PathBuf>,

    /// Listen address, e.g. "0.0.0.0:8080".
    pub listen: String,
}

impl ServiceConfig {
    /// Resolve the KV database path: explicit `db_path`, else
    /// `{data_dir}/data.redb`, else `./data.redb`.
    pub fn resolve_db_path(&self) -> PathBuf {
        if let Some(ref path) = self.db_path {
            return path.clone();
        }
        self.data_subpath("data.redb")
    }

    /// Resolve the SQLite database path: explicit `sqlite_path`, else
    /// `{data_dir}/data.sqlite`, else `./data.sqlite`.
    pub fn resolve_sqlite_path(&self) -> PathBuf {
        if let Some(ref path) = self.sqlite_path {
            return path.clone();
        }
        self.data_subpath("data.sqlite")
    }

    fn data_subpath(&self, name: &str) -> PathBuf {
        match self.data_dir {
            Some(ref dir) => dir.join(name),
            None => PathBuf::from(name),
        }
    }
}
