//! Data directory layout
//!
//! Everything lives under one root: `config.yaml` and the SQLite database.

use std::path::PathBuf;

/// Environment variable overriding the data directory
pub const DATA_DIR_ENV: &str = "KB_DATA_DIR";

const DEFAULT_DIR_NAME: &str = ".insight-kb";

pub struct KbPaths {
    pub root: PathBuf,
    pub config: PathBuf,
}

impl KbPaths {
    /// Resolve the data directory: explicit path, then `KB_DATA_DIR`, then
    /// `.insight-kb` under the current directory.
    pub fn resolve(explicit: Option<PathBuf>) -> Self {
        let root = explicit
            .or_else(|| std::env::var_os(DATA_DIR_ENV).map(PathBuf::from))
            .unwrap_or_else(|| {
                std::env::current_dir()
                    .unwrap_or_else(|_| PathBuf::from("."))
                    .join(DEFAULT_DIR_NAME)
            });
        Self::from_root(root)
    }

    pub fn from_root(root: PathBuf) -> Self {
        Self {
            config: root.join("config.yaml"),
            root,
        }
    }

    /// Database file, relative names resolved against the data directory
    pub fn db_path(&self, db_file: &str) -> PathBuf {
        self.root.join(db_file)
    }

    pub fn ensure_root(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root)
    }
}
