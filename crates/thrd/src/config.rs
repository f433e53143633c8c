//! Environment-driven configuration.
//!
//! Everything has a sensible default under `~/.thrd`; each value can be
//! overridden with an environment variable. Nothing here reads config
//! files; the library is configured by its host process.

use std::env;
use std::path::PathBuf;

/// Environment variable holding the bearer credential for remote peers.
pub const HUB_API_KEY_ENV: &str = "THRD_HUB_API_KEY";

/// Overrides the base directory (default `~/.thrd`).
pub const HOME_ENV: &str = "THRD_HOME";

/// Overrides the database directory (default `{home}/data`).
pub const DB_DIR_ENV: &str = "THRD_DB_DIR";

/// Overrides the database file name (default `threads.db`).
pub const DB_NAME_ENV: &str = "THRD_DB_NAME";

/// When set to `true`, a throwaway test database name is used.
pub const DB_TEST_ENV: &str = "THRD_DB_TEST";

/// Base directory for library state.
pub fn thrd_home() -> PathBuf {
    if let Ok(home) = env::var(HOME_ENV) {
        return PathBuf::from(home);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".thrd")
}

/// Directory the database file lives in.
pub fn db_dir() -> PathBuf {
    match env::var(DB_DIR_ENV) {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => thrd_home().join("data"),
    }
}

/// Database file name, honoring test mode.
pub fn db_name() -> String {
    if env::var(DB_TEST_ENV).as_deref() == Ok("true") {
        return "threads_test.db".to_string();
    }
    env::var(DB_NAME_ENV).unwrap_or_else(|_| "threads.db".to_string())
}

/// Full path to the database file.
pub fn db_path() -> PathBuf {
    db_dir().join(db_name())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_path_is_under_db_dir() {
        let path = db_path();
        assert!(path.starts_with(db_dir()));
        assert!(path.to_string_lossy().ends_with(".db"));
    }

    #[test]
    fn default_db_name() {
        if std::env::var(DB_NAME_ENV).is_err() && std::env::var(DB_TEST_ENV).is_err() {
            assert_eq!(db_name(), "threads.db");
        }
    }
}
