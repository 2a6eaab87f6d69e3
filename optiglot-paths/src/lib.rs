//! Where optiglot keeps its files.
//!
//! Every base location resolves in the same order: an `OPTIGLOT_*` override,
//! then the XDG base directory, then the XDG default under the home
//! directory. XDG locations are used on every platform. Empty variables
//! count as unset.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Overrides the config directory outright (no `optiglot` suffix added)
pub const CONFIG_DIR_ENV: &str = "OPTIGLOT_CONFIG_DIR";
/// Overrides the data directory outright (no `optiglot` suffix added)
pub const DATA_DIR_ENV: &str = "OPTIGLOT_DATA_DIR";

const APP_DIR: &str = "optiglot";

/// A directory could not be created
#[derive(Debug, Error)]
#[error("failed to create {path}: {source}")]
pub struct PathsError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

#[derive(Debug, Clone, Copy)]
struct BaseDir {
    override_env: &'static str,
    xdg_env: &'static str,
    home_default: &'static str,
}

const CONFIG: BaseDir = BaseDir {
    override_env: CONFIG_DIR_ENV,
    xdg_env: "XDG_CONFIG_HOME",
    home_default: ".config",
};

const DATA: BaseDir = BaseDir {
    override_env: DATA_DIR_ENV,
    xdg_env: "XDG_DATA_HOME",
    home_default: ".local/share",
};

impl BaseDir {
    fn resolve(self) -> PathBuf {
        self.resolve_with(|name| std::env::var_os(name), dirs::home_dir())
    }

    fn resolve_with(
        self,
        var: impl Fn(&str) -> Option<OsString>,
        home: Option<PathBuf>,
    ) -> PathBuf {
        let set = |name: &str| var(name).filter(|value| !value.is_empty());

        if let Some(dir) = set(self.override_env) {
            return PathBuf::from(dir);
        }
        let base = match (set(self.xdg_env), home) {
            (Some(xdg), _) => PathBuf::from(xdg),
            (None, Some(home)) => home.join(self.home_default),
            (None, None) => PathBuf::from(self.home_default),
        };
        base.join(APP_DIR)
    }
}

/// Directory holding the user-level `config.toml`
pub fn config_dir() -> PathBuf {
    CONFIG.resolve()
}

pub fn data_dir() -> PathBuf {
    DATA.resolve()
}

/// Default parent of per-session work directories
pub fn sessions_dir() -> PathBuf {
    data_dir().join("sessions")
}

/// Create `root/<session_id>` and any missing parents
pub fn create_session_dir(root: &Path, session_id: &str) -> Result<PathBuf, PathsError> {
    let dir = root.join(session_id);
    std::fs::create_dir_all(&dir).map_err(|source| PathsError {
        path: dir.clone(),
        source,
    })?;
    Ok(dir)
}
