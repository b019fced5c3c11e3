//! Configuration for axlay: detection timings, noise filters and automation rules.
//!
//! Files are RON (`.ron`) or JSON (`.json`); every section is optional and falls back
//! to defaults. Selectors inside rules are validated at load time.

use std::{
    env,
    path::{Path, PathBuf},
};

mod error;
mod loader;
mod types;

#[cfg(test)]
mod test_parse;

pub use error::Error;
pub use loader::{Format, load_from_path, load_from_str, validate};
pub use types::{Config, Detection, Filters, OWN_PACKAGE, Rule};

/// Determine the preferred user config path (`~/.axlay/config.ron`).
pub fn default_config_path() -> PathBuf {
    let mut p = PathBuf::from(env::var_os("HOME").unwrap_or_default());
    p.push(".axlay");
    p.push("config.ron");
    p
}

/// Resolve the effective config path using the default policy.
///
/// Policy:
/// 1) Use `explicit` when provided.
/// 2) Else use `~/.axlay/config.ron` when it exists.
/// 3) Else return a clear "no config found" error.
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf, Error> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    let preferred = default_config_path();
    if preferred.exists() {
        return Ok(preferred);
    }

    Err(Error::Read {
        path: Some(preferred),
        message: "No config found. Create ~/.axlay/config.ron or pass a path explicitly"
            .to_string(),
    })
}
