//! Parse and load user configuration.

use std::{ffi::OsStr, fs, path::Path};

use axlay_protocol::Selector;
use tracing::debug;

use crate::{Config, Error, error::excerpt_at};

/// Source syntax of a configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Rusty Object Notation.
    Ron,
    /// JSON.
    Json,
}

impl Format {
    /// Infer the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(OsStr::to_str) {
            Some("ron") => Some(Self::Ron),
            Some("json") => Some(Self::Json),
            _ => None,
        }
    }
}

/// Load and validate a `Config` from a `.ron` or `.json` file at `path`.
pub fn load_from_path(path: &Path) -> Result<Config, Error> {
    let Some(format) = Format::from_path(path) else {
        return Err(Error::Read {
            path: Some(path.to_path_buf()),
            message: "Unsupported config format (expected a .ron or .json file)".to_string(),
        });
    };
    let source = fs::read_to_string(path).map_err(|e| Error::Read {
        path: Some(path.to_path_buf()),
        message: e.to_string(),
    })?;
    let cfg = load_from_str(&source, format).map_err(|e| e.with_path(path))?;
    debug!(path = %path.display(), rules = cfg.rules.len(), "loaded config");
    Ok(cfg)
}

/// Parse and validate a configuration held in memory.
pub fn load_from_str(source: &str, format: Format) -> Result<Config, Error> {
    let cfg = match format {
        Format::Ron => ron::from_str::<Config>(source).map_err(|e| {
            let (line, col) = (e.span.start.line, e.span.start.col);
            Error::Parse {
                path: None,
                line,
                col,
                message: e.code.to_string(),
                excerpt: excerpt_at(source, line, col),
            }
        })?,
        Format::Json => serde_json::from_str::<Config>(source).map_err(|e| {
            let (line, col) = (e.line(), e.column());
            Error::Parse {
                path: None,
                line,
                col,
                message: e.to_string(),
                excerpt: excerpt_at(source, line, col),
            }
        })?,
    };
    validate(&cfg)?;
    Ok(cfg)
}

/// Reject rules that can never work: missing names or packages, unparseable selectors.
pub fn validate(cfg: &Config) -> Result<(), Error> {
    let invalid = |rule: &str, message: String| Error::Validation {
        path: None,
        rule: Some(rule.to_string()),
        message,
    };
    for (idx, rule) in cfg.rules.iter().enumerate() {
        if rule.name.trim().is_empty() {
            return Err(Error::Validation {
                path: None,
                rule: None,
                message: format!("rule #{} has an empty name", idx + 1),
            });
        }
        let label = rule.name.as_str();
        if rule.package_name.trim().is_empty() {
            return Err(invalid(label, "package_name must not be empty".into()));
        }
        for (list, code) in rule
            .allow
            .iter()
            .map(|c| ("allow", c))
            .chain(rule.deny.iter().map(|c| ("deny", c)))
        {
            if let Err(e) = Selector::parse(code) {
                return Err(invalid(label, format!("{list} selector {code:?}: {e}")));
            }
        }
    }
    if cfg.detection.snapshot_capacity == 0 {
        return Err(Error::Validation {
            path: None,
            rule: None,
            message: "detection.snapshot_capacity must be at least 1".into(),
        });
    }
    Ok(())
}
