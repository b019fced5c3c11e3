use std::{io, path::PathBuf, result::Result as StdResult};

use thiserror::Error;

/// Convenient result type for the tree crate.
pub type Result<T> = StdResult<T, Error>;

/// Errors raised while loading a tree description.
#[derive(Debug, Error)]
pub enum Error {
    /// The description file could not be read.
    #[error("reading tree dump {}: {source}", path.display())]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying failure.
        #[source]
        source: io::Error,
    },

    /// The description is not valid JSON for a node tree.
    #[error("parsing tree dump: {0}")]
    Parse(#[from] serde_json::Error),
}
