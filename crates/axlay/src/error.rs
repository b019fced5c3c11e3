use std::io;

use thiserror::Error;

/// Anything a subcommand can fail with.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration could not be resolved, read or validated.
    #[error(transparent)]
    Config(#[from] config::Error),

    /// A tree dump could not be loaded.
    #[error("tree dump: {0}")]
    Tree(#[from] axlay_tree::Error),

    /// The detector could not be started.
    #[error("engine: {0}")]
    Engine(#[from] axlay_engine::Error),

    /// Output could not be serialized.
    #[error("serialize: {0}")]
    Json(#[from] serde_json::Error),

    /// The async runtime failed to start.
    #[error("runtime: {0}")]
    Runtime(#[from] io::Error),
}
