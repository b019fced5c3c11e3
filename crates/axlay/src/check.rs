use std::path::Path;

use config::{load_from_path, resolve_config_path};

use crate::error::CliError;

/// Validate the config at `explicit` (or the default location), optionally dumping it.
pub fn run(explicit: Option<&Path>, dump: bool) -> Result<(), CliError> {
    let resolved = resolve_config_path(explicit)?;
    let cfg = load_from_path(&resolved)?;
    if dump {
        println!("{}", serde_json::to_string_pretty(&cfg)?);
    } else {
        println!("OK");
    }
    Ok(())
}
