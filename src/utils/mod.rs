pub mod http;
pub mod subprocess;
pub mod truncation;

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Root for websearch's own files: `$WEBSEARCH_HOME`, else `~/.websearch`.
pub fn get_websearch_home() -> Result<PathBuf> {
    if let Some(home) = std::env::var_os("WEBSEARCH_HOME") {
        return Ok(PathBuf::from(home));
    }
    Ok(dirs::home_dir()
        .context("Could not determine home directory")?
        .join(".websearch"))
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(path)
}
