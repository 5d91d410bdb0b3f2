mod config;
pub mod kv;
pub mod migrations;
mod state;

pub use config::Config;
pub use kv::{KvBackend, MemoryKv, SqliteKv};
pub use state::{keys, PromptStore, StateSnapshot};

use std::path::PathBuf;

/// Returns the directory holding `config.toml` and `rategate.db`.
///
/// `RATEGATE_DATA_DIR` overrides the location entirely. Otherwise this is
/// `~/.config/rategate[-dev]/`, with the `-dev` suffix selected by
/// `RATEGATE_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, std::io::Error> {
    let dir = match std::env::var_os("RATEGATE_DATA_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env = std::env::var("RATEGATE_ENV").unwrap_or_else(|_| "production".to_string());

            if env == "dev" {
                base_dir.join("rategate-dev")
            } else {
                base_dir.join("rategate")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
