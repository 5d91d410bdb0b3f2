pub mod config;
pub mod prompt;
pub mod state;

use rategate_core::{Config, PolicyConfig, PromptStore};

/// Load `config.toml`, validate the policy and open the state store.
pub fn open() -> Result<(Config, PolicyConfig, PromptStore), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let policy = config.policy_config()?;
    let store = PromptStore::open(&config.namespace)?;
    Ok((config, policy, store))
}
