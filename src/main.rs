use std::path::PathBuf;

use anyhow::Result;
use robosandbox::{
    config::{SandboxConfig, DEFAULT_CONFIG_PATH},
    window,
};

fn main() -> Result<()> {
    pretty_env_logger::init();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let config = SandboxConfig::load(&config_path)?;

    window::run(config)?;

    Ok(())
}
