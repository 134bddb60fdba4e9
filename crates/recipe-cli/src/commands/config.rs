use anyhow::{Context, Result};
use recipe_core::config::SyncConfig;
use recipe_infrastructure::ConfigService;

pub fn show(config: &SyncConfig) -> Result<()> {
    let rendered = toml::to_string_pretty(config).context("Failed to render configuration")?;
    print!("{}", rendered);
    Ok(())
}

pub fn path(configs: &ConfigService) -> Result<()> {
    println!("{}", configs.config_path()?.display());
    Ok(())
}
