use anyhow::{Context, Result};
use log4rs::config::RawConfig;

use crate::config::setup::ReaderConfiguration;

/// Log configuration with `{device_id}` still to be filled in
const LOG_CONFIG: &str = include_str!("../../config/log4rs.yaml");

fn render_config(device_config: &ReaderConfiguration) -> Result<RawConfig> {
    let config_str = LOG_CONFIG.replace("{device_id}", &device_config.device_uuid);
    serde_yaml::from_str(&config_str).context("Invalid log4rs configuration")
}

pub fn setup_logging(device_config: &ReaderConfiguration) -> Result<()> {
    let config = render_config(device_config)?;
    log4rs::init_raw_config(config).context("Failed to initialize logging")?;

    Ok(())
}
