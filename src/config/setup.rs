use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use rc522::{AuthMode, MifareKey};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which sector key the reader authenticates with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum KeyType {
    KeyA,
    KeyB,
}

impl From<KeyType> for AuthMode {
    fn from(key_type: KeyType) -> Self {
        match key_type {
            KeyType::KeyA => AuthMode::KeyA,
            KeyType::KeyB => AuthMode::KeyB,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ReaderConfiguration {
    pub device_uuid: String,
    pub spi_device: String,
    pub spi_speed_hz: u32,
    pub reset_pin: u64,
    pub irq_pin: u64,
    /// Software chip select, `None` when the SPI controller drives it
    pub nss_pin: Option<u64>,
    pub rfid_retrys: u32,
    pub retry_delay_secs: u64,
    pub read_sector: u8,
    pub read_block: u8,
    /// 6 bytes as hex, separators allowed
    pub auth_key: String,
    pub auth_mode: KeyType,
}

impl Default for ReaderConfiguration {
    fn default() -> Self {
        ReaderConfiguration::new()
    }
}

impl ReaderConfiguration {
    pub fn new() -> ReaderConfiguration {
        ReaderConfiguration {
            device_uuid: Uuid::new_v4().to_string(),
            spi_device: "/dev/spidev0.0".to_owned(),
            spi_speed_hz: 1_000_000,
            reset_pin: 25,
            irq_pin: 24,
            nss_pin: Some(22),
            rfid_retrys: 5,
            retry_delay_secs: 5,
            read_sector: 1,
            read_block: 0,
            auth_key: "FFFFFFFFFFFF".to_owned(),
            auth_mode: KeyType::KeyA,
        }
    }

    /// Read the configuration at `path`, writing the defaults there first if
    /// the file does not exist yet.
    pub fn load(path: &Path) -> Result<ReaderConfiguration> {
        if !path.is_file() {
            let device_config = ReaderConfiguration::new();
            device_config.save(path)?;
            return Ok(device_config);
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Unable to read config {}", path.display()))?;
        let device_config: ReaderConfiguration = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        device_config.key()?;

        // logging is not up yet
        println!("Config file read: {:?}", device_config);
        Ok(device_config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent_dir) = path.parent() {
            if !parent_dir.as_os_str().is_empty() && !parent_dir.is_dir() {
                fs::create_dir_all(parent_dir).with_context(|| {
                    format!("Failed to create config dir {}", parent_dir.display())
                })?;
            }
        }

        let serialized_yaml = serde_yaml::to_string(self)?;
        fs::write(path, serialized_yaml)
            .with_context(|| format!("Unable to write config {}", path.display()))?;
        println!("Config file created: {}", path.display());
        Ok(())
    }

    pub fn key(&self) -> Result<MifareKey> {
        parse_key(&self.auth_key)
    }
}

/// Parse a MIFARE key written as 12 hex digits, optionally split by spaces,
/// colons or dashes.
pub fn parse_key(text: &str) -> Result<MifareKey> {
    let digits: Vec<char> = text
        .chars()
        .filter(|c| !matches!(c, ' ' | ':' | '-'))
        .collect();
    if digits.len() != 12 {
        bail!("auth_key needs 12 hex digits, got {:?}", text);
    }
    if !digits.iter().all(char::is_ascii_hexdigit) {
        bail!("auth_key {:?} is not hex", text);
    }

    let mut key = [0u8; 6];
    for (byte, pair) in key.iter_mut().zip(digits.chunks(2)) {
        let pair: String = pair.iter().collect();
        *byte = u8::from_str_radix(&pair, 16)
            .with_context(|| format!("auth_key {:?} is not hex", text))?;
    }
    Ok(key)
}
