mod config;
mod logging;
mod rfid;

use std::env::current_dir;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{error, info, warn};

use crate::config::setup::ReaderConfiguration;
use crate::logging::logging_util::setup_logging;
use crate::rfid::reader_manager::{CardEvent, ReaderManager};

fn main() -> Result<()> {
    let term_received = Arc::new(AtomicBool::new(false));

    // SIGINT and SIGTERM
    let term_received_clone = term_received.clone();
    ctrlc::set_handler(move || {
        term_received_clone.store(true, Ordering::SeqCst);
    })
    .context("Error setting Ctrl-C handler")?;

    let project_dir = current_dir()?;

    let dev_config = ReaderConfiguration::load(&project_dir.join("config/Config.yaml"))?;

    setup_logging(&dev_config)?;
    info!("Starting reader {}", dev_config.device_uuid);

    let (events_tx, events_rx) = channel();
    let _reader = ReaderManager::new(dev_config, events_tx, term_received.clone()).start();

    while !term_received.load(Ordering::SeqCst) {
        match events_rx.recv_timeout(Duration::from_millis(250)) {
            Ok(CardEvent::Read {
                uid,
                sector,
                block,
                data,
            }) => info!("Card {} sector {} block {}: {:02X?}", uid, sector, block, data),
            Ok(CardEvent::Failed(reason)) => warn!("Card read failed: {}", reason),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                error!("Rfid reader stopped");
                break;
            }
        }
    }

    info!("Exiting main loop");
    Ok(())
}
