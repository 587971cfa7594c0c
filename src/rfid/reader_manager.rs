use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use linux_embedded_hal::spidev::{SpiModeFlags, SpidevOptions};
use linux_embedded_hal::sysfs_gpio::Direction;
use linux_embedded_hal::Spidev;
use log::{error, info, warn};
use rc522::error::Error as Rc522Error;
use rc522::{
    AuthMode, Block, CardSession, CardUid, MifareKey, Rc522, RegisterBus, SpiInterface, WaitError,
};

use crate::config::setup::ReaderConfiguration;
use crate::rfid::irq::{export_pin, SysfsIrqLine};

// A card left on the reader is read again after this
const CARD_COOLDOWN: Duration = Duration::from_millis(250);

/// Outcome of a card entering the field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardEvent {
    Read {
        uid: CardUid,
        sector: u8,
        block: u8,
        data: Block,
    },
    Failed(String),
}

/// Block read on every card
#[derive(Debug, Clone, Copy)]
struct ReadTarget {
    mode: AuthMode,
    key: MifareKey,
    sector: u8,
    block: u8,
}

pub struct ReaderManager {
    device_configuration: ReaderConfiguration,
    events: Sender<CardEvent>,
    term_received: Arc<AtomicBool>,
}

impl ReaderManager {
    pub fn new(
        device_configuration: ReaderConfiguration,
        events: Sender<CardEvent>,
        term_received: Arc<AtomicBool>,
    ) -> ReaderManager {
        ReaderManager {
            device_configuration,
            events,
            term_received,
        }
    }

    /// Run the reader on its own thread, restarting it after failures.
    pub fn start(self) -> JoinHandle<()> {
        thread::spawn(move || {
            let retrys = self.device_configuration.rfid_retrys;
            let retry_delay = Duration::from_secs(self.device_configuration.retry_delay_secs);

            for i in 0..retrys {
                info!("Starting rfid reader ({} of {})", i, retrys - 1);
                match self.run_reader() {
                    Ok(()) => return,
                    Err(e) => error!("Rfid reader failed: {:?}", e),
                }

                if self.term_received.load(Ordering::SeqCst) {
                    return;
                }
                error!("Waiting {:?} then restarting the rfid reader", retry_delay);
                thread::sleep(retry_delay);
            }
            error!("Rfid reader not found.");
        })
    }

    fn run_reader(&self) -> Result<()> {
        let config = &self.device_configuration;
        let target = ReadTarget {
            mode: config.auth_mode.into(),
            key: config.key()?,
            sector: config.read_sector,
            block: config.read_block,
        };

        let mut spi = Spidev::open(&config.spi_device)
            .with_context(|| format!("Failed to open {}", config.spi_device))?;
        let options = SpidevOptions::new()
            .max_speed_hz(config.spi_speed_hz)
            .mode(SpiModeFlags::SPI_MODE_0)
            .build();
        spi.configure(&options).context("Failed to configure spi")?;

        // NRSTPD low keeps the chip powered down
        let reset = export_pin(config.reset_pin, Direction::Out)?;
        reset.set_value(1).context("Failed to release reset line")?;

        let mut irq = SysfsIrqLine::open(config.irq_pin)?;

        match config.nss_pin {
            Some(nss_pin) => {
                let nss = export_pin(nss_pin, Direction::Out)?;
                nss.set_value(1).context("Failed to raise chip select")?;
                self.poll_cards(SpiInterface::new(spi).with_nss(nss), &mut irq, target)
            }
            None => self.poll_cards(SpiInterface::new(spi), &mut irq, target),
        }
    }

    fn poll_cards<B>(&self, bus: B, irq: &mut SysfsIrqLine, target: ReadTarget) -> Result<()>
    where
        B: RegisterBus,
        B::Error: Debug + Send + Sync + 'static,
    {
        let mut rc522 = Rc522::new(bus).init().context("Failed to initialize rc522")?;

        let vers = rc522.version()?;
        info!("Rc522 VERSION: 0x{:x}", vers);
        if vers != 0x91 && vers != 0x92 {
            bail!("Unexpected rc522 version 0x{:x}", vers);
        }

        while !self.term_received.load(Ordering::SeqCst) {
            let read = match rc522.wait_and_select(irq) {
                Ok(session) => read_card(session, &target),
                Err(WaitError::Chip(e)) => Err(e),
                Err(e @ WaitError::Irq(_)) => return Err(e.into()),
            };

            let event = match read {
                Ok(event) => event,
                Err(e) => {
                    warn!("Failed to read card: {}", e);
                    CardEvent::Failed(e.to_string())
                }
            };

            if self.events.send(event).is_err() {
                info!("Event receiver gone, stopping rfid reader");
                break;
            }
            thread::sleep(CARD_COOLDOWN);
        }
        Ok(())
    }
}

fn read_card<B: RegisterBus>(
    mut session: CardSession<'_, B>,
    target: &ReadTarget,
) -> Result<CardEvent, Rc522Error<B::Error>> {
    let uid = *session.uid();
    info!("UID: {}", uid);

    session.authenticate(target.mode, target.sector, &target.key)?;
    let data = session.read_data_block(target.sector, target.block)?;
    session.close()?;

    Ok(CardEvent::Read {
        uid,
        sector: target.sector,
        block: target.block,
        data,
    })
}
