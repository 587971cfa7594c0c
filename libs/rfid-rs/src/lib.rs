//! Driver library for reading and writing MIFARE Classic cards through the
//! RC522 (MFRC522) contactless communication IC.
//!
//! The RC522 is a *Proximity Coupling Device* (PCD) and communicates with a
//! *Proximity Integrated Circuit Card* (PICC). The driver talks to the RC522
//! through a [RegisterBus], a transport exchanging fixed 2 byte register frames.
//! [SpiInterface] provides one on top of the
//! [embedded-hal](https://docs.rs/embedded-hal/0.2/embedded_hal/) SPI traits.
//!
//! # Quickstart
//! ```ignore
//! let bus = SpiInterface::new(spi).with_nss(cs);
//! let mut rc522 = Rc522::new(bus).init()?;
//!
//! rc522.wait_for_card(&mut irq)?;
//! let mut session = rc522.select_card()?;
//! session.authenticate(AuthMode::KeyA, 1, &DEFAULT_KEY)?;
//! let data = session.read_data_block(1, 0)?;
//! session.close()?;
//! ```
//!
//! Take a look at [Rc522] and [CardSession] for the available operations.

#![cfg_attr(not(any(feature = "std", test)), no_std)]

pub mod access;
pub mod comm;
mod crc;
pub mod error;
mod picc;
mod register;
mod session;
#[cfg(feature = "std")]
pub mod signal;
#[cfg(test)]
mod sim;
mod transceive;
mod util;
mod wait;

use core::marker::PhantomData;

use log::debug;

pub use access::{BlockAccess, BlocksAccess, EncodedAccessBytes, SectorTrailerAccess};
pub use comm::{RegisterBus, SpiInterface, WithNssDelay};
pub use error::{Error, WaitError};
pub use session::{AuthMode, AuthStatus, CardSession, CardUid};
pub use transceive::TransceiveResult;
pub use util::{DummyDelay, DummyNSS};
pub use wait::{EdgeWatch, IrqLine, CARD_POLL_INTERVAL};

use register::*;
use util::Sealed;

const MIFARE_KEYSIZE: usize = 6;
pub type MifareKey = [u8; MIFARE_KEYSIZE];

/// Factory default key of MIFARE Classic cards
pub const DEFAULT_KEY: MifareKey = [0xFF; MIFARE_KEYSIZE];

/// Size of a MIFARE Classic block in bytes
pub const BLOCK_SIZE: usize = 16;
pub type Block = [u8; BLOCK_SIZE];

// Poll bound while waiting for the PowerDown bit to clear after a soft reset
const RESET_POLLS: usize = 2000;

/// Implemented by the different states of the RC522 driver.
///
/// This trait cannot be implemented outside of this crate.
pub trait State: Sealed {}

/// The RC522 driver starts in this state and needs to be initialized before it can be used.
pub enum Uninitialized {}
/// The RC522 driver is ready for use.
pub enum Initialized {}

impl State for Uninitialized {}
impl State for Initialized {}
impl Sealed for Uninitialized {}
impl Sealed for Initialized {}

/// RC522 driver
///
/// Owns the register bus exclusively; no other code may talk to the chip while
/// the driver is alive.
pub struct Rc522<B, S: State> {
    bus: B,
    authenticated: bool,
    state: PhantomData<S>,
}

impl<B: RegisterBus> Rc522<B, Uninitialized> {
    /// Create a new driver on top of a register bus.
    pub fn new(bus: B) -> Self {
        Rc522 {
            bus,
            authenticated: false,
            state: PhantomData,
        }
    }

    /// Soft reset and configure the RC522.
    ///
    /// This needs to be called before you can do any other operation.
    pub fn init(self) -> Result<Rc522<B, Initialized>, Error<B::Error>> {
        let mut rc522 = Rc522 {
            bus: self.bus,
            authenticated: false,
            state: PhantomData,
        };
        rc522.soft_reset()?;
        rc522.configure()?;

        Ok(rc522)
    }
}

impl<B: RegisterBus> Rc522<B, Initialized> {
    /// Perform a software reset, forgetting any authentication.
    ///
    /// All registers return to their defaults; call [init](Rc522::init) afterwards.
    pub fn reset(&mut self) -> Result<(), Error<B::Error>> {
        self.soft_reset()
    }

    /// Program timer, modulation and CRC preset, then switch the antenna on.
    pub fn init(&mut self) -> Result<(), Error<B::Error>> {
        self.configure()
    }
}

impl<B: RegisterBus, S: State> Rc522<B, S> {
    /// Release the underlying register bus
    pub fn release(self) -> B {
        self.bus
    }

    // lowest level API

    pub(crate) fn read(&mut self, reg: Register) -> Result<u8, B::Error> {
        self.bus.transfer_frame(reg.read_address(), 0)
    }

    pub(crate) fn write(&mut self, reg: Register, val: u8) -> Result<(), B::Error> {
        self.bus.transfer_frame(reg.write_address(), val)?;
        Ok(())
    }

    pub(crate) fn rmw<F>(&mut self, reg: Register, f: F) -> Result<(), B::Error>
    where
        F: FnOnce(u8) -> u8,
    {
        let byte = self.read(reg)?;
        self.write(reg, f(byte))
    }

    pub(crate) fn set_bits(&mut self, reg: Register, mask: u8) -> Result<(), B::Error> {
        self.rmw(reg, |b| b | mask)
    }

    pub(crate) fn clear_bits(&mut self, reg: Register, mask: u8) -> Result<(), B::Error> {
        self.rmw(reg, |b| b & !mask)
    }

    /// Request to execute the given command
    pub(crate) fn command(&mut self, command: Command) -> Result<(), B::Error> {
        self.write(Register::CommandReg, command.into())
    }

    /// Flush the internal FIFO buffer
    pub(crate) fn fifo_flush(&mut self) -> Result<(), B::Error> {
        self.set_bits(Register::FIFOLevelReg, FLUSH_BUFFER)
    }

    fn soft_reset(&mut self) -> Result<(), Error<B::Error>> {
        self.authenticated = false;
        self.command(Command::SoftReset)?;

        for _ in 0..RESET_POLLS {
            if self.read(Register::CommandReg)? & POWER_DOWN == 0 {
                return Ok(());
            }
        }
        Err(Error::Timeout)
    }

    fn configure(&mut self) -> Result<(), Error<B::Error>> {
        // TAuto=1, prescaler 0xD3E: f_timer = 13.56 MHz / (2 * 3390 + 1) ~ 2 kHz
        self.write(Register::TModeReg, 0x8D)?;
        self.write(Register::TPrescalerReg, 0x3E)?;
        // 30 ticks of 0.5 ms: the chip timer gives up on a silent card after 15 ms
        self.write(Register::TReloadRegLow, 30)?;
        self.write(Register::TReloadRegHigh, 0)?;

        self.write(Register::TxASKReg, FORCE_100_ASK)?;
        // TxWaitRF=1, CRC preset 0x6363 according to ISO 14443-3 part 6.2.4
        self.write(Register::ModeReg, 0x3D)?;

        self.antenna_on()?;
        debug!("rc522 initialized");
        Ok(())
    }

    /// Switch the 13.56 MHz carrier on, unless both TX pins already drive it.
    pub fn antenna_on(&mut self) -> Result<(), Error<B::Error>> {
        let current = self.read(Register::TxControlReg)?;
        if current & TX_RF_EN != TX_RF_EN {
            self.write(Register::TxControlReg, current | TX_RF_EN)?;
        }
        Ok(())
    }

    /// Switch the carrier off. Cards in the field lose power and reset.
    pub fn antenna_off(&mut self) -> Result<(), Error<B::Error>> {
        Ok(self.clear_bits(Register::TxControlReg, TX_RF_EN)?)
    }

    /// Set the receiver gain, `0` (18 dB) to `7` (48 dB). Larger values are clamped.
    pub fn set_antenna_gain(&mut self, gain: u8) -> Result<(), Error<B::Error>> {
        let gain = gain.min(7);
        Ok(self.rmw(Register::RFCfgReg, |b| (b & !RX_GAIN_MASK) | (gain << 4))?)
    }

    /// Returns the version reported by the RC522, `0x91` or `0x92` for genuine parts.
    pub fn version(&mut self) -> Result<u8, Error<B::Error>> {
        Ok(self.read(Register::VersionReg)?)
    }
}
