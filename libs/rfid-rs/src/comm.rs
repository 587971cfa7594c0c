//! Register bus access to the RC522.
//!
//! Every access to the chip is a fixed 2 byte half-duplex frame: an address byte
//! followed by a data byte. The byte clocked out by the chip during the data byte
//! is the register value for reads and meaningless for writes.

use embedded_hal::blocking::spi;
use embedded_hal::digital::v2::OutputPin;
use log::trace;

use crate::util::{DummyDelay, DummyNSS};

/// A transport able to exchange one 2 byte register frame with the chip.
pub trait RegisterBus {
    type Error;

    /// Sends `[address, data]` and returns the byte the chip sent back during `data`.
    fn transfer_frame(&mut self, address: u8, data: u8) -> Result<u8, Self::Error>;
}

impl<B: RegisterBus + ?Sized> RegisterBus for &mut B {
    type Error = B::Error;

    fn transfer_frame(&mut self, address: u8, data: u8) -> Result<u8, Self::Error> {
        (**self).transfer_frame(address, data)
    }
}

/// SPI register bus built on the embedded-hal blocking `Transfer` trait.
pub struct SpiInterface<SPI, NSS, D> {
    spi: SPI,
    nss: NSS,
    delay: D,
}

impl<SPI> SpiInterface<SPI, DummyNSS, DummyDelay>
where
    SPI: spi::Transfer<u8>,
{
    /// Create a new SPI bus.
    ///
    /// The resulting bus will use a *dummy* NSS pin and expects the
    /// actual chip-select to be controlled by hardware.
    ///
    /// Use the [with_nss](SpiInterface::with_nss) method to add a software controlled NSS pin.
    pub fn new(spi: SPI) -> Self {
        SpiInterface {
            spi,
            nss: DummyNSS,
            delay: DummyDelay,
        }
    }
}

impl<SPI, D> SpiInterface<SPI, DummyNSS, D> {
    /// Add a software controlled chip-select/NSS pin used around every frame.
    pub fn with_nss<NSS: OutputPin>(self, nss: NSS) -> SpiInterface<SPI, NSS, D> {
        SpiInterface {
            spi: self.spi,
            nss,
            delay: self.delay,
        }
    }
}

impl<SPI, NSS> SpiInterface<SPI, NSS, DummyDelay> {
    /// Add a delay function to be called after each frame.
    ///
    /// The RC522 needs NSS de-asserted for at least 50ns between frames, which
    /// optimized builds on fast hosts can violate.
    pub fn with_delay<D: FnMut()>(self, delay: D) -> SpiInterface<SPI, NSS, D> {
        SpiInterface {
            spi: self.spi,
            nss: self.nss,
            delay,
        }
    }
}

impl<SPI, NSS, D> SpiInterface<SPI, NSS, D> {
    /// Release the underlying SPI device and NSS pin
    pub fn release(self) -> (SPI, NSS) {
        (self.spi, self.nss)
    }
}

impl<SPI, NSS, D> RegisterBus for SpiInterface<SPI, NSS, D>
where
    SPI: spi::Transfer<u8>,
    Self: WithNssDelay,
{
    type Error = SPI::Error;

    fn transfer_frame(&mut self, address: u8, data: u8) -> Result<u8, Self::Error> {
        let mut frame = [address, data];
        let response = self.with_nss_low(|bus| bus.spi.transfer(&mut frame).map(|rx| rx[1]))?;
        trace!("frame [{:#04x}, {:#04x}] -> {:#04x}", address, data, response);
        Ok(response)
    }
}

/// Wraps a frame in the chip-select and delay handling configured on the bus.
pub trait WithNssDelay {
    fn with_nss_low<F, T>(&mut self, f: F) -> T
    where
        F: FnOnce(&mut Self) -> T;
}

#[doc(hidden)]
impl<SPI> WithNssDelay for SpiInterface<SPI, DummyNSS, DummyDelay> {
    fn with_nss_low<F, T>(&mut self, f: F) -> T
    where
        F: FnOnce(&mut Self) -> T,
    {
        f(self)
    }
}

#[doc(hidden)]
impl<SPI, D> WithNssDelay for SpiInterface<SPI, DummyNSS, D>
where
    D: FnMut(),
{
    fn with_nss_low<F, T>(&mut self, f: F) -> T
    where
        F: FnOnce(&mut Self) -> T,
    {
        let result = f(self);
        (self.delay)();

        result
    }
}

#[doc(hidden)]
impl<SPI, NSS> WithNssDelay for SpiInterface<SPI, NSS, DummyDelay>
where
    NSS: OutputPin,
{
    fn with_nss_low<F, T>(&mut self, f: F) -> T
    where
        F: FnOnce(&mut Self) -> T,
    {
        // a stuck chip-select shows up as a bus error on the frame itself
        self.nss.set_low().ok();
        let result = f(self);
        self.nss.set_high().ok();

        result
    }
}

#[doc(hidden)]
impl<SPI, NSS, D> WithNssDelay for SpiInterface<SPI, NSS, D>
where
    NSS: OutputPin,
    D: FnMut(),
{
    fn with_nss_low<F, T>(&mut self, f: F) -> T
    where
        F: FnOnce(&mut Self) -> T,
    {
        self.nss.set_low().ok();
        let result = f(self);
        self.nss.set_high().ok();
        (self.delay)();

        result
    }
}
