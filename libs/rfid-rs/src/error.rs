use core::fmt;

use crate::access::AccessBitsError;

/// Errors
#[derive(Debug, PartialEq, Eq)]
pub enum Error<E> {
    /// Register bus error
    Bus(E),
    /// The chip did not raise a completion interrupt within the poll bound
    Timeout,
    /// The CRC coprocessor did not report completion within the poll bound
    CrcTimeout,
    /// Fatal bits (buffer overflow, CRC, parity, protocol) set in the error register
    Protocol(u8),
    /// Wrong Block Character Check (BCC) on the anti-collision response
    Checksum { expected: u8, actual: u8 },
    /// The anti-collision response was not 4 UID bytes plus BCC
    UidLength(usize),
    /// No answer to REQA with exactly 16 valid bits
    CardNotPresent { valid_bits: usize },
    /// Transport failure while running MFAuthent
    AuthReadFailure,
    /// The chip rejected the authentication
    AuthFailure,
    /// The card did not acknowledge the write command
    WriteNotAuthorized,
    /// The card did not acknowledge the written data
    WriteFailed,
    /// A block read did not return exactly 16 bytes
    DataLength(usize),
    /// The sector was not authenticated in the current session
    NotAuthenticated { sector: u8 },
    /// The sector number has no 4 block layout
    InvalidSector(u8),
    /// The sector trailer holds malformed access bits
    AccessBits(AccessBitsError),
}

impl<E> From<E> for Error<E> {
    fn from(error: E) -> Self {
        Error::Bus(error)
    }
}

impl<E: fmt::Debug> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Bus(e) => write!(f, "register bus error: {:?}", e),
            Error::Timeout => write!(f, "no completion interrupt after 2000 polls"),
            Error::CrcTimeout => write!(f, "CRC coprocessor not ready after 255 polls"),
            Error::Protocol(bits) => write!(f, "chip reported error bits {:#04x}", bits),
            Error::Checksum { expected, actual } => write!(
                f,
                "UID checksum mismatch, expected {:#04x} actual {:#04x}",
                expected, actual
            ),
            Error::UidLength(len) => write!(f, "anti-collision returned {} bytes, expected 5", len),
            Error::CardNotPresent { valid_bits } => {
                write!(f, "no card answered REQA ({} valid bits)", valid_bits)
            }
            Error::AuthReadFailure => write!(f, "authentication transport failure"),
            Error::AuthFailure => write!(f, "authentication rejected"),
            Error::WriteNotAuthorized => write!(f, "card refused the write command"),
            Error::WriteFailed => write!(f, "card did not acknowledge the written data"),
            Error::DataLength(len) => write!(f, "read returned {} bytes, expected 16", len),
            Error::NotAuthenticated { sector } => write!(f, "sector {} is not authenticated", sector),
            Error::InvalidSector(sector) => write!(f, "sector {} out of range", sector),
            Error::AccessBits(e) => write!(f, "invalid sector trailer: {}", e),
        }
    }
}

#[cfg(feature = "std")]
impl<E> std::error::Error for Error<E> where E: fmt::Debug {}

/// Errors of [`Rc522::wait_for_card`](crate::Rc522::wait_for_card), which touches
/// the interrupt line as well as the register bus.
#[derive(Debug, PartialEq, Eq)]
pub enum WaitError<E, IE> {
    /// Failure talking to the chip
    Chip(Error<E>),
    /// Failure registering or waiting on the interrupt line
    Irq(IE),
}

impl<E, IE> From<Error<E>> for WaitError<E, IE> {
    fn from(error: Error<E>) -> Self {
        WaitError::Chip(error)
    }
}

impl<E: fmt::Debug, IE: fmt::Debug> fmt::Display for WaitError<E, IE> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitError::Chip(e) => write!(f, "{}", e),
            WaitError::Irq(e) => write!(f, "interrupt line error: {:?}", e),
        }
    }
}

#[cfg(feature = "std")]
impl<E, IE> std::error::Error for WaitError<E, IE>
where
    E: fmt::Debug,
    IE: fmt::Debug,
{
}
