use heapless::Vec;
use log::debug;

use crate::register::*;
use crate::{Error, RegisterBus, Rc522, State};

/// Polls of ComIrqReg before a command is declared lost
pub(crate) const COMMAND_POLLS: usize = 2000;
/// Largest number of bytes drained from the FIFO after a transceive
pub(crate) const MAX_RX_BYTES: usize = 16;

/// Bytes received from a PICC
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransceiveResult {
    /// Bytes drained from the FIFO
    pub data: Vec<u8, MAX_RX_BYTES>,
    /// Valid bits across all of `data`; the last byte may be partial
    pub valid_bits: usize,
}

impl TransceiveResult {
    /// Number of bytes received
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl<B: RegisterBus, S: State> Rc522<B, S> {
    /// Load `tx` into the FIFO, run `command` and collect what the chip received.
    ///
    /// Only [Command::Transceive] starts an RF transmission and yields data;
    /// other commands return an empty result once they complete.
    pub(crate) fn execute(
        &mut self,
        command: Command,
        tx: &[u8],
    ) -> Result<TransceiveResult, Error<B::Error>> {
        let (irq_enable, irq_wait) = match command {
            Command::MFAuthent => (0x12, IDLE_IRQ),
            Command::Transceive => (0x77, RX_IRQ | IDLE_IRQ),
            _ => (0x00, 0x00),
        };

        self.write(Register::ComIEnReg, irq_enable | IRQ_SET)?;
        self.clear_bits(Register::ComIrqReg, IRQ_SET)?;
        self.fifo_flush()?;
        // stop any ongoing command before loading the FIFO
        self.command(Command::Idle)?;

        for byte in tx {
            self.write(Register::FIFODataReg, *byte)?;
        }

        self.command(command)?;

        if command == Command::Transceive {
            self.set_bits(Register::BitFramingReg, START_SEND)?;
        }

        // The chip timer fires TimerIRq when a card stays silent, so a missing
        // card ends the wait long before the bound is reached.
        let completed = self.poll_completion(irq_wait | TIMER_IRQ);
        let stopped = self.clear_bits(Register::BitFramingReg, START_SEND);

        let polls = completed?;
        stopped?;
        if polls.is_none() {
            debug!("{:?} did not complete after {} polls", command, COMMAND_POLLS);
            return Err(Error::Timeout);
        }

        let error = self.read(Register::ErrorReg)? & FATAL_ERR;
        if error != 0 {
            debug!("{:?} failed with error bits {:#04x}", command, error);
            return Err(Error::Protocol(error));
        }

        let mut result = TransceiveResult::default();
        if command == Command::Transceive {
            let level = self.read(Register::FIFOLevelReg)? as usize;
            let last_bits = (self.read(Register::ControlReg)? & RX_LAST_BITS) as usize;

            result.valid_bits = match (level, last_bits) {
                (0, _) => 0,
                (n, 0) => n * 8,
                (n, bits) => (n - 1) * 8 + bits,
            };

            for _ in 0..level.clamp(1, MAX_RX_BYTES) {
                let byte = self.read(Register::FIFODataReg)?;
                // cannot overflow, the loop is bounded by the capacity
                result.data.push(byte).ok();
            }
        }

        Ok(result)
    }

    /// Busy-polls ComIrqReg until any bit of `mask` is set.
    ///
    /// Returns the number of polls it took, `None` when the bound ran out.
    fn poll_completion(&mut self, mask: u8) -> Result<Option<usize>, B::Error> {
        for poll in 0..COMMAND_POLLS {
            if self.read(Register::ComIrqReg)? & mask != 0 {
                return Ok(Some(poll));
            }
        }
        Ok(None)
    }
}
