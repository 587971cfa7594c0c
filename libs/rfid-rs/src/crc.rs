use crate::register::*;
use crate::{Error, RegisterBus, Rc522, State};

/// Polls of DivIrqReg before the CRC coprocessor is declared stuck
pub(crate) const CRC_POLLS: usize = 255;

impl<B: RegisterBus, S: State> Rc522<B, S> {
    /// CRC_A of `data` as computed by the coprocessor, least significant byte first.
    pub(crate) fn calculate_crc(&mut self, data: &[u8]) -> Result<[u8; 2], Error<B::Error>> {
        self.clear_bits(Register::DivIrqReg, CRC_IRQ)?;
        self.fifo_flush()?;

        for byte in data {
            self.write(Register::FIFODataReg, *byte)?;
        }

        self.command(Command::CalcCRC)?;

        for _ in 0..CRC_POLLS {
            if self.read(Register::DivIrqReg)? & CRC_IRQ != 0 {
                return Ok([
                    self.read(Register::CRCResultRegLow)?,
                    self.read(Register::CRCResultRegHigh)?,
                ]);
            }
        }
        Err(Error::CrcTimeout)
    }

    /// `frame` followed by its CRC_A.
    pub(crate) fn with_crc<const N: usize>(
        &mut self,
        frame: &[u8],
    ) -> Result<heapless::Vec<u8, N>, Error<B::Error>> {
        let crc = self.calculate_crc(frame)?;
        let mut out = heapless::Vec::new();
        // callers size N as frame.len() + 2
        out.extend_from_slice(frame).ok();
        out.extend_from_slice(&crc).ok();
        Ok(out)
    }
}
