use core::time::Duration;

use log::trace;

use crate::register::*;
use crate::{picc, CardSession, Error, Initialized, Rc522, RegisterBus, WaitError};

/// How long one REQA stays armed before it is sent again
pub const CARD_POLL_INTERVAL: Duration = Duration::from_millis(100);

// IRqInv and RxIEn: the IRQ pin goes low once a card answers
const CARD_IRQ_ENABLE: u8 = IRQ_SET | RX_IRQ;
// StartSend with a 7 bit short frame
const REQA_FRAMING: u8 = START_SEND | 0x07;

/// The GPIO line wired to the RC522 IRQ pin.
pub trait IrqLine {
    type Error;
    type Watch: EdgeWatch<Error = Self::Error>;

    /// Start reporting falling edges of the line.
    ///
    /// Edges are reported until the returned watch is dropped.
    fn watch_falling_edge(&mut self) -> Result<Self::Watch, Self::Error>;
}

/// A registered edge watch. Dropping it stops the reporting.
pub trait EdgeWatch {
    type Error;

    /// Block until an edge was reported or `timeout` elapsed.
    ///
    /// Returns `false` on timeout.
    fn wait(&mut self, timeout: Duration) -> Result<bool, Self::Error>;
}

impl<B: RegisterBus> Rc522<B, Initialized> {
    /// Blocks until a card in the field answers a REQA.
    ///
    /// The chip sends a REQA every [CARD_POLL_INTERVAL] and pulls the IRQ line
    /// low on any answer. There is no upper bound on the wait.
    pub fn wait_for_card<I: IrqLine>(
        &mut self,
        irq: &mut I,
    ) -> Result<(), WaitError<B::Error, I::Error>> {
        let mut watch = irq.watch_falling_edge().map_err(WaitError::Irq)?;

        self.init()?;
        self.enable_card_irq()?;

        loop {
            self.arm_reqa()?;
            if watch.wait(CARD_POLL_INTERVAL).map_err(WaitError::Irq)? {
                trace!("irq edge, card in field");
                return Ok(());
            }
        }
    }

    /// [wait_for_card](Rc522::wait_for_card) followed by
    /// [select_card](Rc522::select_card).
    pub fn wait_and_select<I: IrqLine>(
        &mut self,
        irq: &mut I,
    ) -> Result<CardSession<'_, B>, WaitError<B::Error, I::Error>> {
        self.wait_for_card(irq)?;
        Ok(self.select_card()?)
    }

    fn enable_card_irq(&mut self) -> Result<(), Error<B::Error>> {
        self.write(Register::ComIrqReg, 0x00)?;
        self.write(Register::ComIEnReg, CARD_IRQ_ENABLE)?;
        Ok(())
    }

    fn arm_reqa(&mut self) -> Result<(), Error<B::Error>> {
        self.write(Register::FIFODataReg, picc::Command::ReqA.into())?;
        self.command(Command::Transceive)?;
        self.write(Register::BitFramingReg, REQA_FRAMING)?;
        Ok(())
    }
}
