/// Registers of the RC522, the Proximity Coupling Device (PCD) driven by this crate.
///
/// Only the registers the driver touches are listed. Every address fits in 6 bits;
/// the direction of an access is carried by the high bit of the address byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Register {
    CommandReg = 0x01,
    ComIEnReg = 0x02,
    ComIrqReg = 0x04,
    DivIrqReg = 0x05,
    ErrorReg = 0x06,
    Status2Reg = 0x08,
    FIFODataReg = 0x09,
    FIFOLevelReg = 0x0A,
    ControlReg = 0x0C,
    BitFramingReg = 0x0D,
    ModeReg = 0x11,
    TxControlReg = 0x14,
    TxASKReg = 0x15,
    CRCResultRegHigh = 0x21,
    CRCResultRegLow = 0x22,
    RFCfgReg = 0x26,
    TModeReg = 0x2A,
    TPrescalerReg = 0x2B,
    TReloadRegHigh = 0x2C,
    TReloadRegLow = 0x2D,
    VersionReg = 0x37,
}

impl From<Register> for u8 {
    #[inline(always)]
    fn from(variant: Register) -> Self {
        variant as _
    }
}

const R: u8 = 1 << 7;

impl Register {
    /// Address byte of a read frame.
    pub fn read_address(&self) -> u8 {
        self.write_address() | R
    }

    /// Address byte of a write frame.
    pub fn write_address(&self) -> u8 {
        ((*self as u8) << 1) & 0x7E
    }
}

/// Commands understood by the RC522 command register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    Idle = 0x00,
    CalcCRC = 0x03,
    Transceive = 0x0C,
    MFAuthent = 0x0E,
    SoftReset = 0x0F,
}

impl From<Command> for u8 {
    #[inline(always)]
    fn from(variant: Command) -> Self {
        variant as _
    }
}

// CommandReg
pub const POWER_DOWN: u8 = 1 << 4;

// ComIEnReg / ComIrqReg
pub const IRQ_SET: u8 = 1 << 7;
pub const RX_IRQ: u8 = 1 << 5;
pub const IDLE_IRQ: u8 = 1 << 4;
pub const TIMER_IRQ: u8 = 1 << 0;

// DivIrqReg
pub const CRC_IRQ: u8 = 1 << 2;

// ErrorReg: WrErr, TempErr and CRCErr are not fatal for this driver
pub const BUFFER_OVFL: u8 = 1 << 4;
pub const COLL_ERR: u8 = 1 << 3;
pub const PARITY_ERR: u8 = 1 << 1;
pub const PROTOCOL_ERR: u8 = 1 << 0;
pub const FATAL_ERR: u8 = BUFFER_OVFL | COLL_ERR | PARITY_ERR | PROTOCOL_ERR;

// Status2Reg
pub const MF_CRYPTO1_ON: u8 = 1 << 3;

// FIFOLevelReg
pub const FLUSH_BUFFER: u8 = 1 << 7;

// BitFramingReg
pub const START_SEND: u8 = 1 << 7;

// ControlReg
pub const RX_LAST_BITS: u8 = 0b0111;

// TxControlReg
pub const TX_RF_EN: u8 = 0b11;

// TxASKReg
pub const FORCE_100_ASK: u8 = 1 << 6;

// RFCfgReg
pub const RX_GAIN_MASK: u8 = 0b0111 << 4;
