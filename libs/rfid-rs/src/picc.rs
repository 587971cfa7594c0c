/// Commands sent to the *Proximity Integrated Circuit Card* (PICC).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    /// REQuest command, Type A. Invites PICCs in state IDLE to go to READY.
    ReqA = 0x26,
    /// Anti collision/Select, Cascade Level 1
    SelCl1 = 0x93,
    /// MIFARE read of one 16 byte block
    MfRead = 0x30,
    /// MIFARE write of one 16 byte block
    MfWrite = 0xA0,
}

impl From<Command> for u8 {
    #[inline(always)]
    fn from(variant: Command) -> Self {
        variant as _
    }
}

/// NVB of the anti-collision frame: 2 bytes sent, no UID bits known yet.
pub const NVB_ANTICOLLISION: u8 = 0x20;
/// NVB of the select frame: 7 bytes sent (command, NVB, 4 UID bytes, BCC).
pub const NVB_SELECT: u8 = 0x70;

/// MIFARE acknowledge nibble
pub const MIFARE_ACK: u8 = 0xA;
