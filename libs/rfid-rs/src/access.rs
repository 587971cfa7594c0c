//! Access conditions stored in a MIFARE Classic sector trailer.
//!
//! Each block of a sector has a 3 bit access code `C3 C2 C1`. The trailer stores
//! the codes of all four blocks in bytes 6..=8, every bit once inverted and once
//! plain, so a corrupted trailer can be detected. Byte 9 carries the XOR of the
//! other three.

use core::fmt;

/// Access code of a data block, named after the keys allowed to
/// Read, Write, Increment and Decrement it (A, B, AB or None).
///
/// Bit 0 of the code is C1, bit 1 is C2 and bit 2 is C3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockAccess(u8);

impl BlockAccess {
    pub const ANY_KEY_RWID: BlockAccess = BlockAccess(0b000);
    pub const RAB_WB_IN_DN: BlockAccess = BlockAccess(0b001);
    pub const RAB_WN_IN_DN: BlockAccess = BlockAccess(0b010);
    pub const RAB_WB_IB_DAB: BlockAccess = BlockAccess(0b011);
    pub const RAB_WN_IN_DAB: BlockAccess = BlockAccess(0b100);
    pub const RB_WN_IN_DN: BlockAccess = BlockAccess(0b101);
    pub const RB_WB_IN_DN: BlockAccess = BlockAccess(0b110);
    pub const RN_WN_IN_DN: BlockAccess = BlockAccess(0b111);

    /// Only the low 3 bits are kept.
    pub const fn new(code: u8) -> Self {
        BlockAccess(code & 0b111)
    }

    pub const fn code(self) -> u8 {
        self.0
    }
}

/// Access code of the sector trailer, naming what key A, the access bits and
/// key B may be Read and Written with.
///
/// Bit 0 of the code is C1, bit 1 is C2 and bit 2 is C3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectorTrailerAccess(u8);

impl SectorTrailerAccess {
    pub const KEY_A_RN_WA_BITS_RA_WN_KEY_B_RA_WA: SectorTrailerAccess = SectorTrailerAccess(0b000);
    pub const KEY_A_RN_WB_BITS_RAB_WN_KEY_B_RN_WB: SectorTrailerAccess = SectorTrailerAccess(0b001);
    pub const KEY_A_RN_WN_BITS_RA_WN_KEY_B_RA_WN: SectorTrailerAccess = SectorTrailerAccess(0b010);
    pub const KEY_A_RN_WN_BITS_RAB_WN_KEY_B_RN_WN: SectorTrailerAccess = SectorTrailerAccess(0b011);
    /// The transport configuration of new cards
    pub const KEY_A_RN_WA_BITS_RA_WA_KEY_B_RA_WA: SectorTrailerAccess = SectorTrailerAccess(0b100);
    pub const KEY_A_RN_WN_BITS_RAB_WB_KEY_B_RN_WN: SectorTrailerAccess = SectorTrailerAccess(0b101);
    pub const KEY_A_RN_WB_BITS_RAB_WB_KEY_B_RN_WB: SectorTrailerAccess = SectorTrailerAccess(0b110);
    pub const KEY_A_RN_WN_BITS_RAB_WN_KEY_B_RN_WN_EXTRA: SectorTrailerAccess =
        SectorTrailerAccess(0b111);

    /// Only the low 3 bits are kept.
    pub const fn new(code: u8) -> Self {
        SectorTrailerAccess(code & 0b111)
    }

    pub const fn code(self) -> u8 {
        self.0
    }
}

/// Access codes of the three data blocks and the trailer of one sector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlocksAccess {
    pub b0: BlockAccess,
    pub b1: BlockAccess,
    pub b2: BlockAccess,
    pub b3: SectorTrailerAccess,
}

impl BlocksAccess {
    /// Bit `n - 1` of every block's code, packed as `b3 b2 b1 b0`.
    fn get_bit(&self, n: u8) -> u8 {
        let shift = n - 1;
        let bit = |code: u8| (code >> shift) & 1;

        bit(self.b0.code())
            | bit(self.b1.code()) << 1
            | bit(self.b2.code()) << 2
            | bit(self.b3.code()) << 3
    }

    /// Lay the codes out as trailer bytes 6..=9.
    pub fn encode(&self) -> EncodedAccessBytes {
        let (c1, c2, c3) = (self.get_bit(1), self.get_bit(2), self.get_bit(3));

        let byte0 = (!c1 & 0x0F) | ((!c2 & 0x0F) << 4);
        let byte1 = (!c3 & 0x0F) | ((c1 & 0x0F) << 4);
        let byte2 = (c2 & 0x0F) | ((c3 & 0x0F) << 4);

        EncodedAccessBytes([byte0, byte1, byte2, byte0 ^ byte1 ^ byte2])
    }

    /// Recover the codes from trailer bytes 6..=9.
    ///
    /// Only the plain copies in `bytes[1]` and `bytes[2]` are read. When a fourth
    /// byte is present it must be the XOR of the first three.
    pub fn decode(bytes: &[u8]) -> Result<Self, AccessBitsError> {
        if bytes.len() < 3 {
            return Err(AccessBitsError::Length(bytes.len()));
        }
        if let Some(&check) = bytes.get(3) {
            let expected = bytes[0] ^ bytes[1] ^ bytes[2];
            if check != expected {
                return Err(AccessBitsError::Check { expected, actual: check });
            }
        }

        Ok(Self::from_plain_bits(bytes[1], bytes[2]))
    }

    // C1 sits in the high nibble of byte 1, C2 and C3 in the nibbles of byte 2
    fn from_plain_bits(b1: u8, b2: u8) -> Self {
        let code = |block: u8| {
            (b1 >> (4 + block)) & 1 | ((b2 >> block) & 1) << 1 | ((b2 >> (4 + block)) & 1) << 2
        };

        BlocksAccess {
            b0: BlockAccess::new(code(0)),
            b1: BlockAccess::new(code(1)),
            b2: BlockAccess::new(code(2)),
            b3: SectorTrailerAccess::new(code(3)),
        }
    }
}

/// The 4 access bytes of a sector trailer.
///
/// Values built by [BlocksAccess::encode] always satisfy
/// `bytes[3] == bytes[0] ^ bytes[1] ^ bytes[2]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodedAccessBytes([u8; 4]);

impl EncodedAccessBytes {
    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    pub fn decode(&self) -> BlocksAccess {
        BlocksAccess::from_plain_bits(self.0[1], self.0[2])
    }
}

impl TryFrom<[u8; 4]> for EncodedAccessBytes {
    type Error = AccessBitsError;

    fn try_from(bytes: [u8; 4]) -> Result<Self, Self::Error> {
        BlocksAccess::decode(&bytes)?;
        Ok(EncodedAccessBytes(bytes))
    }
}

impl From<EncodedAccessBytes> for [u8; 4] {
    fn from(bytes: EncodedAccessBytes) -> Self {
        bytes.0
    }
}

/// Malformed access bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessBitsError {
    /// Fewer than the 3 bytes carrying the codes
    Length(usize),
    /// The fourth byte is not the XOR of the first three
    Check { expected: u8, actual: u8 },
}

impl fmt::Display for AccessBitsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessBitsError::Length(len) => write!(f, "{} access bytes, expected at least 3", len),
            AccessBitsError::Check { expected, actual } => write!(
                f,
                "access check byte {:#04x}, expected {:#04x}",
                actual, expected
            ),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for AccessBitsError {}
