use core::fmt;

use log::{debug, warn};

use crate::access::BlocksAccess;
use crate::picc;
use crate::register::*;
use crate::transceive::TransceiveResult;
use crate::util::bcc;
use crate::{Block, Error, Initialized, MifareKey, Rc522, RegisterBus, BLOCK_SIZE};

// Sectors 0..32 have 4 blocks on every MIFARE Classic variant
const FOUR_BLOCK_SECTORS: u8 = 32;
const TRAILER_BLOCK: u8 = 3;

/// Single size UID of a MIFARE Classic card.
///
/// The BCC byte received during anti-collision is checked and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CardUid([u8; 4]);

impl CardUid {
    pub fn new(bytes: [u8; 4]) -> Self {
        CardUid(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    /// Block Check Character sent along the UID in select frames
    pub fn bcc(&self) -> u8 {
        bcc(&self.0)
    }
}

impl fmt::Display for CardUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.0;
        write!(f, "{:02X}:{:02X}:{:02X}:{:02X}", a, b, c, d)
    }
}

/// Key used by MFAuthent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AuthMode {
    KeyA = 0x60,
    KeyB = 0x61,
}

impl From<AuthMode> for u8 {
    #[inline(always)]
    fn from(variant: AuthMode) -> Self {
        variant as _
    }
}

/// Outcome of an authentication attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    /// MFAuthent completed and the Crypto1 flag is clear
    Ok,
    /// MFAuthent did not complete or the register bus failed
    ReadFailure,
    /// MFAuthent completed but the chip flagged the Crypto1 unit
    Failure,
}

impl AuthStatus {
    pub fn into_result<E>(self) -> Result<(), Error<E>> {
        match self {
            AuthStatus::Ok => Ok(()),
            AuthStatus::ReadFailure => Err(Error::AuthReadFailure),
            AuthStatus::Failure => Err(Error::AuthFailure),
        }
    }
}

fn block_address<E>(sector: u8, block: u8) -> Result<u8, Error<E>> {
    if sector >= FOUR_BLOCK_SECTORS {
        return Err(Error::InvalidSector(sector));
    }
    Ok(sector * 4 + block)
}

/// Address of data block `block % 3` of `sector`.
fn data_address<E>(sector: u8, block: u8) -> Result<u8, Error<E>> {
    block_address(sector, block % 3)
}

fn trailer_address<E>(sector: u8) -> Result<u8, Error<E>> {
    block_address(sector, TRAILER_BLOCK)
}

fn is_ack(rx: &TransceiveResult) -> bool {
    rx.valid_bits == 4 && rx.data.first().map_or(false, |b| b & 0x0F == picc::MIFARE_ACK)
}

// Card facing operations, one frame exchange each.
impl<B: RegisterBus> Rc522<B, Initialized> {
    /// Sends a REQuest type A to idle PICCs and returns their ATQA.
    pub fn request(&mut self) -> Result<[u8; 2], Error<B::Error>> {
        // NOTE REQA is a short frame (7 bits)
        self.write(Register::BitFramingReg, 0x07)?;
        let rx = match self.execute(Command::Transceive, &[u8::from(picc::Command::ReqA)]) {
            Ok(rx) => rx,
            Err(Error::Timeout) | Err(Error::Protocol(_)) => {
                return Err(Error::CardNotPresent { valid_bits: 0 })
            }
            Err(e) => return Err(e),
        };

        if rx.valid_bits != 16 {
            return Err(Error::CardNotPresent {
                valid_bits: rx.valid_bits,
            });
        }
        Ok([rx.data[0], rx.data[1]])
    }

    /// Runs cascade level 1 anti-collision and returns the UID of the answering card.
    pub fn anti_collision(&mut self) -> Result<CardUid, Error<B::Error>> {
        self.write(Register::BitFramingReg, 0x00)?;
        let rx = self.execute(
            Command::Transceive,
            &[picc::Command::SelCl1.into(), picc::NVB_ANTICOLLISION],
        )?;

        if rx.len() != 5 {
            return Err(Error::UidLength(rx.len()));
        }
        let expected = bcc(&rx.data[..4]);
        if expected != rx.data[4] {
            return Err(Error::Checksum {
                expected,
                actual: rx.data[4],
            });
        }

        let uid = CardUid([rx.data[0], rx.data[1], rx.data[2], rx.data[3]]);
        debug!("anti-collision found {}", uid);
        Ok(uid)
    }

    /// Selects the card with `uid` and returns its SAK, `0` when the card did not
    /// answer with a complete SAK frame.
    pub fn select_tag(&mut self, uid: &CardUid) -> Result<u8, Error<B::Error>> {
        let [a, b, c, d] = *uid.as_bytes();
        let frame = [picc::Command::SelCl1.into(), picc::NVB_SELECT, a, b, c, d, uid.bcc()];
        let tx = self.with_crc::<9>(&frame)?;

        let rx = self.execute(Command::Transceive, &tx)?;
        let sak = if rx.valid_bits == 24 { rx.data[0] } else { 0 };
        debug!("selected {} with SAK {:#04x}", uid, sak);
        Ok(sak)
    }

    /// Runs MFAuthent for `block_address` with `key`.
    ///
    /// Any failure to run the command, a register bus failure included, is
    /// reported as [AuthStatus::ReadFailure].
    pub fn authenticate(
        &mut self,
        mode: AuthMode,
        block_address: u8,
        key: &MifareKey,
        uid: &CardUid,
    ) -> Result<AuthStatus, Error<B::Error>> {
        let mut tx = [0u8; 12];
        tx[0] = mode.into();
        tx[1] = block_address;
        tx[2..8].copy_from_slice(key);
        tx[8..].copy_from_slice(uid.as_bytes());

        match self.execute(Command::MFAuthent, &tx) {
            Ok(_) => {}
            Err(Error::Bus(_)) => {
                debug!("register bus failed during authentication of block {}", block_address);
                return Ok(AuthStatus::ReadFailure);
            }
            Err(_) => {
                debug!("authentication of block {} did not complete", block_address);
                return Ok(AuthStatus::ReadFailure);
            }
        }

        if self.read(Register::Status2Reg)? & MF_CRYPTO1_ON != 0 {
            debug!("authentication of block {} rejected", block_address);
            return Ok(AuthStatus::Failure);
        }
        self.authenticated = true;
        Ok(AuthStatus::Ok)
    }

    /// Reads the 16 bytes of block `block_address`.
    pub fn read_block(&mut self, block_address: u8) -> Result<Block, Error<B::Error>> {
        let tx = self.with_crc::<4>(&[picc::Command::MfRead.into(), block_address])?;
        let rx = self.execute(Command::Transceive, &tx)?;

        if rx.len() != BLOCK_SIZE {
            return Err(Error::DataLength(rx.len()));
        }
        let mut block = [0u8; BLOCK_SIZE];
        block.copy_from_slice(&rx.data);
        Ok(block)
    }

    /// Writes `data` to block `block_address`.
    ///
    /// The payload is only sent once the card acknowledged the write command.
    pub fn write_block(&mut self, block_address: u8, data: &Block) -> Result<(), Error<B::Error>> {
        let tx = self.with_crc::<4>(&[picc::Command::MfWrite.into(), block_address])?;
        let rx = self.execute(Command::Transceive, &tx)?;
        if !is_ack(&rx) {
            return Err(Error::WriteNotAuthorized);
        }

        let tx = self.with_crc::<18>(data)?;
        let rx = self.execute(Command::Transceive, &tx)?;
        if !is_ack(&rx) {
            return Err(Error::WriteFailed);
        }
        Ok(())
    }

    /// Switch off the MIFARE Crypto1 unit.
    /// Must be done after communication with an authenticated PICC
    pub fn stop_crypto(&mut self) -> Result<(), Error<B::Error>> {
        self.authenticated = false;
        Ok(self.clear_bits(Register::Status2Reg, MF_CRYPTO1_ON)?)
    }

    /// Whether the last authentication succeeded and no reset or
    /// [stop_crypto](Rc522::stop_crypto) happened since.
    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Reset, request, anti-collision and select in one go.
    ///
    /// Nothing is retried: on error the caller starts over, usually after
    /// [wait_for_card](Rc522::wait_for_card).
    pub fn select_card(&mut self) -> Result<CardSession<'_, B>, Error<B::Error>> {
        self.reset()?;
        self.init()?;
        self.request()?;
        let uid = self.anti_collision()?;
        let sak = self.select_tag(&uid)?;

        Ok(CardSession {
            rc522: self,
            uid,
            sak,
            sector: None,
            key: None,
            closed: false,
        })
    }
}

/// A selected card.
///
/// Sectors have to be authenticated before their blocks can be accessed, and only
/// the most recently authenticated sector is accessible. The Crypto1 unit is
/// switched off when the session is closed or dropped, whatever happened before.
pub struct CardSession<'a, B: RegisterBus> {
    rc522: &'a mut Rc522<B, Initialized>,
    uid: CardUid,
    sak: u8,
    sector: Option<u8>,
    key: Option<(AuthMode, MifareKey)>,
    closed: bool,
}

impl<'a, B: RegisterBus> CardSession<'a, B> {
    pub fn uid(&self) -> &CardUid {
        &self.uid
    }

    /// SAK returned on select, `0` if the card was not fully selected
    pub fn sak(&self) -> u8 {
        self.sak
    }

    pub fn authenticated_sector(&self) -> Option<u8> {
        self.sector
    }

    /// Key the current sector was authenticated with
    pub fn authenticated_key(&self) -> Option<(AuthMode, MifareKey)> {
        self.key
    }

    /// Authenticate `sector` through its trailer block.
    pub fn authenticate(
        &mut self,
        mode: AuthMode,
        sector: u8,
        key: &MifareKey,
    ) -> Result<(), Error<B::Error>> {
        self.sector = None;
        self.key = None;
        let address = trailer_address(sector)?;
        self.rc522
            .authenticate(mode, address, key, &self.uid)?
            .into_result()?;

        self.sector = Some(sector);
        self.key = Some((mode, *key));
        Ok(())
    }

    fn require(&self, sector: u8) -> Result<(), Error<B::Error>> {
        match self.sector {
            Some(s) if s == sector => Ok(()),
            _ => Err(Error::NotAuthenticated { sector }),
        }
    }

    /// Read data block `block % 3` of `sector`.
    pub fn read_data_block(&mut self, sector: u8, block: u8) -> Result<Block, Error<B::Error>> {
        self.require(sector)?;
        let address = data_address(sector, block)?;
        self.rc522.read_block(address)
    }

    /// Write data block `block % 3` of `sector`.
    pub fn write_data_block(
        &mut self,
        sector: u8,
        block: u8,
        data: &Block,
    ) -> Result<(), Error<B::Error>> {
        self.require(sector)?;
        let address = data_address(sector, block)?;
        self.rc522.write_block(address, data)
    }

    /// Read the trailer of `sector`. Keys the access conditions hide read as zeros.
    pub fn read_sector_trailer(&mut self, sector: u8) -> Result<Block, Error<B::Error>> {
        self.require(sector)?;
        let address = trailer_address(sector)?;
        self.rc522.read_block(address)
    }

    /// Access conditions of `sector`, from trailer bytes 6..=8.
    pub fn read_access_bits(&mut self, sector: u8) -> Result<BlocksAccess, Error<B::Error>> {
        let trailer = self.read_sector_trailer(sector)?;
        BlocksAccess::decode(&trailer[6..9]).map_err(Error::AccessBits)
    }

    /// Replace keys and access conditions of `sector`.
    ///
    /// A wrong access configuration can lock the sector for good.
    pub fn write_sector_trailer(
        &mut self,
        sector: u8,
        key_a: &MifareKey,
        key_b: &MifareKey,
        access: &BlocksAccess,
    ) -> Result<(), Error<B::Error>> {
        self.require(sector)?;
        let address = trailer_address(sector)?;

        let mut data = [0u8; BLOCK_SIZE];
        data[..6].copy_from_slice(key_a);
        data[6..10].copy_from_slice(access.encode().as_bytes());
        data[10..].copy_from_slice(key_b);
        self.rc522.write_block(address, &data)
    }

    /// Switch off the Crypto1 unit and end the session, reporting failures.
    pub fn close(mut self) -> Result<(), Error<B::Error>> {
        self.closed = true;
        self.rc522.stop_crypto()
    }
}

impl<'a, B: RegisterBus> Drop for CardSession<'a, B> {
    fn drop(&mut self) {
        if !self.closed && self.rc522.stop_crypto().is_err() {
            warn!("could not switch off Crypto1 for {}", self.uid);
        }
    }
}
