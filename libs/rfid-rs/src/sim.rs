//! Register level model of an RC522 with an optional MIFARE Classic card in its field.

use std::collections::VecDeque;
use std::convert::Infallible;

use crate::register::*;
use crate::util::bcc;
use crate::{Block, MifareKey, RegisterBus, BLOCK_SIZE, DEFAULT_KEY};

const REGISTERS: usize = 0x40;
const CARD_BLOCKS: usize = 64;
const TRANSPORT_TRAILER: Block = [
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x07, 0x80, 0x69, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
];
const SAK_MIFARE_1K: u8 = 0x08;
const ACK: u8 = 0x0A;
const NAK: u8 = 0x04;

/// ISO 14443-3 CRC_A, least significant byte first
pub fn crc_a(data: &[u8]) -> [u8; 2] {
    let mut crc: u16 = 0x6363;
    for byte in data {
        let mut ch = byte ^ (crc & 0xFF) as u8;
        ch ^= ch << 4;
        let ch = ch as u16;
        crc = (crc >> 8) ^ (ch << 8) ^ (ch << 3) ^ (ch >> 4);
    }
    [(crc & 0xFF) as u8, (crc >> 8) as u8]
}

/// What the PICC side answers to the next transmissions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Data { bytes: Vec<u8>, last_bits: u8 },
    /// Nobody answers and the chip timer expires
    Silence,
    /// The exchange completes with these ErrorReg bits
    Error(u8),
}

impl Response {
    pub fn bytes(bytes: &[u8]) -> Self {
        Response::Data {
            bytes: bytes.to_vec(),
            last_bits: 0,
        }
    }

    /// `bytes` where only `last_bits` bits of the last byte are valid
    pub fn bits(bytes: &[u8], last_bits: u8) -> Self {
        Response::Data {
            bytes: bytes.to_vec(),
            last_bits,
        }
    }

    fn with_crc(bytes: &[u8]) -> Self {
        let mut data = bytes.to_vec();
        data.extend_from_slice(&crc_a(bytes));
        Response::bytes(&data)
    }
}

/// A MIFARE Classic 1K card with a single key for every sector.
#[derive(Debug, Clone)]
pub struct SimCard {
    uid: [u8; 4],
    key: MifareKey,
    blocks: [Block; CARD_BLOCKS],
    corrupt_bcc: bool,
    truncate_uid: bool,
    short_reads: Option<usize>,
    read_only: bool,
    nak_payload: bool,
    stall_auth: bool,
    selected: bool,
    sector: Option<u8>,
    pending_write: Option<u8>,
}

impl SimCard {
    pub fn new(uid: [u8; 4]) -> Self {
        let mut blocks = [[0u8; BLOCK_SIZE]; CARD_BLOCKS];
        for trailer in blocks.iter_mut().skip(3).step_by(4) {
            *trailer = TRANSPORT_TRAILER;
        }

        SimCard {
            uid,
            key: DEFAULT_KEY,
            blocks,
            corrupt_bcc: false,
            truncate_uid: false,
            short_reads: None,
            read_only: false,
            nak_payload: false,
            stall_auth: false,
            selected: false,
            sector: None,
            pending_write: None,
        }
    }

    pub fn with_key(mut self, key: MifareKey) -> Self {
        self.key = key;
        self
    }

    pub fn with_block(mut self, address: usize, data: Block) -> Self {
        self.blocks[address] = data;
        self
    }

    /// Answer anti-collision with an inverted BCC
    pub fn corrupt_bcc(mut self) -> Self {
        self.corrupt_bcc = true;
        self
    }

    /// Answer anti-collision without the BCC
    pub fn truncate_uid(mut self) -> Self {
        self.truncate_uid = true;
        self
    }

    /// Answer reads with only `len` bytes
    pub fn short_reads(mut self, len: usize) -> Self {
        self.short_reads = Some(len);
        self
    }

    /// NAK every write command
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// ACK write commands but NAK their payload
    pub fn nak_payload(mut self) -> Self {
        self.nak_payload = true;
        self
    }

    /// Never complete MFAuthent
    pub fn stall_auth(mut self) -> Self {
        self.stall_auth = true;
        self
    }

    fn power_cycle(&mut self) {
        self.selected = false;
        self.sector = None;
        self.pending_write = None;
    }

    fn bcc(&self) -> u8 {
        bcc(&self.uid)
    }

    fn crc_ok(frame: &[u8]) -> bool {
        let (payload, crc) = frame.split_at(frame.len() - 2);
        crc_a(payload) == crc
    }

    fn may_access(&self, address: u8) -> bool {
        self.selected && self.sector == Some(address / 4) && (address as usize) < CARD_BLOCKS
    }

    fn respond(&mut self, tx: &[u8], last_bits: u8) -> Response {
        if let Some(address) = self.pending_write.take() {
            if tx.len() != BLOCK_SIZE + 2 || !Self::crc_ok(tx) || self.nak_payload {
                return Response::bits(&[NAK], 4);
            }
            self.blocks[address as usize].copy_from_slice(&tx[..BLOCK_SIZE]);
            return Response::bits(&[ACK], 4);
        }

        match tx {
            [0x26] if last_bits == 7 => {
                self.power_cycle();
                Response::bytes(&[0x04, 0x00])
            }
            [0x93, 0x20] => {
                let mut answer = self.uid.to_vec();
                if !self.truncate_uid {
                    let bcc = self.bcc();
                    answer.push(if self.corrupt_bcc { !bcc } else { bcc });
                }
                Response::bytes(&answer)
            }
            [0x93, 0x70, uid @ .., bcc, _, _] if tx.len() == 9 => {
                if uid != self.uid || *bcc != self.bcc() || !Self::crc_ok(tx) {
                    return Response::Silence;
                }
                self.selected = true;
                Response::with_crc(&[SAK_MIFARE_1K])
            }
            [0x30, address, _, _] if Self::crc_ok(tx) => {
                if !self.may_access(*address) {
                    return Response::bits(&[NAK], 4);
                }
                let mut block = self.blocks[*address as usize];
                if address % 4 == 3 {
                    // key A never reads back
                    block[..6].fill(0);
                }
                match self.short_reads {
                    Some(len) => Response::bytes(&block[..len]),
                    None => Response::with_crc(&block),
                }
            }
            [0xA0, address, _, _] if Self::crc_ok(tx) => {
                if !self.may_access(*address) || self.read_only {
                    return Response::bits(&[NAK], 4);
                }
                self.pending_write = Some(*address);
                Response::bits(&[ACK], 4)
            }
            _ => Response::Silence,
        }
    }

    /// Returns `None` when the authentication never completes
    fn authenticate(&mut self, tx: &[u8]) -> Option<bool> {
        if self.stall_auth {
            return None;
        }
        let accepted = tx.len() == 12
            && self.selected
            && tx[2..8] == self.key
            && tx[8..12] == self.uid
            && (tx[1] as usize) < CARD_BLOCKS;

        self.sector = if accepted { Some(tx[1] / 4) } else { None };
        Some(accepted)
    }
}

/// RC522 register file driven through [RegisterBus].
///
/// Commands complete instantly; the completion interrupt shows up on the
/// ComIrqReg read following the configured delay.
#[derive(Debug)]
pub struct ChipSim {
    regs: [u8; REGISTERS],
    fifo: VecDeque<u8>,
    card: Option<SimCard>,
    response: Option<Response>,
    irq_delay: usize,
    pending_irq: Option<(u8, usize)>,
    irq_polls: usize,
    hold_power_down: bool,
    withhold_crc: bool,
    last_tx: Vec<u8>,
    last_tx_last_bits: u8,
    last_auth: Option<(u8, u8)>,
}

impl ChipSim {
    pub fn new() -> Self {
        let mut sim = ChipSim {
            regs: [0; REGISTERS],
            fifo: VecDeque::new(),
            card: None,
            response: None,
            irq_delay: 0,
            pending_irq: None,
            irq_polls: 0,
            hold_power_down: false,
            withhold_crc: false,
            last_tx: Vec::new(),
            last_tx_last_bits: 0,
            last_auth: None,
        };
        sim.power_on();
        sim
    }

    pub fn with_card(card: SimCard) -> Self {
        let mut sim = ChipSim::new();
        sim.card = Some(card);
        sim
    }

    fn power_on(&mut self) {
        self.regs = [0; REGISTERS];
        self.regs[Register::CommandReg as usize] = 0x20;
        self.regs[Register::ComIEnReg as usize] = 0x80;
        self.regs[Register::ComIrqReg as usize] = 0x14;
        self.regs[Register::ControlReg as usize] = 0x10;
        self.regs[Register::ModeReg as usize] = 0x3F;
        self.regs[Register::TxControlReg as usize] = 0x80;
        self.regs[Register::RFCfgReg as usize] = 0x48;
        self.regs[Register::VersionReg as usize] = 0x92;
        self.fifo.clear();
        self.pending_irq = None;
        if let Some(card) = self.card.as_mut() {
            card.power_cycle();
        }
    }

    /// Answer every transmission with `response` instead of the card model.
    pub fn respond_with(&mut self, response: Response) {
        self.response = Some(response);
    }

    /// Completion bits become visible on ComIrqReg read `delay + 1`.
    pub fn set_irq_delay(&mut self, delay: usize) {
        self.irq_delay = delay;
    }

    /// ComIrqReg reads since the last command started
    pub fn irq_polls(&self) -> usize {
        self.irq_polls
    }

    pub fn hold_power_down(&mut self) {
        self.hold_power_down = true;
    }

    pub fn withhold_crc(&mut self) {
        self.withhold_crc = true;
    }

    pub fn set_register(&mut self, reg: Register, value: u8) {
        self.regs[reg as usize] = value;
    }

    /// Register value, without the side effects of a bus read
    pub fn register(&self, reg: Register) -> u8 {
        self.regs[reg as usize]
    }

    /// Frame handed to the last Transceive or MFAuthent
    pub fn last_transmitted(&self) -> &[u8] {
        &self.last_tx
    }

    /// TxLastBits of the last transmission
    pub fn last_tx_last_bits(&self) -> u8 {
        self.last_tx_last_bits
    }

    /// Auth mode and block address of the last MFAuthent
    pub fn last_auth(&self) -> Option<(u8, u8)> {
        self.last_auth
    }

    pub fn card_block(&self, address: usize) -> Option<Block> {
        self.card.as_ref().map(|card| card.blocks[address])
    }

    fn read_register(&mut self, reg: usize) -> u8 {
        match reg {
            r if r == Register::ComIrqReg as usize => {
                self.irq_polls += 1;
                match self.pending_irq {
                    Some((bits, 0)) => {
                        self.regs[reg] |= bits;
                        self.pending_irq = None;
                    }
                    Some((bits, remaining)) => self.pending_irq = Some((bits, remaining - 1)),
                    None => {}
                }
                self.regs[reg]
            }
            r if r == Register::CommandReg as usize && self.hold_power_down => {
                self.regs[reg] | POWER_DOWN
            }
            r if r == Register::FIFODataReg as usize => self.fifo.pop_front().unwrap_or(0),
            r if r == Register::FIFOLevelReg as usize => self.fifo.len().min(0x7F) as u8,
            _ => self.regs[reg],
        }
    }

    fn write_register(&mut self, reg: usize, value: u8) {
        match reg {
            r if r == Register::ComIrqReg as usize || r == Register::DivIrqReg as usize => {
                if value & IRQ_SET != 0 {
                    self.regs[reg] |= value & !IRQ_SET;
                } else {
                    self.regs[reg] &= !value;
                }
            }
            r if r == Register::FIFOLevelReg as usize => {
                if value & FLUSH_BUFFER != 0 {
                    self.fifo.clear();
                }
            }
            r if r == Register::FIFODataReg as usize => self.fifo.push_back(value),
            r if r == Register::CommandReg as usize => self.run(value & 0x0F),
            r if r == Register::BitFramingReg as usize => {
                self.regs[reg] = value;
                let transceiving = self.regs[Register::CommandReg as usize] & 0x0F
                    == u8::from(Command::Transceive);
                if value & START_SEND != 0 && transceiving {
                    self.transceive(value & RX_LAST_BITS);
                }
            }
            _ => self.regs[reg] = value,
        }
    }

    fn run(&mut self, command: u8) {
        self.regs[Register::CommandReg as usize] = command;

        if command == u8::from(Command::SoftReset) {
            self.power_on();
        } else if command == u8::from(Command::CalcCRC) {
            let data: Vec<u8> = self.fifo.drain(..).collect();
            if !self.withhold_crc {
                let [low, high] = crc_a(&data);
                self.regs[Register::CRCResultRegLow as usize] = low;
                self.regs[Register::CRCResultRegHigh as usize] = high;
                self.regs[Register::DivIrqReg as usize] |= CRC_IRQ;
            }
        } else if command == u8::from(Command::MFAuthent) {
            self.mf_authent();
        }
    }

    fn mf_authent(&mut self) {
        self.last_tx = self.fifo.drain(..).collect();
        self.irq_polls = 0;
        if self.last_tx.len() >= 2 {
            self.last_auth = Some((self.last_tx[0], self.last_tx[1]));
        }

        let tx = self.last_tx.clone();
        let outcome = match self.card.as_mut() {
            Some(card) => card.authenticate(&tx),
            None => Some(false),
        };
        let Some(accepted) = outcome else {
            return;
        };

        let status = &mut self.regs[Register::Status2Reg as usize];
        if accepted {
            *status &= !MF_CRYPTO1_ON;
        } else {
            *status |= MF_CRYPTO1_ON;
        }
        self.regs[Register::ErrorReg as usize] = 0;
        self.pending_irq = Some((IDLE_IRQ, self.irq_delay));
    }

    fn transceive(&mut self, last_bits: u8) {
        self.last_tx = self.fifo.drain(..).collect();
        self.last_tx_last_bits = last_bits;
        self.irq_polls = 0;

        let tx = self.last_tx.clone();
        let response = match (&self.response, self.card.as_mut()) {
            (Some(response), _) => response.clone(),
            (None, Some(card)) => card.respond(&tx, last_bits),
            (None, None) => Response::Silence,
        };

        let irq = match response {
            Response::Data { bytes, last_bits } => {
                self.fifo.extend(bytes);
                let control = &mut self.regs[Register::ControlReg as usize];
                *control = (*control & !RX_LAST_BITS) | last_bits;
                self.regs[Register::ErrorReg as usize] = 0;
                RX_IRQ | IDLE_IRQ
            }
            Response::Silence => {
                self.regs[Register::ErrorReg as usize] = 0;
                TIMER_IRQ
            }
            Response::Error(bits) => {
                self.regs[Register::ErrorReg as usize] = bits;
                IDLE_IRQ
            }
        };
        self.pending_irq = Some((irq, self.irq_delay));
    }
}

impl RegisterBus for ChipSim {
    type Error = Infallible;

    fn transfer_frame(&mut self, address: u8, data: u8) -> Result<u8, Self::Error> {
        let reg = ((address & 0x7E) >> 1) as usize;
        if address & 0x80 != 0 {
            Ok(self.read_register(reg))
        } else {
            self.write_register(reg, data);
            Ok(0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc_a_matches_known_frames() {
        assert_eq!(crc_a(&[0x50, 0x00]), [0x57, 0xCD]);
        assert_eq!(crc_a(&[0x30, 0x00]), [0x02, 0xA8]);
    }

    #[test]
    fn irq_register_writes_set_or_clear_marked_bits() {
        let mut sim = ChipSim::new();

        sim.transfer_frame(Register::ComIrqReg.write_address(), 0x14).unwrap();
        assert_eq!(sim.register(Register::ComIrqReg), 0x00);

        sim.transfer_frame(Register::ComIrqReg.write_address(), 0x81).unwrap();
        assert_eq!(sim.register(Register::ComIrqReg), 0x01);
    }
}
