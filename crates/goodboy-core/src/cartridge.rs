//! Cartridge mappers and ROM/RAM banking.

use std::time::{SystemTime, UNIX_EPOCH};

use log::debug;
use thiserror::Error;

pub const ROM_BANK_SIZE: usize = 0x4000;
pub const RAM_BANK_SIZE: usize = 0x2000;

/// 8 KiB RAM banks per header RAM-size code (0x149).
const RAM_BANKS_BY_CODE: [usize; 6] = [0, 0, 1, 4, 16, 8];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MbcKind {
    None,
    Mbc1,
    Mbc3,
}

#[derive(Debug)]
enum MbcState {
    None,
    Mbc1 {
        ram_enable: bool,
        ram_bank: usize,
        /// Banking mode register bit 0 == 0 selects "simple" banking, in
        /// which the RAM bank register is ignored.
        simple_banking: bool,
    },
    Mbc3 {
        ram_enable: bool,
        /// Either a RAM bank (0x00-0x03) or an RTC register (0x08-0x0C).
        mapped: Mbc3Mapped,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mbc3Mapped {
    RamBank(usize),
    Rtc(u8),
}

#[derive(Debug, Error)]
pub enum CartridgeError {
    #[error("unsupported cartridge type {0:#04x}")]
    UnsupportedCartridgeType(u8),
    #[error("ROM image truncated: {len} bytes, need at least {need}")]
    TruncatedRom { len: usize, need: usize },
}

/// A loaded cartridge: immutable ROM, banked external RAM, and the mapper
/// latches the running program writes through the 0x0000-0x7FFF window.
#[derive(Debug)]
pub struct Cartridge {
    rom: Vec<u8>,
    ram: Vec<u8>,
    pub mbc: MbcKind,
    title: String,
    num_rom_banks: usize,
    num_ram_banks: usize,
    rom_bank: usize,
    state: MbcState,
}

impl Cartridge {
    /// Parse the header and set up the mapper. Unsupported cartridge types
    /// and undersized images are fatal at load.
    pub fn load(data: Vec<u8>) -> Result<Self, CartridgeError> {
        let header = Header::parse(&data);
        let (mbc, has_ram) = header.mbc_kind()?;

        let num_rom_banks = header.rom_banks();
        let need = num_rom_banks.max(2) * ROM_BANK_SIZE;
        if data.len() < need {
            return Err(CartridgeError::TruncatedRom {
                len: data.len(),
                need,
            });
        }

        let num_ram_banks = if has_ram { header.ram_banks() } else { 0 };
        let state = match mbc {
            MbcKind::None => MbcState::None,
            MbcKind::Mbc1 => MbcState::Mbc1 {
                ram_enable: false,
                ram_bank: 0,
                simple_banking: true,
            },
            MbcKind::Mbc3 => MbcState::Mbc3 {
                ram_enable: false,
                mapped: Mbc3Mapped::RamBank(0),
            },
        };

        let title = header.title();
        Ok(Self {
            rom: data,
            ram: vec![0; num_ram_banks * RAM_BANK_SIZE],
            mbc,
            title,
            num_rom_banks,
            num_ram_banks,
            rom_bank: 1,
            state,
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Bank currently mapped at 0x4000-0x7FFF. Always >= 1.
    pub fn current_rom_bank(&self) -> usize {
        self.rom_bank
    }

    pub fn num_rom_banks(&self) -> usize {
        self.num_rom_banks
    }

    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x3FFF => self.rom[addr as usize],
            0x4000..=0x7FFF => {
                self.rom[self.rom_bank * ROM_BANK_SIZE + (addr as usize - ROM_BANK_SIZE)]
            }
            0xA000..=0xBFFF => match &self.state {
                MbcState::None => 0xFF,
                MbcState::Mbc1 {
                    ram_enable,
                    ram_bank,
                    ..
                } => {
                    if *ram_enable {
                        self.ram[ram_bank * RAM_BANK_SIZE + (addr as usize - 0xA000)]
                    } else {
                        0xFF
                    }
                }
                // The RAM-enable latch gates the whole window, RTC included.
                MbcState::Mbc3 { ram_enable, mapped } => match mapped {
                    Mbc3Mapped::Rtc(reg) if *ram_enable => rtc_read(*reg),
                    Mbc3Mapped::RamBank(bank) if *ram_enable => {
                        self.ram[bank * RAM_BANK_SIZE + (addr as usize - 0xA000)]
                    }
                    _ => 0xFF,
                },
            },
            _ => 0xFF,
        }
    }

    pub fn write(&mut self, addr: u16, val: u8) {
        match self.mbc {
            MbcKind::None => {}
            MbcKind::Mbc1 => self.write_mbc1(addr, val),
            MbcKind::Mbc3 => self.write_mbc3(addr, val),
        }
    }

    fn write_mbc1(&mut self, addr: u16, val: u8) {
        let num_rom_banks = self.num_rom_banks;
        let num_ram_banks = self.num_ram_banks;
        let MbcState::Mbc1 {
            ram_enable,
            ram_bank,
            simple_banking,
        } = &mut self.state
        else {
            unreachable!();
        };
        match addr {
            0x0000..=0x1FFF => {
                *ram_enable = num_ram_banks > 0 && val & 0x0F == 0x0A;
                debug!(target: "mapper", "MBC1 RAM enable: {}", *ram_enable);
            }
            0x2000..=0x3FFF => {
                self.rom_bank = clamp_rom_bank(val as usize & 0x1F, num_rom_banks);
                debug!(target: "mapper", "MBC1 ROM bank -> {}", self.rom_bank);
            }
            0x4000..=0x5FFF => {
                let bank = val as usize & 0x03;
                if bank < num_ram_banks && !*simple_banking {
                    *ram_bank = bank;
                    debug!(target: "mapper", "MBC1 RAM bank -> {bank}");
                }
            }
            0x6000..=0x7FFF => {
                *simple_banking = val & 0x01 == 0;
            }
            0xA000..=0xBFFF => {
                if *ram_enable {
                    self.ram[*ram_bank * RAM_BANK_SIZE + (addr as usize - 0xA000)] = val;
                }
            }
            _ => {}
        }
    }

    fn write_mbc3(&mut self, addr: u16, val: u8) {
        let num_rom_banks = self.num_rom_banks;
        let num_ram_banks = self.num_ram_banks;
        let MbcState::Mbc3 { ram_enable, mapped } = &mut self.state else {
            unreachable!();
        };
        match addr {
            0x0000..=0x1FFF => {
                *ram_enable = num_ram_banks > 0 && val & 0x0F == 0x0A;
                debug!(target: "mapper", "MBC3 RAM enable: {}", *ram_enable);
            }
            0x2000..=0x3FFF => {
                self.rom_bank = clamp_rom_bank(val as usize & 0x7F, num_rom_banks);
                debug!(target: "mapper", "MBC3 ROM bank -> {}", self.rom_bank);
            }
            0x4000..=0x5FFF => match val {
                0x00..=0x03 => {
                    let bank = val as usize;
                    if bank < num_ram_banks {
                        *mapped = Mbc3Mapped::RamBank(bank);
                    }
                }
                0x08..=0x0C => *mapped = Mbc3Mapped::Rtc(val),
                _ => {}
            },
            // RTC latch register: latching is not implemented.
            0x6000..=0x7FFF => {}
            0xA000..=0xBFFF => {
                if let Mbc3Mapped::RamBank(bank) = *mapped {
                    if *ram_enable {
                        self.ram[bank * RAM_BANK_SIZE + (addr as usize - 0xA000)] = val;
                    }
                }
            }
            _ => {}
        }
    }
}

/// Clamp a raw bank-select write into `[1, num_banks - 1]`.
fn clamp_rom_bank(raw: usize, num_banks: usize) -> usize {
    raw.max(1).min(num_banks - 1)
}

/// Live wall-clock RTC. The day counter and latching are not implemented, so
/// the day registers read zero.
fn rtc_read(reg: u8) -> u8 {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    match reg {
        0x08 => (secs % 60) as u8,
        0x09 => (secs / 60 % 60) as u8,
        0x0A => (secs / 3600 % 24) as u8,
        0x0B | 0x0C => 0,
        _ => 0xFF,
    }
}

struct Header<'a> {
    data: &'a [u8],
}

impl<'a> Header<'a> {
    fn parse(data: &'a [u8]) -> Self {
        Self { data }
    }

    fn title(&self) -> String {
        let end = 0x0143.min(self.data.len());
        let mut slice = &self.data[0x0134.min(self.data.len())..end];
        if let Some(pos) = slice.iter().position(|&b| b == 0) {
            slice = &slice[..pos];
        }
        String::from_utf8_lossy(slice).trim().to_string()
    }

    fn cart_type(&self) -> u8 {
        self.data.get(0x0147).copied().unwrap_or(0)
    }

    fn mbc_kind(&self) -> Result<(MbcKind, bool), CartridgeError> {
        match self.cart_type() {
            0x00 => Ok((MbcKind::None, false)),
            0x01 => Ok((MbcKind::Mbc1, false)),
            0x02 | 0x03 => Ok((MbcKind::Mbc1, true)),
            0x0F | 0x11 => Ok((MbcKind::Mbc3, false)),
            0x10 | 0x12 | 0x13 => Ok((MbcKind::Mbc3, true)),
            other => Err(CartridgeError::UnsupportedCartridgeType(other)),
        }
    }

    fn rom_banks(&self) -> usize {
        let code = self.data.get(0x0148).copied().unwrap_or(0);
        1 << (1 + code as usize)
    }

    fn ram_banks(&self) -> usize {
        let code = self.data.get(0x0149).copied().unwrap_or(0) as usize;
        RAM_BANKS_BY_CODE.get(code).copied().unwrap_or(0)
    }
}
