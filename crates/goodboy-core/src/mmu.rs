//! Memory control unit: the address-space router that owns WRAM, HRAM, the
//! boot-ROM gate and the OAM DMA engine, and forwards everything else to the
//! owning component.

use log::trace;

use crate::apu::Apu;
use crate::bits::merge;
use crate::cartridge::Cartridge;
use crate::input::{Input, PressedKeys};
use crate::interrupts::Interrupts;
use crate::ppu::{NullPixelSink, PixelSink, Ppu};
use crate::timer::Timer;

const WRAM_SIZE: usize = 0x2000;
const HRAM_SIZE: usize = 0x7F;
const BOOT_ROM_SIZE: usize = 0x100;

const ADDR_DMA: u16 = 0xFF46;
const ADDR_BOOT_ROM_DISABLE: u16 = 0xFF50;

/// The OAM DMA engine: one byte per machine tick, 160 bytes per transfer.
///
/// A write to FF46 latches a source page; the latch is consumed when the
/// engine is idle, so an active transfer always runs to completion.
struct OamDma {
    /// Last value written to FF46, for readback.
    reg: u8,
    /// Latched source page waiting for the engine to go idle.
    pending: Option<u8>,
    /// Source page of the transfer in progress.
    source: Option<u8>,
    transfer_byte: u16,
}

impl OamDma {
    fn new() -> Self {
        Self {
            reg: 0,
            pending: None,
            source: None,
            transfer_byte: 0,
        }
    }
}

pub struct Mmu {
    boot_rom: Option<Vec<u8>>,
    boot_rom_enabled: bool,
    pub cart: Option<Cartridge>,
    wram: [u8; WRAM_SIZE],
    hram: [u8; HRAM_SIZE],
    pub interrupts: Interrupts,
    pub timer: Timer,
    pub input: Input,
    pub apu: Apu,
    pub ppu: Ppu,
    dma: OamDma,
}

impl Mmu {
    pub fn new() -> Self {
        Self::with_pixel_sink(Box::new(NullPixelSink))
    }

    pub fn with_pixel_sink(sink: Box<dyn PixelSink>) -> Self {
        Self {
            boot_rom: None,
            boot_rom_enabled: false,
            cart: None,
            wram: [0; WRAM_SIZE],
            hram: [0; HRAM_SIZE],
            interrupts: Interrupts::new(),
            timer: Timer::new(),
            input: Input::new(),
            apu: Apu::new(),
            ppu: Ppu::new(sink),
            dma: OamDma::new(),
        }
    }

    pub fn load_cart(&mut self, cart: Cartridge) {
        self.cart = Some(cart);
    }

    /// Map a 256-byte boot image below 0x0100 until FF50 is written.
    pub fn load_boot_rom(&mut self, data: Vec<u8>) {
        assert_eq!(data.len(), BOOT_ROM_SIZE, "boot ROM must be 256 bytes");
        self.boot_rom = Some(data);
        self.boot_rom_enabled = true;
    }

    pub fn read_byte(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x00FF if self.boot_rom_enabled => {
                self.boot_rom.as_ref().map(|b| b[addr as usize]).unwrap_or(0xFF)
            }
            0x0000..=0x7FFF | 0xA000..=0xBFFF => {
                self.cart.as_ref().map(|c| c.read(addr)).unwrap_or(0xFF)
            }
            0x8000..=0x9FFF => self.ppu.vram[(addr - 0x8000) as usize],
            0xC000..=0xDFFF => self.wram[(addr - 0xC000) as usize],
            // Echo RAM is a strict alias of 0xC000-0xDDFF.
            0xE000..=0xFDFF => self.wram[(addr - 0xE000) as usize],
            0xFE00..=0xFE9F => self.ppu.oam[(addr - 0xFE00) as usize],
            0xFEA0..=0xFEFF => 0xFF,
            0xFF00..=0xFF7F | 0xFFFF => self.io_read(addr),
            0xFF80..=0xFFFE => self.hram[(addr - 0xFF80) as usize],
        }
    }

    /// Two-byte helper: reads low then high.
    pub fn read_word(&self, addr: u16) -> u16 {
        merge(self.read_byte(addr.wrapping_add(1)), self.read_byte(addr))
    }

    pub fn write_byte(&mut self, addr: u16, val: u8) {
        match addr {
            0x0000..=0x00FF if self.boot_rom_enabled => {
                // The boot ROM shadows the cartridge and is not writable.
            }
            0x0000..=0x7FFF | 0xA000..=0xBFFF => {
                if let Some(cart) = self.cart.as_mut() {
                    cart.write(addr, val);
                }
            }
            0x8000..=0x9FFF => self.ppu.vram[(addr - 0x8000) as usize] = val,
            0xC000..=0xDFFF => self.wram[(addr - 0xC000) as usize] = val,
            0xE000..=0xFDFF => self.wram[(addr - 0xE000) as usize] = val,
            0xFE00..=0xFE9F => self.ppu.oam[(addr - 0xFE00) as usize] = val,
            0xFEA0..=0xFEFF => {}
            0xFF00..=0xFF7F | 0xFFFF => self.io_write(addr, val),
            0xFF80..=0xFFFE => self.hram[(addr - 0xFF80) as usize] = val,
        }
    }

    fn io_read(&self, addr: u16) -> u8 {
        match addr {
            0xFF00 => self.input.read(),
            0xFF04..=0xFF07 => self.timer.read(addr),
            0xFF0F | 0xFFFF => self.interrupts.read(addr),
            0xFF10..=0xFF3F => self.apu.read(addr),
            ADDR_DMA => self.dma.reg,
            0xFF40..=0xFF45 | 0xFF47..=0xFF4B => self.ppu.read_reg(addr),
            _ => {
                trace!(target: "mmu", "unclaimed I/O read {addr:#06x}");
                0xFF
            }
        }
    }

    fn io_write(&mut self, addr: u16, val: u8) {
        match addr {
            0xFF00 => self.input.write(val),
            0xFF04..=0xFF07 => {
                // A DIV write resets the divider, which can produce a bit-4
                // falling edge the APU frame sequencer must see.
                let prev_div = self.timer.div();
                self.timer.write(addr, val);
                self.apu.on_div_change(prev_div, self.timer.div());
            }
            0xFF0F | 0xFFFF => self.interrupts.write(addr, val),
            0xFF10..=0xFF3F => self.apu.write(addr, val),
            ADDR_DMA => {
                self.dma.reg = val;
                self.dma.pending = Some(val);
            }
            0xFF40..=0xFF45 | 0xFF47..=0xFF4B => self.ppu.write_reg(addr, val),
            ADDR_BOOT_ROM_DISABLE => {
                if val != 0 {
                    self.boot_rom_enabled = false;
                }
            }
            _ => {
                trace!(target: "mmu", "unclaimed I/O write {addr:#06x} <- {val:#04x}");
            }
        }
    }

    /// Advance the timer one machine tick, feeding any DIV bit-4 falling
    /// edge to the APU frame sequencer.
    pub fn timer_tick(&mut self) {
        let prev_div = self.timer.div();
        self.timer.tick(&mut self.interrupts);
        self.apu.on_div_change(prev_div, self.timer.div());
    }

    /// Advance the PPU one dot.
    pub fn ppu_tick(&mut self) {
        self.ppu.tick(&mut self.interrupts);
    }

    /// Forward a host key snapshot to the joypad.
    pub fn set_keys(&mut self, keys: PressedKeys) {
        self.input.set_pressed_keys(keys, &mut self.interrupts);
    }

    /// Advance the OAM DMA engine one machine tick.
    pub fn dma_tick(&mut self) {
        if self.dma.source.is_none() {
            self.dma.source = self.dma.pending.take();
        }
        if let Some(source) = self.dma.source {
            let src = ((source as u16) << 8) + self.dma.transfer_byte;
            let byte = self.read_byte(src);
            self.ppu.oam[self.dma.transfer_byte as usize] = byte;

            self.dma.transfer_byte += 1;
            if self.dma.transfer_byte == 160 {
                self.dma.transfer_byte = 0;
                self.dma.source = None;
            }
        }
    }

    /// True while a DMA transfer is copying.
    pub fn dma_active(&self) -> bool {
        self.dma.source.is_some()
    }
}

impl Default for Mmu {
    fn default() -> Self {
        Self::new()
    }
}
