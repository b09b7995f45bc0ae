//! The machine facade: wires CPU, MMU and peripherals together and drives
//! them in the fixed macro-tick order.

use crate::audio_queue::AudioConsumer;
use crate::cartridge::{Cartridge, CartridgeError};
use crate::cpu::Cpu;
use crate::input::PressedKeys;
use crate::mmu::Mmu;
use crate::ppu::PixelSink;

pub struct GameBoy {
    pub cpu: Cpu,
    pub mmu: Mmu,
}

impl GameBoy {
    /// Build a machine around a cartridge image. With no boot ROM the CPU
    /// and LCD registers start from the usual post-boot state.
    pub fn new(
        rom: Vec<u8>,
        boot_rom: Option<Vec<u8>>,
        sink: Box<dyn PixelSink>,
    ) -> Result<Self, CartridgeError> {
        let mut gb = Self {
            cpu: Cpu::new(),
            mmu: Mmu::with_pixel_sink(sink),
        };
        gb.mmu.load_cart(Cartridge::load(rom)?);

        match boot_rom {
            Some(data) => gb.mmu.load_boot_rom(data),
            None => gb.set_post_boot_state(),
        }
        Ok(gb)
    }

    /// One macro tick (1,048,576 Hz): CPU once, OAM DMA once, timer once,
    /// APU twice, PPU four times. This ordering is part of the contract;
    /// reordering mis-times STAT/VBlank interrupts.
    pub fn tick(&mut self) {
        self.cpu.tick(&mut self.mmu);
        self.mmu.dma_tick();
        self.mmu.timer_tick();

        self.mmu.apu.tick();
        self.mmu.apu.tick();

        self.mmu.ppu_tick();
        self.mmu.ppu_tick();
        self.mmu.ppu_tick();
        self.mmu.ppu_tick();
    }

    /// Host key snapshot; applied between macro ticks.
    pub fn set_keys(&mut self, keys: PressedKeys) {
        self.mmu.set_keys(keys);
    }

    /// Handle for the host audio thread.
    pub fn audio_consumer(&self) -> AudioConsumer {
        self.mmu.apu.audio_consumer()
    }

    /// Register and I/O state the DMG boot ROM leaves behind.
    fn set_post_boot_state(&mut self) {
        let cpu = &mut self.cpu;
        cpu.a = 0x01;
        cpu.b = 0x00;
        cpu.c = 0x13;
        cpu.d = 0x00;
        cpu.e = 0xD8;
        cpu.h = 0x01;
        cpu.l = 0x4D;
        cpu.zf = true;
        cpu.nf = false;
        cpu.hf = true;
        cpu.cf = true;
        cpu.pc = 0x0100;
        cpu.sp = 0xFFFE;

        self.mmu.write_byte(0xFF40, 0x91); // LCDC
        self.mmu.write_byte(0xFF47, 0xFC); // BGP
        self.mmu.write_byte(0xFF26, 0x80); // NR52: APU powered
        self.mmu.write_byte(0xFF25, 0xF3); // NR51
        self.mmu.write_byte(0xFF24, 0x77); // NR50
    }
}
