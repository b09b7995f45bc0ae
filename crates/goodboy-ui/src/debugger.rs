//! Interactive debugger: a stdin prompt on the emulation thread with
//! breakpoints, single-stepping and memory inspection.

use std::io::{self, BufRead, Write};
use std::process;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use goodboy_core::gameboy::GameBoy;
use goodboy_core::input::PressedKeys;

use crate::{CLOCK_FREQ, TICK_BATCH};

const REGS: [&str; 8] = ["B", "C", "D", "E", "H", "L", "[HL]", "A"];

pub struct Debugger {
    gb: GameBoy,
    keys: Arc<Mutex<PressedKeys>>,
    breakpoints: Vec<u16>,
    paused: bool,
}

impl Debugger {
    pub fn new(gb: GameBoy, keys: Arc<Mutex<PressedKeys>>) -> Self {
        Self {
            gb,
            keys,
            breakpoints: Vec::new(),
            paused: true,
        }
    }

    /// Drive the machine like the plain runner, stopping at instruction
    /// boundaries for breakpoints and the prompt.
    pub fn run(mut self) {
        let batch_duration = Duration::from_nanos(TICK_BATCH * 1_000_000_000 / CLOCK_FREQ);
        let mut next = Instant::now();
        loop {
            self.gb.set_keys(*self.keys.lock().unwrap());
            for _ in 0..TICK_BATCH {
                if self.gb.cpu.instruction_boundary() {
                    if self.breakpoints.contains(&self.gb.cpu.pc) {
                        self.paused = true;
                    }
                    if self.paused {
                        self.print_instr();
                        self.prompt();
                        // The prompt blocked for wall time; don't catch up.
                        next = Instant::now();
                    }
                }
                self.gb.tick();
            }

            next += batch_duration;
            let now = Instant::now();
            if next > now {
                thread::sleep(next - now);
            } else {
                next = now;
            }
        }
    }

    fn prompt(&mut self) {
        let stdin = io::stdin();
        loop {
            print!("> ");
            io::stdout().flush().ok();

            let mut line = String::new();
            match stdin.lock().read_line(&mut line) {
                Ok(0) | Err(_) => process::exit(0),
                Ok(_) => {}
            }
            let args: Vec<&str> = line.split_whitespace().collect();

            match args.as_slice() {
                ["r"] | ["run"] => {
                    self.paused = false;
                    return;
                }
                ["s"] | ["step"] => {
                    self.paused = true;
                    return;
                }
                ["b", addr] | ["break", addr] => match parse_address(addr) {
                    Some(addr) => self.breakpoints.push(addr),
                    None => println!("Invalid address: {addr}"),
                },
                ["b"] | ["break"] => println!("Usage: b <address>"),
                ["i", "b"] | ["info", "b"] => {
                    if self.breakpoints.is_empty() {
                        println!("No breakpoints");
                    } else {
                        for bp in &self.breakpoints {
                            println!("0x{bp:04X}");
                        }
                    }
                }
                ["i", ..] | ["info", ..] => println!("Usage: info b"),
                ["x", loc] => match self.resolve_address(loc) {
                    Some(addr) => {
                        println!("0x{addr:04X}: {:02X}", self.gb.mmu.read_byte(addr));
                    }
                    None => println!("Invalid address. Try for example 0x100 or $HL."),
                },
                ["x"] => println!("Usage: x <addr|$reg>"),
                ["q"] | ["quit"] => process::exit(0),
                ["h"] | ["help"] => {
                    println!("r or run - run the program");
                    println!("s or step - step by one instruction");
                    println!("b or break <addr> - sets a breakpoint at the given address");
                    println!("i b or info b - prints all the breakpoints");
                    println!("x <addr|$reg> - prints the memory at the given address (e.g. 0xff) or register (e.g. $HL)");
                    println!("q or quit - quit");
                }
                _ => println!("Unknown command, try 'help'"),
            }
        }
    }

    /// Registers plus the instruction at PC, one line per stop.
    fn print_instr(&self) {
        let cpu = &self.gb.cpu;
        let pc = cpu.pc;
        let opcode = self.gb.mmu.read_byte(pc);

        let (name, len) = if opcode == 0xCB {
            (cb_mnemonic(self.gb.mmu.read_byte(pc.wrapping_add(1))), 2)
        } else {
            (mnemonic(opcode), instr_len(opcode))
        };

        let mut bytes = String::new();
        for i in 0..len {
            bytes.push_str(&format!("{:02X} ", self.gb.mmu.read_byte(pc.wrapping_add(i))));
        }

        let bank = if pc < 0x4000 {
            "00".to_string()
        } else if pc < 0x8000 {
            match self.gb.mmu.cart.as_ref() {
                Some(cart) => format!("{:02X}", cart.current_rom_bank()),
                None => "--".to_string(),
            }
        } else {
            "--".to_string()
        };

        println!(
            "A:{:02X} F:{:02X} B:{:02X} C:{:02X} D:{:02X} E:{:02X} H:{:02X} L:{:02X} SP:{:04X} [{}]0x{:04x}: {:<9} {}",
            cpu.a,
            cpu.flags_to_byte(),
            cpu.b,
            cpu.c,
            cpu.d,
            cpu.e,
            cpu.h,
            cpu.l,
            cpu.sp,
            bank,
            pc,
            bytes,
            name
        );
    }

    fn resolve_address(&self, addr: &str) -> Option<u16> {
        match addr.to_uppercase().as_str() {
            "$BC" => Some(self.gb.cpu.bc()),
            "$DE" => Some(self.gb.cpu.de()),
            "$HL" => Some(self.gb.cpu.hl()),
            _ => parse_address(addr),
        }
    }
}

/// Parse a hex (0x-prefixed) or decimal address.
fn parse_address(addr: &str) -> Option<u16> {
    if let Some(hex) = addr.strip_prefix("0x").or_else(|| addr.strip_prefix("0X")) {
        u16::from_str_radix(hex, 16).ok()
    } else {
        addr.parse().ok()
    }
}

/// Instruction length in bytes (opcode plus immediates).
fn instr_len(opcode: u8) -> u16 {
    match opcode {
        0x01 | 0x11 | 0x21 | 0x31 | 0x08 => 3,
        0xC2 | 0xC3 | 0xC4 | 0xCA | 0xCC | 0xCD => 3,
        0xD2 | 0xD4 | 0xDA | 0xDC | 0xEA | 0xFA => 3,
        0x06 | 0x0E | 0x16 | 0x1E | 0x26 | 0x2E | 0x36 | 0x3E => 2,
        0x10 | 0x18 | 0x20 | 0x28 | 0x30 | 0x38 => 2,
        0xC6 | 0xCE | 0xD6 | 0xDE | 0xE6 | 0xEE | 0xF6 | 0xFE => 2,
        0xE0 | 0xE8 | 0xF0 | 0xF8 => 2,
        _ => 1,
    }
}

/// Mnemonic for a primary opcode. The LD and ALU grids are decoded from the
/// operand tiling; the rest is spelled out.
fn mnemonic(opcode: u8) -> String {
    match opcode {
        0x76 => "HALT".to_string(),
        0x40..=0x7F => format!(
            "LD {}, {}",
            REGS[((opcode >> 3) & 0x07) as usize],
            REGS[(opcode & 0x07) as usize]
        ),
        0x80..=0xBF => {
            let ops = ["ADD A,", "ADC A,", "SUB A,", "SBC A,", "AND A,", "XOR A,", "OR A,", "CP A,"];
            format!(
                "{} {}",
                ops[((opcode - 0x80) >> 3) as usize],
                REGS[(opcode & 0x07) as usize]
            )
        }
        _ => match opcode {
            0x00 => "NOP",
            0x01 => "LD BC, n16",
            0x02 => "LD [BC], A",
            0x03 => "INC BC",
            0x04 => "INC B",
            0x05 => "DEC B",
            0x06 => "LD B, n8",
            0x07 => "RLCA",
            0x08 => "LD [a16], SP",
            0x09 => "ADD HL, BC",
            0x0A => "LD A, [BC]",
            0x0B => "DEC BC",
            0x0C => "INC C",
            0x0D => "DEC C",
            0x0E => "LD C, n8",
            0x0F => "RRCA",
            0x10 => "STOP",
            0x11 => "LD DE, n16",
            0x12 => "LD [DE], A",
            0x13 => "INC DE",
            0x14 => "INC D",
            0x15 => "DEC D",
            0x16 => "LD D, n8",
            0x17 => "RLA",
            0x18 => "JR e8",
            0x19 => "ADD HL, DE",
            0x1A => "LD A, [DE]",
            0x1B => "DEC DE",
            0x1C => "INC E",
            0x1D => "DEC E",
            0x1E => "LD E, n8",
            0x1F => "RRA",
            0x20 => "JR NZ, e8",
            0x21 => "LD HL, n16",
            0x22 => "LD [HL+], A",
            0x23 => "INC HL",
            0x24 => "INC H",
            0x25 => "DEC H",
            0x26 => "LD H, n8",
            0x27 => "DAA",
            0x28 => "JR Z, e8",
            0x29 => "ADD HL, HL",
            0x2A => "LD A, [HL+]",
            0x2B => "DEC HL",
            0x2C => "INC L",
            0x2D => "DEC L",
            0x2E => "LD L, n8",
            0x2F => "CPL",
            0x30 => "JR NC, e8",
            0x31 => "LD SP, n16",
            0x32 => "LD [HL-], A",
            0x33 => "INC SP",
            0x34 => "INC [HL]",
            0x35 => "DEC [HL]",
            0x36 => "LD [HL], n8",
            0x37 => "SCF",
            0x38 => "JR C, e8",
            0x39 => "ADD HL, SP",
            0x3A => "LD A, [HL-]",
            0x3B => "DEC SP",
            0x3C => "INC A",
            0x3D => "DEC A",
            0x3E => "LD A, n8",
            0x3F => "CCF",
            0xC0 => "RET NZ",
            0xC1 => "POP BC",
            0xC2 => "JP NZ, a16",
            0xC3 => "JP a16",
            0xC4 => "CALL NZ, a16",
            0xC5 => "PUSH BC",
            0xC6 => "ADD A, n8",
            0xC7 => "RST $00",
            0xC8 => "RET Z",
            0xC9 => "RET",
            0xCA => "JP Z, a16",
            0xCB => "PREFIX",
            0xCC => "CALL Z, a16",
            0xCD => "CALL a16",
            0xCE => "ADC A, n8",
            0xCF => "RST $08",
            0xD0 => "RET NC",
            0xD1 => "POP DE",
            0xD2 => "JP NC, a16",
            0xD4 => "CALL NC, a16",
            0xD5 => "PUSH DE",
            0xD6 => "SUB A, n8",
            0xD7 => "RST $10",
            0xD8 => "RET C",
            0xD9 => "RETI",
            0xDA => "JP C, a16",
            0xDC => "CALL C, a16",
            0xDE => "SBC A, n8",
            0xDF => "RST $18",
            0xE0 => "LDH [a8], A",
            0xE1 => "POP HL",
            0xE2 => "LD [C], A",
            0xE5 => "PUSH HL",
            0xE6 => "AND A, n8",
            0xE7 => "RST $20",
            0xE8 => "ADD SP, e8",
            0xE9 => "JP HL",
            0xEA => "LD [a16], A",
            0xEE => "XOR A, n8",
            0xEF => "RST $28",
            0xF0 => "LDH A, [a8]",
            0xF1 => "POP AF",
            0xF2 => "LD A, [C]",
            0xF3 => "DI",
            0xF5 => "PUSH AF",
            0xF6 => "OR A, n8",
            0xF7 => "RST $30",
            0xF8 => "LD HL, SP+e8",
            0xF9 => "LD SP, HL",
            0xFA => "LD A, [a16]",
            0xFB => "EI",
            0xFE => "CP A, n8",
            0xFF => "RST $38",
            _ => "ILLEGAL",
        }
        .to_string(),
    }
}

/// Mnemonic for a CB-prefixed opcode, decoded from the tiled sub-space.
fn cb_mnemonic(opcode: u8) -> String {
    let reg = REGS[(opcode & 0x07) as usize];
    match opcode {
        0x00..=0x3F => {
            let ops = ["RLC", "RRC", "RL", "RR", "SLA", "SRA", "SWAP", "SRL"];
            format!("{} {}", ops[(opcode >> 3) as usize], reg)
        }
        0x40..=0x7F => format!("BIT {}, {}", (opcode - 0x40) >> 3, reg),
        0x80..=0xBF => format!("RES {}, {}", (opcode - 0x80) >> 3, reg),
        0xC0..=0xFF => format!("SET {}, {}", (opcode - 0xC0) >> 3, reg),
    }
}
