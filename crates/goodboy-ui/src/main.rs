//! Desktop driver: window, input, audio output and pacing around the
//! goodboy core.

mod audio;
mod debugger;

use std::path::PathBuf;
use std::process;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use fern::Dispatch;
use goodboy_core::gameboy::GameBoy;
use goodboy_core::input::PressedKeys;
use goodboy_core::ppu::{PixelSink, SCREEN_HEIGHT, SCREEN_WIDTH};
use log::{error, info, LevelFilter};
use pixels::{Pixels, SurfaceTexture};
use winit::dpi::LogicalSize;
use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::WindowBuilder;

const SCALE: u32 = 3;
const CLOCK_FREQ: u64 = 1_048_576;
/// Ticks per pacing slice (~1 ms of emulated time).
const TICK_BATCH: u64 = 1024;

/// Grayscale palette applied at the host boundary, RGBA per color index.
const PALETTE: [[u8; 4]; 4] = [
    [0xFF, 0xFF, 0xFF, 0xFF],
    [0xA5, 0xA5, 0xA5, 0xFF],
    [0x52, 0x52, 0x52, 0xFF],
    [0x00, 0x00, 0x00, 0xFF],
];

#[derive(Parser)]
#[command(name = "goodboy", about = "DMG Game Boy emulator")]
struct Args {
    /// Path to the ROM file
    rom: PathBuf,

    /// Optional 256-byte boot ROM image
    #[arg(long = "boot_rom")]
    boot_rom: Option<PathBuf>,

    /// Start paused in the interactive debugger
    #[arg(long)]
    debug: bool,

    /// Print every executed instruction
    #[arg(long)]
    trace: bool,

    /// Suppress the audio output stream
    #[arg(long)]
    mute: bool,
}

/// Index framebuffer shared between the emulation thread (writer) and the
/// window redraw (reader).
struct SharedFrame(Arc<Mutex<Vec<u8>>>);

impl PixelSink for SharedFrame {
    fn set_pixel(&mut self, row: usize, col: usize, color: u8) {
        self.0.lock().unwrap()[row * SCREEN_WIDTH + col] = color;
    }
}

fn main() {
    let args = Args::parse();
    setup_logging(args.trace);

    let rom = match std::fs::read(&args.rom) {
        Ok(data) => data,
        Err(e) => {
            error!("failed to load ROM {}: {e}", args.rom.display());
            process::exit(1);
        }
    };
    let boot_rom = args.boot_rom.as_ref().map(|path| {
        std::fs::read(path).unwrap_or_else(|e| {
            error!("failed to load boot ROM {}: {e}", path.display());
            process::exit(1);
        })
    });

    let frame = Arc::new(Mutex::new(vec![0u8; SCREEN_WIDTH * SCREEN_HEIGHT]));
    let keys = Arc::new(Mutex::new(PressedKeys::default()));

    let mut gb = match GameBoy::new(rom, boot_rom, Box::new(SharedFrame(Arc::clone(&frame)))) {
        Ok(gb) => gb,
        Err(e) => {
            error!("failed to load cartridge: {e}");
            process::exit(1);
        }
    };
    gb.cpu.trace = args.trace;
    if let Some(cart) = gb.mmu.cart.as_ref() {
        info!("loaded ROM: {} ({:?})", cart.title(), cart.mbc);
    }

    let _stream = if args.mute {
        None
    } else {
        audio::start_stream(gb.audio_consumer())
    };

    // The emulation runs on its own thread; the window only consumes the
    // shared framebuffer and produces key states.
    let emu_keys = Arc::clone(&keys);
    let debug = args.debug;
    thread::spawn(move || {
        if debug {
            debugger::Debugger::new(gb, emu_keys).run();
        } else {
            run_emulator(gb, emu_keys);
        }
    });

    if let Err(e) = run_window(frame, keys) {
        error!("window error: {e}");
        process::exit(1);
    }
}

/// Drive the core at 1,048,576 ticks per second. Pacing is advisory: the
/// loop measures elapsed wall time per slice and sleeps off the surplus.
fn run_emulator(mut gb: GameBoy, keys: Arc<Mutex<PressedKeys>>) {
    let batch_duration = Duration::from_nanos(TICK_BATCH * 1_000_000_000 / CLOCK_FREQ);
    let mut next = Instant::now();
    loop {
        gb.set_keys(*keys.lock().unwrap());
        for _ in 0..TICK_BATCH {
            gb.tick();
        }

        next += batch_duration;
        let now = Instant::now();
        if next > now {
            thread::sleep(next - now);
        } else {
            // Fell behind; don't try to catch up.
            next = now;
        }
    }
}

fn run_window(
    frame: Arc<Mutex<Vec<u8>>>,
    keys: Arc<Mutex<PressedKeys>>,
) -> Result<(), Box<dyn std::error::Error>> {
    let event_loop = EventLoop::new()?;
    let window = WindowBuilder::new()
        .with_title("goodboy")
        .with_inner_size(LogicalSize::new(
            (SCREEN_WIDTH as u32 * SCALE) as f64,
            (SCREEN_HEIGHT as u32 * SCALE) as f64,
        ))
        .build(&event_loop)?;

    let size = window.inner_size();
    let surface = SurfaceTexture::new(size.width, size.height, &window);
    let mut pixels = Pixels::new(SCREEN_WIDTH as u32, SCREEN_HEIGHT as u32, surface)?;

    event_loop.run(move |event, elwt| {
        elwt.set_control_flow(ControlFlow::Poll);
        match event {
            Event::WindowEvent { event, .. } => match event {
                WindowEvent::CloseRequested => elwt.exit(),
                WindowEvent::Resized(size) => {
                    if pixels.resize_surface(size.width, size.height).is_err() {
                        elwt.exit();
                    }
                }
                WindowEvent::KeyboardInput { event, .. } => {
                    let pressed = event.state.is_pressed();
                    let mut keys = keys.lock().unwrap();
                    match event.physical_key {
                        PhysicalKey::Code(KeyCode::ArrowUp) => keys.up = pressed,
                        PhysicalKey::Code(KeyCode::ArrowDown) => keys.down = pressed,
                        PhysicalKey::Code(KeyCode::ArrowLeft) => keys.left = pressed,
                        PhysicalKey::Code(KeyCode::ArrowRight) => keys.right = pressed,
                        PhysicalKey::Code(KeyCode::KeyA) => keys.a = pressed,
                        PhysicalKey::Code(KeyCode::KeyS) => keys.b = pressed,
                        PhysicalKey::Code(KeyCode::Enter) => keys.start = pressed,
                        PhysicalKey::Code(KeyCode::ShiftRight) => keys.select = pressed,
                        _ => {}
                    }
                }
                WindowEvent::RedrawRequested => {
                    {
                        let indices = frame.lock().unwrap();
                        for (dst, &color) in
                            pixels.frame_mut().chunks_exact_mut(4).zip(indices.iter())
                        {
                            dst.copy_from_slice(&PALETTE[color as usize]);
                        }
                    }
                    if pixels.render().is_err() {
                        elwt.exit();
                    }
                }
                _ => {}
            },
            Event::AboutToWait => window.request_redraw(),
            _ => {}
        }
    })?;
    Ok(())
}

fn setup_logging(trace: bool) {
    let mut config = Dispatch::new()
        .level(LevelFilter::Info)
        .format(|out, message, record| {
            out.finish(format_args!("[{}] {}", record.level(), message))
        })
        .chain(std::io::stdout());
    if trace {
        config = config.level_for("cpu", LevelFilter::Trace);
    }
    config.apply().expect("logger already initialized");
}
