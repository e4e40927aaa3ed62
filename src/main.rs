use anyhow::Context;
use clap::Parser;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use chip8_interp::display::MonoTermDisplay;
use chip8_interp::input::StdinInput;
use chip8_interp::interpreter::Chip8Machine;
use chip8_interp::runner::{self, RunConfig};

/// CHIP-8 interpreter, rendering to the terminal. Esc quits.
#[derive(Parser)]
#[command(version)]
struct Args {
    /// raw program image, loaded at 0x200
    rom: PathBuf,

    /// microseconds between instructions
    #[arg(long, default_value_t = 1428)]
    tick_us: u64,

    /// stop after this many instructions
    #[arg(long)]
    cycles: Option<u64>,

    /// seed for the RND instruction
    #[arg(long)]
    seed: Option<u64>,

    /// log every instruction executed (to stderr)
    #[arg(long)]
    trace: bool,

    /// flash the F and B font glyphs before running
    #[arg(long)]
    self_test: bool,
}

fn init_tracing(trace: bool) {
    let default = if trace { "chip8_interp=trace" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.trace);

    // load a program
    let rom = fs::read(&args.rom)
        .with_context(|| format!("failed to read {}", args.rom.display()))?;

    // initialise
    let mut input = StdinInput::new();
    let machine = match args.seed {
        Some(seed) => Chip8Machine::with_seed(seed),
        None => Chip8Machine::new(),
    };
    let mut machine = machine.with_input(&mut input);
    machine
        .load_program(&rom)
        .with_context(|| format!("failed to load {}", args.rom.display()))?;

    let mut display = MonoTermDisplay::new().context("failed to set up the terminal")?;
    if args.self_test {
        runner::show_test_pattern(&mut machine, &mut display, &[0xf, 0xb], Duration::from_secs(1))?;
    }

    let config = RunConfig {
        tick: Duration::from_micros(args.tick_us),
        max_cycles: args.cycles,
    };
    let result = runner::run(&mut machine, &mut display, &config);
    drop(display);

    // shove some junk on stdout to stop the cli messing up the last frame
    for _ in 0..12 {
        println!();
    }
    let cycles = result?;
    println!("{} instructions executed", cycles);
    Ok(())
}
