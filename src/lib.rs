///
/// ## Design
///
/// * one CHIP-8 instruction per `step()`; the host decides how fast to call it
/// * the core owns memory and the framebuffer; nothing else mutates them once
///   the program is loaded
/// * abstract display so can plug alternatives; starting with TUI in-console
/// * keyboard is a collaborator the interpreter asks, never owns
/// * timers are plain registers to the core; the driver counts them down
///
/// Model
///
/// Machine
///  |-- memory: RAM, V0-VF, I, PC, call stack, delay/sound timers, font
///  |-- framebuffer: 64x32 pixels + dirty flag
///  |-- input (optional): is key K held? wait for a key
///  `-- step(): fetch -> decode -> execute
///
/// Driver (runner)
///  `-- main loop
///       |-- machine.step()?
///       |-- if framebuffer.take_dirty() { display.draw(framebuffer) }
///       |-- input.update()
///       |-- every 1/60s: memory.tick_timers()
///       `-- sleep until next tick
pub mod display;
pub mod input;
pub mod instruction;
pub mod interpreter;
pub mod memory;
pub mod runner;

use thiserror::Error;

/// everything that can stop a `step()`
#[derive(Debug, Error)]
pub enum Chip8Error {
    #[error("invalid register V{index:X}")]
    InvalidRegister { index: u8 },

    #[error("address {addr:#05x} is outside the writable program area")]
    OutOfBounds { addr: u16 },

    #[error("stack overflow pushing return address {addr:#05x}")]
    StackOverflow { addr: u16 },

    #[error("stack underflow")]
    StackUnderflow,

    #[error("program is {len} bytes; only {capacity} fit in memory")]
    CapacityExceeded { len: usize, capacity: usize },

    #[error("malformed instruction {instr:#06x} at {pc:#05x}")]
    MalformedInstruction { instr: u16, pc: u16 },

    #[error("instruction {instr:#06x} at {pc:#05x} is not implemented")]
    Unimplemented { instr: u16, pc: u16 },

    #[error("keyboard error: {0}")]
    Input(#[from] std::io::Error),
}
