use crate::display::Display;
use crate::interpreter::Chip8Machine;
use crate::memory::{CHIP8_FONT_ADDR, CHIP8_FONT_GLYPH_BYTES};
use crate::Chip8Error;
use std::io;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error};

/// delay and sound timers count down at 60Hz
const TIMER_PERIOD: Duration = Duration::from_nanos(1_000_000_000 / 60);

/// how the driver paces the machine
pub struct RunConfig {
    /// time between instructions
    pub tick: Duration,
    /// stop after this many instructions
    pub max_cycles: Option<u64>,
}

impl Default for RunConfig {
    /// roughly 700 instructions a second
    fn default() -> Self {
        RunConfig {
            tick: Duration::from_micros(1428),
            max_cycles: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("halted at {pc:#05x} running {instr:#06x}: {source}")]
    Halted {
        pc: u16,
        instr: u16,
        source: Chip8Error,
    },

    #[error("display error: {0}")]
    Display(#[from] io::Error),

    #[error("keyboard error: {0}")]
    Keyboard(io::Error),
}

/// hands out 60Hz timer ticks as wallclock time passes
struct TimerClock {
    next: Instant,
}

impl TimerClock {
    fn new(now: Instant) -> Self {
        TimerClock {
            next: now + TIMER_PERIOD,
        }
    }

    /// how many ticks are due by `now`
    fn due(&mut self, now: Instant) -> u32 {
        let mut ticks = 0;
        while now >= self.next {
            self.next += TIMER_PERIOD;
            ticks += 1;
        }
        ticks
    }
}

/// The main loop: step, redraw if anything drew, poll the keyboard, count
/// the timers down, sleep until the next tick. Returns the number of
/// instructions executed once the user quits or `max_cycles` is reached.
pub fn run(
    machine: &mut Chip8Machine,
    display: &mut dyn Display,
    config: &RunConfig,
) -> Result<u64, RunnerError> {
    let mut cycles = 0u64;
    let mut clock = TimerClock::new(Instant::now());
    debug!("running, {:?} per instruction", config.tick);

    while config.max_cycles.map_or(true, |max| cycles < max) {
        let started = Instant::now();

        if let Err(source) = machine.step() {
            // Esc while the program sits waiting for a key
            if machine.input_mut().map_or(false, |input| input.quit_requested()) {
                debug!("quit while waiting for a key after {} instructions", cycles);
                break;
            }
            let pc = machine.memory.program_counter;
            let instr = machine.memory.read_instruction(pc).unwrap_or(0);
            error!("machine halted at {:#05x} ({:04x}): {}", pc, instr, source);
            return Err(RunnerError::Halted { pc, instr, source });
        }
        cycles += 1;

        if machine.framebuffer.take_dirty() {
            display.draw(&machine.framebuffer)?;
        }

        if let Some(input) = machine.input_mut() {
            input.update().map_err(RunnerError::Keyboard)?;
            if input.quit_requested() {
                debug!("quit after {} instructions", cycles);
                break;
            }
        }

        for _ in 0..clock.due(Instant::now()) {
            machine.memory.tick_timers();
        }

        if let Some(rest) = config.tick.checked_sub(started.elapsed()) {
            spin_sleep::sleep(rest);
        }
    }
    Ok(cycles)
}

/// draw the glyphs for `digits` from the font across the top of the screen,
/// show them, then blank the screen again
pub fn show_test_pattern(
    machine: &mut Chip8Machine,
    display: &mut dyn Display,
    digits: &[u8],
    hold: Duration,
) -> Result<(), RunnerError> {
    for (n, digit) in digits.iter().enumerate() {
        let addr = CHIP8_FONT_ADDR + (digit & 0xf) as u16 * CHIP8_FONT_GLYPH_BYTES;
        let glyph = machine
            .memory
            .read_bytes(addr, CHIP8_FONT_GLYPH_BYTES as usize)
            .map_err(|source| RunnerError::Halted {
                pc: machine.memory.program_counter,
                instr: 0,
                source,
            })?;
        machine.framebuffer.blit_sprite(glyph, (n * 6) as u8, 0);
    }
    machine.framebuffer.take_dirty();
    display.draw(&machine.framebuffer)?;
    spin_sleep::sleep(hold);
    machine.framebuffer.clear();
    display.draw(&machine.framebuffer)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::DummyDisplay;
    use crate::input::{DummyInput, Input};

    /// asks to quit from `update`, or from inside `wait_for_keypress`
    struct QuittingInput {
        quit: bool,
        updates_before_quit: usize,
    }

    impl Input for QuittingInput {
        fn is_pressed(&mut self, _key: u8) -> Result<bool, io::Error> {
            Ok(false)
        }

        fn wait_for_keypress(&mut self) -> Result<u8, io::Error> {
            self.quit = true;
            Err(io::Error::new(io::ErrorKind::Interrupted, "quit"))
        }

        fn update(&mut self) -> Result<(), io::Error> {
            if self.updates_before_quit == 0 {
                self.quit = true;
            } else {
                self.updates_before_quit -= 1;
            }
            Ok(())
        }

        fn quit_requested(&self) -> bool {
            self.quit
        }
    }

    fn config(max_cycles: u64) -> RunConfig {
        RunConfig {
            tick: Duration::ZERO,
            max_cycles: Some(max_cycles),
        }
    }

    #[test]
    fn test_run_counts_cycles_and_draws() -> Result<(), RunnerError> {
        // I = 0x206; draw; loop on a jump
        let prog = [0xa2, 0x06, 0xd0, 0x01, 0x12, 0x04, 0x80];
        let mut keys = DummyInput::new(&[]);
        let mut m = Chip8Machine::with_seed(1).with_input(&mut keys);
        m.load_program(&prog).map_err(|source| RunnerError::Halted {
            pc: 0,
            instr: 0,
            source,
        })?;
        let mut display = DummyDisplay::new();
        assert_eq!(run(&mut m, &mut display, &config(10))?, 10);
        assert_eq!(display.frames_drawn, 1);
        assert!(display.last_frame.map_or(false, |f| f[0][0]));
        drop(m);
        assert_eq!(keys.updates, 10);
        Ok(())
    }

    #[test]
    fn test_run_reports_halt() {
        let mut m = Chip8Machine::with_seed(1);
        m.load_program(&[0x60, 0x01, 0x80, 0x08]).unwrap();
        let mut display = DummyDisplay::new();
        match run(&mut m, &mut display, &config(10)) {
            Err(RunnerError::Halted { pc, instr, source }) => {
                assert_eq!(pc, 0x202);
                assert_eq!(instr, 0x8008);
                assert!(matches!(source, Chip8Error::MalformedInstruction { .. }));
            }
            other => panic!("expected a halt, got {:?}", other),
        }
        assert_eq!(display.frames_drawn, 0);
    }

    #[test]
    fn test_run_stops_on_quit() -> Result<(), RunnerError> {
        let mut keys = QuittingInput {
            quit: false,
            updates_before_quit: 2,
        };
        let mut m = Chip8Machine::with_seed(1).with_input(&mut keys);
        // loop on a jump
        m.load_program(&[0x12, 0x00]).map_err(|source| RunnerError::Halted {
            pc: 0,
            instr: 0,
            source,
        })?;
        let mut display = DummyDisplay::new();
        assert_eq!(run(&mut m, &mut display, &config(100))?, 3);
        Ok(())
    }

    #[test]
    fn test_run_stops_on_quit_while_waiting_for_key() -> Result<(), RunnerError> {
        let mut keys = QuittingInput {
            quit: false,
            updates_before_quit: 100,
        };
        let mut m = Chip8Machine::with_seed(1).with_input(&mut keys);
        // V3 = 1; wait for a key into V3
        m.load_program(&[0x63, 0x01, 0xf3, 0x0a])
            .map_err(|source| RunnerError::Halted {
                pc: 0,
                instr: 0,
                source,
            })?;
        let mut display = DummyDisplay::new();
        assert_eq!(run(&mut m, &mut display, &config(100))?, 1);
        // the wait never finished
        assert_eq!(m.memory.program_counter, 0x202);
        assert_eq!(m.memory.register(3).unwrap(), 1);
        Ok(())
    }

    #[test]
    fn test_timer_clock() {
        let start = Instant::now();
        let mut clock = TimerClock::new(start);
        assert_eq!(clock.due(start), 0);
        assert_eq!(clock.due(start + TIMER_PERIOD), 1);
        assert_eq!(clock.due(start + TIMER_PERIOD * 4), 3);
        assert_eq!(clock.due(start + TIMER_PERIOD * 4), 0);
    }

    #[test]
    fn test_show_test_pattern() -> Result<(), RunnerError> {
        let mut m = Chip8Machine::with_seed(1);
        let mut display = DummyDisplay::new();
        show_test_pattern(&mut m, &mut display, &[0xf, 0xb], Duration::ZERO)?;
        assert_eq!(display.frames_drawn, 2);
        // glyphs were shown, then the screen was blanked again
        assert!(!m.framebuffer.pixel(0, 0));
        assert!(display.last_frame.map_or(false, |f| f.iter().all(|row| !row.contains(&true))));
        Ok(())
    }
}
