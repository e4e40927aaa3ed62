use crossterm::event::{poll, read, Event, KeyCode, KeyModifiers};
use std::collections::HashMap;
use std::io;
use std::time::{Duration, Instant};
use tracing::warn;

/// map of keys on the left-hand side of a qwerty keyboard to the COSMAC hex
/// keypad:
///   1 2 3 4      1 2 3 C
///   q w e r  =>  4 5 6 D
///   a s d f      7 8 9 E
///   z x c v      A 0 B F
const CHIP8_CONVENTIONAL_KEYMAP: [(char, u8); 16] = [
    ('x', 0x00), // x
    ('1', 0x01), // 1
    ('2', 0x02), // 2
    ('3', 0x03), // 3
    ('q', 0x04), // q
    ('w', 0x05), // w
    ('e', 0x06), // e
    ('a', 0x07), // a
    ('s', 0x08), // s
    ('d', 0x09), // d
    ('z', 0x0a), // z
    ('c', 0x0b), // c
    ('4', 0x0c), // 4
    ('r', 0x0d), // r
    ('f', 0x0e), // f
    ('v', 0x0f), // v
];

/// terminals only report key-down, so a key counts as held for this long
/// after its last press (or auto-repeat)
const KEY_HOLD: Duration = Duration::from_millis(250);

/// reads the hex keypad. keys are 0x0-0xf
pub trait Input {
    /// is key currently held down
    fn is_pressed(&mut self, key: u8) -> Result<bool, io::Error>;

    /// block until a key goes down and return it
    fn wait_for_keypress(&mut self) -> Result<u8, io::Error>;

    /// drain pending events from the device without blocking
    fn update(&mut self) -> Result<(), io::Error>;

    /// has the user asked to stop the machine
    fn quit_requested(&self) -> bool {
        false
    }
}

/// simple implementation of Input, using crossterm key events on STDIN. Raw
/// mode is owned by the display.
pub struct StdinInput {
    last_pressed: [Option<Instant>; 16],
    keymap: HashMap<char, u8>,
    quit: bool,
}

impl StdinInput {
    pub fn new() -> Self {
        StdinInput {
            last_pressed: [None; 16],
            keymap: HashMap::from(CHIP8_CONVENTIONAL_KEYMAP),
            quit: false,
        }
    }

    /// record one event; returns the mapped key if it was a keypad press
    fn handle(&mut self, event: Event) -> Option<u8> {
        match event {
            Event::Key(evt)
                if evt.code == KeyCode::Esc
                    || (evt.code == KeyCode::Char('c')
                        && evt.modifiers.contains(KeyModifiers::CONTROL)) =>
            {
                self.quit = true;
                None
            }
            Event::Key(evt) => match evt.code {
                KeyCode::Char(key) => match self.keymap.get(&key.to_ascii_lowercase()) {
                    Some(&mapped_key) => {
                        self.last_pressed[mapped_key as usize] = Some(Instant::now());
                        Some(mapped_key)
                    }
                    None => {
                        warn!("can't map {:?} to a COSMAC key", key);
                        None
                    }
                },
                _ => None,
            },
            _ => None,
        }
    }
}

impl Default for StdinInput {
    fn default() -> Self {
        Self::new()
    }
}

impl Input for StdinInput {
    fn is_pressed(&mut self, key: u8) -> Result<bool, io::Error> {
        self.update()?;
        Ok(self.last_pressed[(key & 0xf) as usize]
            .map_or(false, |at| at.elapsed() < KEY_HOLD))
    }

    fn wait_for_keypress(&mut self) -> Result<u8, io::Error> {
        loop {
            let event = read()?;
            if let Some(key) = self.handle(event) {
                return Ok(key);
            }
            if self.quit {
                return Err(io::Error::new(
                    io::ErrorKind::Interrupted,
                    "quit while waiting for a key",
                ));
            }
        }
    }

    fn update(&mut self) -> Result<(), io::Error> {
        while poll(Duration::from_millis(0))? {
            let event = read()?;
            self.handle(event);
        }
        Ok(())
    }

    fn quit_requested(&self) -> bool {
        self.quit
    }
}

/// dummy Input implementation for testing
pub struct DummyInput {
    held: Vec<u8>,
    pub updates: usize,
}

impl DummyInput {
    pub fn new(keys: &[u8]) -> Self {
        DummyInput {
            held: Vec::from(keys),
            updates: 0,
        }
    }
}

impl Input for DummyInput {
    fn is_pressed(&mut self, key: u8) -> Result<bool, io::Error> {
        Ok(self.held.contains(&key))
    }

    /// first held key; errors rather than hang if nothing is held
    fn wait_for_keypress(&mut self) -> Result<u8, io::Error> {
        self.held.first().copied().ok_or_else(|| {
            io::Error::new(io::ErrorKind::UnexpectedEof, "no keys left to press")
        })
    }

    fn update(&mut self) -> Result<(), io::Error> {
        self.updates += 1;
        Ok(())
    }
}
