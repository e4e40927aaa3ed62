use crossterm::terminal;
use std::io;
use tui::backend::CrosstermBackend;
use tui::layout::Rect;
use tui::style::{Color, Style};
use tui::symbols::Marker;
use tui::widgets::canvas::{Canvas, Points};
use tui::widgets::{Block, Borders};
use tui::Terminal;

pub const CHIP8_DISPLAY_WIDTH: usize = 64;
pub const CHIP8_DISPLAY_HEIGHT: usize = 32;

/// one row of pixels, left to right
pub type Row = [bool; CHIP8_DISPLAY_WIDTH];

/// The machine's own picture of the screen: a grid of on/off pixels and a
/// flag saying whether anything drew since the renderer last looked.
pub struct Framebuffer {
    pixels: [Row; CHIP8_DISPLAY_HEIGHT],
    dirty: bool,
}

impl Framebuffer {
    pub fn new() -> Self {
        Framebuffer {
            pixels: [[false; CHIP8_DISPLAY_WIDTH]; CHIP8_DISPLAY_HEIGHT],
            dirty: false,
        }
    }

    /// blank every pixel. a clear on its own doesn't ask for a redraw
    pub fn clear(&mut self) {
        self.pixels = [[false; CHIP8_DISPLAY_WIDTH]; CHIP8_DISPLAY_HEIGHT];
        self.dirty = false;
    }

    /// XOR `sprite` onto the grid with its top-left corner at (x, y). Each
    /// byte is a row of 8 pixels, MSB leftmost. Pixels falling off the right
    /// or bottom edge are dropped, not wrapped.
    ///
    /// Returns true if any pixel that was on got turned off.
    pub fn blit_sprite(&mut self, sprite: &[u8], x: u8, y: u8) -> bool {
        let (x, y) = (x as usize, y as usize);
        let mut collision = false;
        for (z, byte) in sprite.iter().enumerate() {
            let row = y + z;
            if row >= CHIP8_DISPLAY_HEIGHT {
                break;
            }
            for column in 0..8 {
                let col = x + column;
                if col >= CHIP8_DISPLAY_WIDTH {
                    break;
                }
                let bit = (byte >> (7 - column)) & 1 == 1;
                let old = self.pixels[row][col];
                if old && bit {
                    collision = true;
                }
                self.pixels[row][col] = old ^ bit;
            }
        }
        // NB. dirty even if nothing changed
        self.dirty = true;
        collision
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// read the dirty flag and reset it; called by whoever renders the frame
    pub fn take_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.dirty, false)
    }

    /// off-screen pixels read as unset
    pub fn pixel(&self, x: usize, y: usize) -> bool {
        self.pixels
            .get(y)
            .and_then(|row| row.get(x))
            .copied()
            .unwrap_or(false)
    }

    pub fn snapshot(&self) -> [Row; CHIP8_DISPLAY_HEIGHT] {
        self.pixels
    }
}

impl Default for Framebuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Display is used by the driver to put the framebuffer on a screen. It
/// should abstract the implementation details, so a variety of kinds of
/// screen would work.
pub trait Display {
    fn draw(&mut self, frame: &Framebuffer) -> Result<(), io::Error>;
}

// store useful metadata about the terminal
struct Resolution(usize, usize);

impl Resolution {
    fn pixel_count(&self) -> usize {
        self.0 * self.1
    }

    fn x_bounds(&self) -> [f64; 2] {
        [0.0, (self.0 - 1) as f64]
    }

    fn y_bounds(&self) -> [f64; 2] {
        [-1.0 * (self.1 - 1) as f64, 0.0]
    }

    /// canvas coords of every pixel in `frame` that is `lit`
    fn bitplane_from_frame<'a>(
        &self,
        frame: &'a Framebuffer,
        lit: bool,
    ) -> impl std::iter::Iterator<Item = (f64, f64)> + 'a {
        let mut count = self.pixel_count();
        let w = self.0;
        std::iter::from_fn(move || {
            while count > 0 {
                count -= 1;
                let (x, y) = (count % w, count / w);
                if frame.pixel(x, y) == lit {
                    return Some((
                        x as f64,        // x
                        -1.0 * y as f64, // y
                    ));
                }
            }
            None
        })
    }
}

/// monochrome display in a terminal, rendered using TUI and crossterm
pub struct MonoTermDisplay {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
    resolution: Resolution,
}

impl MonoTermDisplay {
    pub fn new() -> Result<MonoTermDisplay, io::Error> {
        terminal::enable_raw_mode()?;
        let backend = CrosstermBackend::new(io::stdout());
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;
        terminal.hide_cursor()?;
        Ok(MonoTermDisplay {
            terminal,
            resolution: Resolution(CHIP8_DISPLAY_WIDTH, CHIP8_DISPLAY_HEIGHT),
        })
    }
}

impl Drop for MonoTermDisplay {
    fn drop(&mut self) {
        let _ = self.terminal.show_cursor();
        let _ = terminal::disable_raw_mode();
    }
}

impl Display for MonoTermDisplay {
    fn draw(&mut self, frame: &Framebuffer) -> Result<(), io::Error> {
        let off: Vec<_> = self.resolution.bitplane_from_frame(frame, false).collect();
        let on: Vec<_> = self.resolution.bitplane_from_frame(frame, true).collect();
        let size = Rect::new(
            0,
            0,
            2 + self.resolution.0 as u16,
            2 + self.resolution.1 as u16,
        );
        let x_bounds = self.resolution.x_bounds();
        let y_bounds = self.resolution.y_bounds();

        // for now this assumes a 1:1 ratio between terminal, chip8 and the
        // internal TUI canvas
        self.terminal.draw(|f| {
            let canvas = Canvas::default()
                .block(
                    Block::default()
                        .title("CHIP-8")
                        .borders(Borders::ALL)
                        .style(Style::default().bg(Color::Black)),
                )
                .x_bounds(x_bounds)
                .y_bounds(y_bounds)
                .marker(Marker::Block) //Braille
                .paint(|ctx| {
                    ctx.draw(&Points {
                        coords: &off,
                        color: Color::Black,
                    });
                    ctx.draw(&Points {
                        coords: &on,
                        color: Color::White,
                    });
                });
            f.render_widget(canvas, size);
        })?;
        Ok(())
    }
}

/// useful for testing non-display routines; remembers the last frame
pub struct DummyDisplay {
    pub frames_drawn: usize,
    pub last_frame: Option<[Row; CHIP8_DISPLAY_HEIGHT]>,
}

impl DummyDisplay {
    pub fn new() -> Self {
        DummyDisplay {
            frames_drawn: 0,
            last_frame: None,
        }
    }
}

impl Default for DummyDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for DummyDisplay {
    fn draw(&mut self, frame: &Framebuffer) -> Result<(), io::Error> {
        self.frames_drawn += 1;
        self.last_frame = Some(frame.snapshot());
        Ok(())
    }
}
