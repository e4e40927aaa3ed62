use crate::Chip8Error;
use tracing::debug;

// NB. addresses are u16 as per the chip-8; lengths are usize to stop endless casting

/// Represents the addressable RAM. Reads are checked against the end of the
/// region; writes through `write_byte` are also kept out of the interpreter
/// area below the program address.
pub trait MemoryMap {
    /// get a two-byte word, high byte first (instructions)
    fn get_word(&self, addr: u16) -> Result<u16, Chip8Error> {
        let word = self.get_ro_slice(addr, 2)?;
        Ok(((word[0] as u16) << 8) | (word[1] as u16))
    }

    fn read_byte(&self, addr: u16) -> Result<u8, Chip8Error> {
        Ok(self.get_ro_slice(addr, 1)?[0])
    }

    /// write one byte on behalf of a running program
    fn write_byte(&mut self, addr: u16, value: u8) -> Result<(), Chip8Error> {
        self.get_rw_slice(addr, 1)?[0] = value;
        Ok(())
    }

    /// get a r/w slice of the program-writable memory
    fn get_rw_slice(&mut self, addr: u16, len: usize) -> Result<&mut [u8], Chip8Error>;

    /// get a r/o slice of anywhere in memory
    fn get_ro_slice(&self, addr: u16, len: usize) -> Result<&[u8], Chip8Error>;
}

/// how much RAM we have
pub const CHIP8_RAM_SIZE_BYTES: u16 = 4096;

/// where the program is loaded; everything below belongs to the interpreter
pub const CHIP8_PROGRAM_ADDR: u16 = 0x0200;

/// largest program image that fits
pub const CHIP8_PROGRAM_CAPACITY: usize = (CHIP8_RAM_SIZE_BYTES - CHIP8_PROGRAM_ADDR) as usize;

pub const CHIP8_REGISTER_COUNT: usize = 16;
pub const CHIP8_STACK_DEPTH: usize = 16;

/// VF doubles as carry/borrow/collision output
pub const CHIP8_FLAG_REGISTER: u8 = 0xf;

/// Defines the CHIP-8 machine state:
///   0x0000-0x004f  interpreter (unused)
///   0x0050-0x009f  font, 16 glyphs x 5 rows
///   0x00a0-0x01ff  interpreter (unused)
///   0x0200-0x0fff  program
///
/// plus the register file, I, PC, call stack and the two timers. Programs
/// can only write from 0x200 up.
pub struct Chip8Memory {
    bytes: Box<[u8]>,
    v: [u8; CHIP8_REGISTER_COUNT],
    stack: [u16; CHIP8_STACK_DEPTH],
    // number of live stack entries; 0 is empty
    stack_len: usize,
    pub program_counter: u16,
    pub i: u16,
    pub delay_timer: u8,
    pub sound_timer: u8,
}

impl MemoryMap for Chip8Memory {
    fn get_rw_slice(&mut self, addr: u16, len: usize) -> Result<&mut [u8], Chip8Error> {
        let a = addr as usize;
        if addr < CHIP8_PROGRAM_ADDR || a + len > self.bytes.len() {
            return Err(Chip8Error::OutOfBounds { addr });
        }
        Ok(&mut self.bytes[a..(a + len)])
    }

    fn get_ro_slice(&self, addr: u16, len: usize) -> Result<&[u8], Chip8Error> {
        let a = addr as usize;
        self.bytes
            .get(a..(a + len))
            .ok_or(Chip8Error::OutOfBounds { addr })
    }
}

impl Chip8Memory {
    /// zeroed memory with the font baked in, PC at the program and an empty
    /// stack
    pub fn new() -> Self {
        let mut mm = Chip8Memory {
            bytes: Box::new([0u8; CHIP8_RAM_SIZE_BYTES as usize]),
            v: [0; CHIP8_REGISTER_COUNT],
            stack: [0; CHIP8_STACK_DEPTH],
            stack_len: 0,
            program_counter: CHIP8_PROGRAM_ADDR,
            i: 0,
            delay_timer: 0,
            sound_timer: 0,
        };
        mm.load_font_table();
        mm
    }

    /// the font sits below the program area so this goes around the write guard
    pub fn load_font_table(&mut self) {
        let a = CHIP8_FONT_ADDR as usize;
        self.bytes[a..(a + CHIP8_FONT.len())].copy_from_slice(&CHIP8_FONT);
    }

    /// load a CHIP-8 program at 0x200; all of it or none of it
    pub fn load(&mut self, data: &[u8]) -> Result<(), Chip8Error> {
        if data.len() > CHIP8_PROGRAM_CAPACITY {
            return Err(Chip8Error::CapacityExceeded {
                len: data.len(),
                capacity: CHIP8_PROGRAM_CAPACITY,
            });
        }
        self.get_rw_slice(CHIP8_PROGRAM_ADDR, data.len())?
            .copy_from_slice(data);
        debug!("loaded {} byte program at {:#05x}", data.len(), CHIP8_PROGRAM_ADDR);
        Ok(())
    }

    /// fetch the instruction word at `addr`
    pub fn read_instruction(&self, addr: u16) -> Result<u16, Chip8Error> {
        self.get_word(addr)
    }

    /// `n` bytes from `addr` (sprites, register loads)
    pub fn read_bytes(&self, addr: u16, n: usize) -> Result<&[u8], Chip8Error> {
        self.get_ro_slice(addr, n)
    }

    fn check_register(index: u8) -> Result<usize, Chip8Error> {
        match index as usize {
            i if i < CHIP8_REGISTER_COUNT => Ok(i),
            _ => Err(Chip8Error::InvalidRegister { index }),
        }
    }

    pub fn register(&self, index: u8) -> Result<u8, Chip8Error> {
        Ok(self.v[Self::check_register(index)?])
    }

    pub fn set_register(&mut self, index: u8, value: u8) -> Result<(), Chip8Error> {
        self.v[Self::check_register(index)?] = value;
        Ok(())
    }

    /// exclusive borrow of one register, for read-modify-write
    pub fn register_mut(&mut self, index: u8) -> Result<&mut u8, Chip8Error> {
        Ok(&mut self.v[Self::check_register(index)?])
    }

    pub fn push_return(&mut self, addr: u16) -> Result<(), Chip8Error> {
        if self.stack_len == CHIP8_STACK_DEPTH {
            return Err(Chip8Error::StackOverflow { addr });
        }
        self.stack[self.stack_len] = addr;
        self.stack_len += 1;
        Ok(())
    }

    pub fn pop_return(&mut self) -> Result<u16, Chip8Error> {
        if self.stack_len == 0 {
            return Err(Chip8Error::StackUnderflow);
        }
        self.stack_len -= 1;
        Ok(self.stack[self.stack_len])
    }

    pub fn stack_depth(&self) -> usize {
        self.stack_len
    }

    /// count both timers down by one; the driver calls this at 60Hz
    pub fn tick_timers(&mut self) {
        self.delay_timer = self.delay_timer.saturating_sub(1);
        self.sound_timer = self.sound_timer.saturating_sub(1);
    }
}

impl Default for Chip8Memory {
    fn default() -> Self {
        Self::new()
    }
}

pub const CHIP8_FONT_ADDR: u16 = 0x050;
pub const CHIP8_FONT_GLYPH_BYTES: u16 = 5;
const CHIP8_FONT: [u8; 80] = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_zeroed() {
        let m = Chip8Memory::new();
        // NB. memory is zeroed from 0x200 because before that we bake in the font
        assert_eq!(m.bytes[0x200..], [0; 0xe00]);
        assert_eq!(m.v, [0; 16]);
        assert_eq!(m.program_counter, 0x200);
        assert_eq!(m.stack_depth(), 0);
    }

    #[test]
    fn test_font_loaded() {
        let m = Chip8Memory::new();
        assert_eq!(m.bytes[..0x50], [0; 0x50]);
        assert_eq!(m.bytes[0x50..0xa0], CHIP8_FONT);
        assert_eq!(m.read_bytes(0x50 + 0xb * 5, 5).unwrap(), &[0xE0, 0x90, 0xE0, 0x90, 0xE0]);
    }

    #[test]
    fn test_program_load_ok() -> Result<(), Chip8Error> {
        let mut m = Chip8Memory::new();
        m.load(&[0x00, 0xe0])?; // clear screen
        assert_eq!(m.get_ro_slice(0x200, 2)?, &[0x00, 0xe0]);
        Ok(())
    }

    #[test]
    fn test_program_load_exact_capacity() -> Result<(), Chip8Error> {
        let mut m = Chip8Memory::new();
        m.load(&[0xaa; 3584])?;
        assert_eq!(m.read_byte(0xfff)?, 0xaa);
        Ok(())
    }

    #[test]
    fn test_program_load_one_over() {
        let mut m = Chip8Memory::new();
        let res = m.load(&[0xaa; 3585]);
        assert!(matches!(
            res,
            Err(Chip8Error::CapacityExceeded { len: 3585, capacity: 3584 })
        ));
        // nothing was copied
        assert_eq!(m.bytes[0x200..], [0; 0xe00]);
    }

    #[test]
    fn test_read_word() -> Result<(), Chip8Error> {
        let mut m = Chip8Memory::new();
        m.load(&[0, 1, 2, 3, 4, 5, 6, 7])?;
        assert_eq!(m.read_instruction(0x204)?, 0x0405);
        Ok(())
    }

    #[test]
    fn test_read_word_past_end() {
        let m = Chip8Memory::new();
        assert!(matches!(
            m.read_instruction(0xfff),
            Err(Chip8Error::OutOfBounds { addr: 0xfff })
        ));
    }

    #[test]
    fn test_read_too_much() {
        let m = Chip8Memory::new();
        assert!(m.read_bytes(0xffc, 4).is_ok());
        assert!(m.read_bytes(0xffc, 5).is_err());
    }

    #[test]
    fn test_write_byte_bounds() {
        let mut m = Chip8Memory::new();
        assert!(m.write_byte(0x200, 1).is_ok());
        assert!(m.write_byte(0xfff, 2).is_ok());
        assert!(matches!(
            m.write_byte(0x1ff, 3),
            Err(Chip8Error::OutOfBounds { addr: 0x1ff })
        ));
        assert!(matches!(
            m.write_byte(0x1000, 4),
            Err(Chip8Error::OutOfBounds { addr: 0x1000 })
        ));
        // font can't be scribbled on
        assert!(m.write_byte(CHIP8_FONT_ADDR, 0).is_err());
        assert_eq!(m.bytes[0x50], 0xF0);
    }

    #[test]
    fn test_registers() -> Result<(), Chip8Error> {
        let mut m = Chip8Memory::new();
        m.set_register(0x3, 0x42)?;
        *m.register_mut(0xf)? = 1;
        assert_eq!(m.register(0x3)?, 0x42);
        assert_eq!(m.register(0xf)?, 1);
        assert!(matches!(
            m.register(16),
            Err(Chip8Error::InvalidRegister { index: 16 })
        ));
        assert!(m.set_register(0xff, 0).is_err());
        Ok(())
    }

    #[test]
    fn test_stack_overflow() -> Result<(), Chip8Error> {
        let mut m = Chip8Memory::new();
        for n in 0..16 {
            m.push_return(0x200 + 2 * n)?;
        }
        assert!(matches!(
            m.push_return(0x300),
            Err(Chip8Error::StackOverflow { .. })
        ));
        assert_eq!(m.stack_depth(), 16);
        Ok(())
    }

    #[test]
    fn test_stack_underflow() {
        let mut m = Chip8Memory::new();
        assert!(matches!(m.pop_return(), Err(Chip8Error::StackUnderflow)));
    }

    #[test]
    fn test_stack_push_pop() -> Result<(), Chip8Error> {
        let mut m = Chip8Memory::new();
        m.push_return(0x234)?;
        m.push_return(0x456)?;
        assert_eq!(m.pop_return()?, 0x456);
        assert_eq!(m.pop_return()?, 0x234);
        assert!(m.pop_return().is_err());
        Ok(())
    }

    #[test]
    fn test_tick_timers() {
        let mut m = Chip8Memory::new();
        m.delay_timer = 2;
        m.sound_timer = 1;
        m.tick_timers();
        assert_eq!((m.delay_timer, m.sound_timer), (1, 0));
        m.tick_timers();
        m.tick_timers();
        assert_eq!((m.delay_timer, m.sound_timer), (0, 0));
    }

    #[test]
    fn test_mem_layout() {
        assert_eq!(CHIP8_PROGRAM_CAPACITY, 0xe00);
        assert_eq!(CHIP8_FONT_ADDR + 16 * CHIP8_FONT_GLYPH_BYTES, 0xa0);
    }
}
