/// # interpreter
///
/// One call to `step()` runs exactly one instruction:
///  0. 00e0 CLS, 00ee RET
///  1. 1nnn JP nnn
///  2. 2nnn CALL nnn
///  3. 3xkk SE Vx, kk                           -- skips are PC += 4
///  4. 4xkk SNE Vx, kk
///  5. 5xy_ SE Vx, Vy
///  6. 6xkk LD Vx, kk
///  7. 7xkk ADD Vx, kk                          -- no carry
///  8. 8xy0-7,e LD/OR/AND/XOR/ADD/SUB/SHR/SUBN/SHL -- VF as flag
///  9. 9xy_ SNE Vx, Vy
///  A. Annn LD I, nnn
///  B. Bnnn JP V0 + nnn
///  C. Cxkk RND Vx, kk
///  D. Dxyn DRW Vx, Vy, n                       -- VF = collision
///  E. Ex9e SKP Vx, Exa1 SKNP Vx                -- needs a keyboard
///  F. Fx07/0a/15/18/1e/29/33/55/65 timers, keys, I, BCD, bulk load/store
use crate::display::Framebuffer;
use crate::input::Input;
use crate::instruction::Instruction;
use crate::memory::{
    Chip8Memory, MemoryMap, CHIP8_FLAG_REGISTER, CHIP8_FONT_ADDR, CHIP8_FONT_GLYPH_BYTES,
    CHIP8_PROGRAM_ADDR, CHIP8_REGISTER_COUNT,
};
use crate::Chip8Error;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, trace};

/// width of one instruction in bytes
const INSTRUCTION_BYTES: u16 = 2;

pub struct Chip8Machine<'a> {
    pub memory: Chip8Memory,
    pub framebuffer: Framebuffer,
    input: Option<&'a mut dyn Input>,
    rng: StdRng,
}

impl<'a> Chip8Machine<'a> {
    /// fresh machine, random numbers from the OS
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// fresh machine with a repeatable random sequence
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        debug!("new machine, PC at {:#05x}", CHIP8_PROGRAM_ADDR);
        Chip8Machine {
            memory: Chip8Memory::new(),
            framebuffer: Framebuffer::new(),
            input: None,
            rng,
        }
    }

    /// attach a keyboard; without one the key instructions are unimplemented
    pub fn with_input(mut self, input: &'a mut dyn Input) -> Self {
        self.input = Some(input);
        self
    }

    /// the attached keyboard, for the driver to poll between steps
    pub fn input_mut(&mut self) -> Option<&mut (dyn Input + 'a)> {
        self.input.as_deref_mut()
    }

    /// load a chip8 program
    pub fn load_program(&mut self, data: &[u8]) -> Result<(), Chip8Error> {
        self.memory.load(data)
    }

    /// fetch, decode and execute the instruction at PC
    pub fn step(&mut self) -> Result<(), Chip8Error> {
        let pc = self.memory.program_counter;
        let instr = Instruction(self.memory.read_instruction(pc)?);
        trace!("{:#05x}: {}", pc, instr);
        self.memory.program_counter = self.execute(instr, pc)?;
        Ok(())
    }

    fn v(&self, index: u8) -> Result<u8, Chip8Error> {
        self.memory.register(index)
    }

    fn set_v(&mut self, index: u8, value: u8) -> Result<(), Chip8Error> {
        self.memory.set_register(index, value)
    }

    /// the flag goes in first so that an op targeting VF keeps its result
    fn set_v_with_flag(&mut self, index: u8, value: u8, flag: u8) -> Result<(), Chip8Error> {
        self.set_v(CHIP8_FLAG_REGISTER, flag)?;
        self.set_v(index, value)
    }

    fn keyboard(
        &mut self,
        instr: Instruction,
        pc: u16,
    ) -> Result<&mut (dyn Input + 'a), Chip8Error> {
        match self.input_mut() {
            Some(input) => Ok(input),
            None => Err(Chip8Error::Unimplemented { instr: instr.0, pc }),
        }
    }

    /// run `instr` (fetched from `pc`) and work out where PC goes next
    fn execute(&mut self, instr: Instruction, pc: u16) -> Result<u16, Chip8Error> {
        let next = pc.wrapping_add(INSTRUCTION_BYTES);
        let skip = |cond: bool| {
            if cond {
                next.wrapping_add(INSTRUCTION_BYTES)
            } else {
                next
            }
        };
        let malformed = Chip8Error::MalformedInstruction { instr: instr.0, pc };
        let (x, y) = (instr.x(), instr.y());

        match instr.opcode() {
            0x0 => match instr.addr() {
                0x0e0 => {
                    self.framebuffer.clear();
                    Ok(next)
                }
                0x0ee => self.memory.pop_return(),
                _ => Err(malformed),
            },
            0x1 => Ok(instr.addr()),
            0x2 => {
                self.memory.push_return(next)?;
                Ok(instr.addr())
            }
            0x3 => Ok(skip(self.v(x)? == instr.byte())),
            0x4 => Ok(skip(self.v(x)? != instr.byte())),
            0x5 => Ok(skip(self.v(x)? == self.v(y)?)),
            0x6 => {
                self.set_v(x, instr.byte())?;
                Ok(next)
            }
            0x7 => {
                let vx = self.memory.register_mut(x)?;
                *vx = vx.wrapping_add(instr.byte());
                Ok(next)
            }
            0x8 => {
                let (vx, vy) = (self.v(x)?, self.v(y)?);
                match instr.nibble() {
                    0x0 => self.set_v(x, vy)?,
                    0x1 => self.set_v(x, vx | vy)?,
                    0x2 => self.set_v(x, vx & vy)?,
                    0x3 => self.set_v(x, vx ^ vy)?,
                    0x4 => {
                        let sum = vx as u16 + vy as u16;
                        self.set_v_with_flag(x, (sum & 0xff) as u8, (sum > 0xff) as u8)?
                    }
                    0x5 => self.set_v_with_flag(x, vx.wrapping_sub(vy), (vx > vy) as u8)?,
                    0x6 => self.set_v_with_flag(x, vx >> 1, vx & 0x01)?,
                    0x7 => self.set_v_with_flag(x, vy.wrapping_sub(vx), (vy > vx) as u8)?,
                    // NB. VF gets the raw top bit, 0x80 not 1
                    0xe => self.set_v_with_flag(x, vx << 1, vx & 0x80)?,
                    _ => return Err(malformed),
                }
                Ok(next)
            }
            0x9 => Ok(skip(self.v(x)? != self.v(y)?)),
            0xa => {
                self.memory.i = instr.addr();
                Ok(next)
            }
            0xb => Ok(instr.addr() + self.v(0)? as u16),
            0xc => {
                let random: u8 = self.rng.gen();
                self.set_v(x, random & instr.byte())?;
                Ok(next)
            }
            0xd => {
                let (vx, vy) = (self.v(x)?, self.v(y)?);
                let sprite = self
                    .memory
                    .read_bytes(self.memory.i, instr.nibble() as usize)?;
                let collision = self.framebuffer.blit_sprite(sprite, vx, vy);
                self.set_v(CHIP8_FLAG_REGISTER, collision as u8)?;
                Ok(next)
            }
            0xe => {
                let key = self.v(x)? & 0xf;
                let wanted = match instr.byte() {
                    0x9e => true,
                    0xa1 => false,
                    _ => return Err(malformed),
                };
                let pressed = self.keyboard(instr, pc)?.is_pressed(key)?;
                Ok(skip(pressed == wanted))
            }
            0xf => {
                let vx = self.v(x)?;
                match instr.byte() {
                    0x07 => self.set_v(x, self.memory.delay_timer)?,
                    0x0a => {
                        let key = self.keyboard(instr, pc)?.wait_for_keypress()?;
                        self.set_v(x, key)?
                    }
                    0x15 => self.memory.delay_timer = vx,
                    0x18 => self.memory.sound_timer = vx,
                    0x1e => self.memory.i = self.memory.i.wrapping_add(vx as u16),
                    0x29 => self.memory.i = CHIP8_FONT_ADDR + vx as u16 * CHIP8_FONT_GLYPH_BYTES,
                    0x33 => {
                        let i = self.memory.i;
                        self.memory.write_byte(i, vx / 100)?;
                        self.memory.write_byte(i.wrapping_add(1), vx / 10 % 10)?;
                        self.memory.write_byte(i.wrapping_add(2), vx % 10)?;
                    }
                    0x55 => {
                        let i = self.memory.i;
                        for r in 0..=x {
                            let value = self.v(r)?;
                            self.memory.write_byte(i.wrapping_add(r as u16), value)?;
                        }
                    }
                    0x65 => {
                        let i = self.memory.i;
                        if i < CHIP8_PROGRAM_ADDR {
                            return Err(Chip8Error::OutOfBounds { addr: i });
                        }
                        let n = x as usize + 1;
                        let mut regs = [0u8; CHIP8_REGISTER_COUNT];
                        regs[..n].copy_from_slice(self.memory.read_bytes(i, n)?);
                        for (r, value) in regs[..n].iter().enumerate() {
                            self.set_v(r as u8, *value)?;
                        }
                    }
                    _ => return Err(malformed),
                }
                Ok(next)
            }
            _ => Err(malformed),
        }
    }
}

impl Default for Chip8Machine<'_> {
    fn default() -> Self {
        Self::new()
    }
}
