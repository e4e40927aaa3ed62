use std::fmt;

/// A raw CHIP-8 instruction word with its fixed fields pulled out:
///
///   ocxy  opcode class, register X, register Y
///    nnn  12-bit address
///     kk  8-bit immediate
///      n  4-bit nibble
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction(pub u16);

impl Instruction {
    pub fn opcode(self) -> u8 {
        (self.0 >> 12) as u8
    }

    pub fn addr(self) -> u16 {
        self.0 & 0x0fff
    }

    pub fn x(self) -> u8 {
        ((self.0 >> 8) & 0xf) as u8
    }

    pub fn y(self) -> u8 {
        ((self.0 >> 4) & 0xf) as u8
    }

    pub fn byte(self) -> u8 {
        (self.0 & 0xff) as u8
    }

    pub fn nibble(self) -> u8 {
        (self.0 & 0xf) as u8
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:04x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields() {
        let i = Instruction(0xd12f);
        assert_eq!(i.opcode(), 0xd);
        assert_eq!(i.addr(), 0x12f);
        assert_eq!(i.x(), 0x1);
        assert_eq!(i.y(), 0x2);
        assert_eq!(i.byte(), 0x2f);
        assert_eq!(i.nibble(), 0xf);
    }

    #[test]
    fn test_display() {
        assert_eq!(Instruction(0x00e0).to_string(), "00e0");
    }
}
