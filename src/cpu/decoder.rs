use quick_error::quick_error;

use crate::cpu::instruction::{Instruction, ModRegRm};
use crate::cpu::register::{r16, r8, sr};
use crate::memory::{MemoryError, MMU};

#[cfg(test)]
#[path = "./decoder_test.rs"]
mod decoder_test;

quick_error! {
    #[derive(Debug, Clone, PartialEq)]
    pub enum DecodeError {
        UnknownOpcode(op: u8, addr: u32) {
            display("unknown opcode 0x{:02X} at 0x{:06X}", op, addr)
        }
        UnsupportedModRm(op: u8, modrm: u8, addr: u32) {
            display("unsupported mod/reg/rm 0x{:02X} for opcode 0x{:02X} at 0x{:06X}", modrm, op, addr)
        }
        Fetch(err: MemoryError) {
            from()
            display("instruction fetch failed: {}", err)
        }
    }
}

/// decodes one instruction at a segment:offset position; never touches
/// machine state, so decoding is restartable from any position
#[derive(Clone, Default)]
pub struct Decoder;

impl Decoder {
    pub fn decode(&self, mmu: &MMU, seg: u16, offset: u16) -> Result<(Instruction, u16), DecodeError> {
        let mut cur = Cursor { mmu, seg, start: offset, offset };

        let b = cur.read_u8()?;
        let inst = match b {
            0x50..=0x57 => Instruction::Push16 { src: r16(b - 0x50) },
            0x58..=0x5F => Instruction::Pop16 { dst: r16(b - 0x58) },
            0x83 => {
                // <arith> r/m16, imm8; the reg field selects the operation
                let x = cur.read_modregrm()?;
                if x.md != 0b11 {
                    return Err(DecodeError::UnsupportedModRm(b, x.u8(), cur.addr()));
                }
                let dst = r16(x.rm);
                let imm = cur.read_i8()?;
                match x.reg {
                    0 => Instruction::Add16Imm8 { dst, imm },
                    5 => Instruction::Sub16Imm8 { dst, imm },
                    _ => return Err(DecodeError::UnsupportedModRm(b, x.u8(), cur.addr())),
                }
            }
            0x8B => {
                // mov r16, r/m16
                let x = cur.read_modregrm()?;
                match (x.md, x.rm) {
                    (0b11, _) => Instruction::Mov16 { dst: r16(x.reg), src: r16(x.rm) },
                    (0b01, 0b110) => Instruction::MovMemBp { dst: r16(x.reg), disp: cur.read_i8()? },
                    _ => return Err(DecodeError::UnsupportedModRm(b, x.u8(), cur.addr())),
                }
            }
            0x8D => {
                // lea r16, [imm16]
                let x = cur.read_modregrm()?;
                if x.md != 0b00 || x.rm != 0b110 {
                    return Err(DecodeError::UnsupportedModRm(b, x.u8(), cur.addr()));
                }
                Instruction::Lea16 { dst: r16(x.reg), address: cur.read_u16()? }
            }
            0x8E => {
                // mov sreg, r/m16
                let x = cur.read_modregrm()?;
                if x.md != 0b11 || x.reg > 3 {
                    return Err(DecodeError::UnsupportedModRm(b, x.u8(), cur.addr()));
                }
                Instruction::MovSreg { dst: sr(x.reg), src: r16(x.rm) }
            }
            0xB0..=0xB7 => Instruction::MovImm8 { dst: r8(b - 0xB0), imm: cur.read_u8()? },
            0xB8..=0xBF => Instruction::MovImm16 { dst: r16(b - 0xB8), imm: cur.read_u16()? },
            0xC1 => {
                // shift r/m16, imm8; the reg field selects the shift kind
                let x = cur.read_modregrm()?;
                if x.md != 0b11 || x.reg != 4 {
                    return Err(DecodeError::UnsupportedModRm(b, x.u8(), cur.addr()));
                }
                Instruction::Shl16Imm8 { dst: r16(x.rm), imm: cur.read_u8()? }
            }
            0xC3 => Instruction::Retn,
            0xCD => Instruction::Int { int: cur.read_u8()? },
            0xE8 => Instruction::CallNear { rel: cur.read_i16()? },
            _ => return Err(DecodeError::UnknownOpcode(b, cur.addr())),
        };

        Ok((inst, cur.len()))
    }
}

/// fetch cursor over the code segment; the offset wraps at 64k like IP does
struct Cursor<'a> {
    mmu: &'a MMU,
    seg: u16,
    start: u16,
    offset: u16,
}

impl<'a> Cursor<'a> {
    fn read_u8(&mut self) -> Result<u8, DecodeError> {
        let b = self.mmu.read_u8(self.seg, self.offset)?;
        self.offset = self.offset.wrapping_add(1);
        Ok(b)
    }

    fn read_u16(&mut self) -> Result<u16, DecodeError> {
        let lo = self.read_u8()?;
        let hi = self.read_u8()?;
        Ok(u16::from(hi) << 8 | u16::from(lo))
    }

    fn read_i8(&mut self) -> Result<i8, DecodeError> {
        Ok(self.read_u8()? as i8)
    }

    fn read_i16(&mut self) -> Result<i16, DecodeError> {
        Ok(self.read_u16()? as i16)
    }

    fn read_modregrm(&mut self) -> Result<ModRegRm, DecodeError> {
        Ok(ModRegRm::parse(self.read_u8()?))
    }

    fn len(&self) -> u16 {
        self.offset.wrapping_sub(self.start)
    }

    /// flat address of the instruction being decoded, for error reporting
    fn addr(&self) -> u32 {
        MMU::to_flat(self.seg, self.start)
    }
}
