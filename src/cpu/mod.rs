// these modules are re-exported as a single module

pub use self::decoder::*;
mod decoder;

pub use self::flag::*;
mod flag;

pub use self::instruction::*;
mod instruction;

pub use self::register::*;
mod register;

use std::io;
use std::num::Wrapping;

use quick_error::quick_error;

use crate::memory::{MemoryError, MMU};

quick_error! {
    #[derive(Debug)]
    pub enum ExecuteError {
        Memory(err: MemoryError) {
            from()
            display("{}", err)
        }
        StackUnderflow {
            display("pop past the top of the stack")
        }
        UnsupportedService(int: u8, ah: u8) {
            display("unsupported service int 0x{:02X} ah=0x{:02X}", int, ah)
        }
        Output(err: io::Error) {
            from()
            display("character output failed: {}", err)
        }
    }
}

pub struct CPU {
    /// general purpose registers, segment registers, ip, flags
    pub regs: RegisterState,

    pub instruction_count: usize,

    /// toggles non-deterministic behaviour (used by tests)
    pub deterministic: bool,

    pub decoder: Decoder,
}

impl CPU {
    pub fn default() -> Self {
        CPU {
            regs: RegisterState::default(),
            instruction_count: 0,
            deterministic: false,
            decoder: Decoder::default(),
        }
    }

    pub fn deterministic() -> Self {
        let mut res = Self::default();
        res.deterministic = true;
        res
    }

    pub fn get_r16(&self, r: R16) -> u16 {
        self.regs.get_r16(r)
    }

    pub fn set_r16(&mut self, r: R16, val: u16) {
        self.regs.set_r16(r, val);
    }

    pub fn get_r8(&self, r: R8) -> u8 {
        self.regs.get_r8(r)
    }

    pub fn set_r8(&mut self, r: R8, val: u8) {
        self.regs.set_r8(r, val);
    }

    pub fn get_sr(&self, sr: SR) -> u16 {
        self.regs.get_sr(sr)
    }

    pub fn set_sr(&mut self, sr: SR, val: u16) {
        self.regs.set_sr(sr, val);
    }

    pub fn push16(&mut self, mmu: &mut MMU, data: u16) -> Result<(), ExecuteError> {
        let sp = (Wrapping(self.get_r16(R16::SP)) - Wrapping(2)).0;
        self.set_r16(R16::SP, sp);
        let ss = self.get_sr(SR::SS);
        mmu.write_u16(ss, sp, data)?;
        Ok(())
    }

    pub fn pop16(&mut self, mmu: &MMU) -> Result<u16, ExecuteError> {
        let ss = self.get_sr(SR::SS);
        let sp = self.get_r16(R16::SP);
        let (new_sp, overflow) = sp.overflowing_add(2);
        if overflow {
            return Err(ExecuteError::StackUnderflow);
        }
        let data = mmu.read_u16(ss, sp)?;
        self.set_r16(R16::SP, new_sp);
        Ok(data)
    }
}
