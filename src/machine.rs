use std::io::{self, Write};

use quick_error::quick_error;

use crate::cpu::{DecodeError, ExecuteError, Instruction, RegisterState, CPU, R16, SR};
use crate::dos;
use crate::format::{ExeFile, LoaderError, PARAGRAPH_SIZE};
use crate::hex::hex_bytes;
use crate::memory::MMU;

#[cfg(test)]
#[path = "./machine_test.rs"]
mod machine_test;

/// segment the image is staged at; the PSP notionally sits here as well,
/// so DS and ES start out pointing at it
pub const LOAD_BASE_SEGMENT: u16 = 0;

/// what the emulator does after a step or a service call
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Action {
    Continue,
    Halt(u8),
}

/// interrupt service routine: vector, cpu, memory, character sink
pub type IntHandler =
    fn(u8, &mut CPU, &mut MMU, &mut dyn Write) -> Result<Action, ExecuteError>;

quick_error! {
    #[derive(Debug)]
    pub enum RunError {
        Loader(err: LoaderError) {
            from()
            display("load failed: {}", err)
        }
        Decode(err: DecodeError) {
            from()
            display("decode failed: {}", err)
        }
        Execute(err: ExecuteError) {
            from()
            display("execute failed: {}", err)
        }
    }
}

/// exit code and final register state of a completed program
pub struct ExeResult {
    pub exit_code: u8,
    pub regs: RegisterState,
}

pub struct Machine {
    pub cpu: CPU,
    pub mmu: MMU,

    /// set once a terminate service fires
    pub exit_code: Option<u8>,

    /// prints each instruction before it executes
    pub trace: bool,

    int_handlers: [IntHandler; 256],
    sink: Box<dyn Write>,
}

impl Machine {
    pub fn default() -> Self {
        Self::with_sink(Box::new(io::stdout()))
    }

    /// deterministic machine for tests: time services return zeros
    pub fn deterministic() -> Self {
        let mut m = Self::default();
        m.cpu = CPU::deterministic();
        m
    }

    /// routes character output (int 21h ah=02h/09h) to `sink` instead of
    /// the process stdout
    pub fn with_sink(sink: Box<dyn Write>) -> Self {
        let mut int_handlers: [IntHandler; 256] = [dos::unsupported; 256];
        int_handlers[0x20] = dos::int20;
        int_handlers[0x21] = dos::int21;

        Machine {
            cpu: CPU::default(),
            mmu: MMU::default(),
            exit_code: None,
            trace: false,
            int_handlers,
            sink,
        }
    }

    /// replaces the service routine behind one interrupt vector
    pub fn set_int_handler(&mut self, int: u8, handler: IntHandler) {
        self.int_handlers[int as usize] = handler;
    }

    /// parses an MZ image, stages the code at the load base, applies the
    /// relocations and sets up the initial register state
    pub fn load_executable(&mut self, data: &[u8]) -> Result<(), LoaderError> {
        let exe = ExeFile::from_data(data)?;
        let base = LOAD_BASE_SEGMENT;

        // the image covers the staged code plus the stack reachable from
        // the initial SS:SP
        let code_start = MMU::to_flat(base, 0) as usize;
        let code_end = code_start + exe.code.len();
        let stack_top =
            MMU::to_flat(base.wrapping_add(exe.header.ss), 0) as usize + exe.header.sp as usize;
        let size = round_up_to_paragraph(code_end.max(stack_top));

        let mut memory = vec![0u8; size];
        memory[code_start..code_end].copy_from_slice(&exe.code);
        self.mmu = MMU::from_vec(memory);

        // add the load base to each absolute segment word in the image
        for reloc in &exe.relocs {
            let seg = base.wrapping_add(reloc.segment);
            let addr = MMU::to_flat(seg, reloc.offset);
            let word = self
                .mmu
                .read_u16(seg, reloc.offset)
                .map_err(|_| LoaderError::RelocationOutOfRange(addr))?;
            self.mmu
                .write_u16(seg, reloc.offset, word.wrapping_add(base))
                .map_err(|_| LoaderError::RelocationOutOfRange(addr))?;
        }

        let deterministic = self.cpu.deterministic;
        self.cpu = CPU::default();
        self.cpu.deterministic = deterministic;

        // CS and SS are relative to the load base; DS and ES start at the PSP
        self.cpu.set_sr(SR::CS, base.wrapping_add(exe.header.cs));
        self.cpu.set_sr(SR::SS, base.wrapping_add(exe.header.ss));
        self.cpu.set_sr(SR::DS, base);
        self.cpu.set_sr(SR::ES, base);
        self.cpu.regs.ip = exe.header.ip;
        self.cpu.set_r16(R16::SP, exe.header.sp);

        Ok(())
    }

    /// executes one instruction at CS:IP
    pub fn step(&mut self) -> Result<Action, RunError> {
        let cs = self.cpu.get_sr(SR::CS);
        let ip = self.cpu.regs.ip;
        let (inst, length) = self.cpu.decoder.decode(&self.mmu, cs, ip)?;
        if self.trace {
            self.trace_instruction(cs, ip, length, &inst);
        }

        // IP moves past the instruction first; a call pushes this value as
        // its return address
        self.cpu.regs.ip = ip.wrapping_add(length);
        self.cpu.instruction_count += 1;

        Ok(self.execute(&inst)?)
    }

    /// runs until a service halts the program, returning the DOS exit code;
    /// cpu and memory stay observable afterwards
    pub fn run(&mut self) -> Result<u8, RunError> {
        loop {
            if let Action::Halt(code) = self.step()? {
                self.exit_code = Some(code);
                return Ok(code);
            }
        }
    }

    fn execute(&mut self, inst: &Instruction) -> Result<Action, ExecuteError> {
        match *inst {
            Instruction::MovImm16 { dst, imm } => self.cpu.set_r16(dst, imm),
            Instruction::MovImm8 { dst, imm } => self.cpu.set_r8(dst, imm),
            Instruction::MovSreg { dst, src } => {
                let v = self.cpu.get_r16(src);
                self.cpu.set_sr(dst, v);
            }
            Instruction::Mov16 { dst, src } => {
                let v = self.cpu.get_r16(src);
                self.cpu.set_r16(dst, v);
            }
            Instruction::MovMemBp { dst, disp } => {
                // BP-based addressing defaults to the stack segment
                let ss = self.cpu.get_sr(SR::SS);
                let off = self.cpu.get_r16(R16::BP).wrapping_add(disp as u16);
                let v = self.mmu.read_u16(ss, off)?;
                self.cpu.set_r16(dst, v);
            }
            Instruction::Add16Imm8 { dst, imm } => {
                let v1 = self.cpu.get_r16(dst) as usize;
                let v2 = imm as u16 as usize; // sign-extended
                let res = v1 + v2;
                let flags = &mut self.cpu.regs.flags;
                flags.set_carry_u16(res);
                flags.set_zero_u16(res);
                flags.set_sign_u16(res);
                flags.set_overflow_add_u16(res, v1, v2);
                self.cpu.set_r16(dst, res as u16);
            }
            Instruction::Sub16Imm8 { dst, imm } => {
                let dst_val = self.cpu.get_r16(dst) as usize;
                let src_val = imm as u16 as usize; // sign-extended
                let res = dst_val.wrapping_sub(src_val);
                let flags = &mut self.cpu.regs.flags;
                flags.set_carry_u16(res);
                flags.set_zero_u16(res);
                flags.set_sign_u16(res);
                flags.set_overflow_sub_u16(res, src_val, dst_val);
                self.cpu.set_r16(dst, res as u16);
            }
            Instruction::Shl16Imm8 { dst, imm } => {
                // only the low 5 bits of the count are used (alias: sal)
                let count = u32::from(imm & 0x1F);
                if count > 0 {
                    let res = (self.cpu.get_r16(dst) as usize).wrapping_shl(count);
                    let flags = &mut self.cpu.regs.flags;
                    flags.carry = res & 0x1_0000 != 0;
                    if count == 1 {
                        flags.overflow = (res & 0x8000 != 0) != flags.carry;
                    }
                    flags.set_zero_u16(res);
                    flags.set_sign_u16(res);
                    self.cpu.set_r16(dst, res as u16);
                }
            }
            Instruction::Push16 { src } => {
                let v = self.cpu.get_r16(src);
                self.cpu.push16(&mut self.mmu, v)?;
            }
            Instruction::Pop16 { dst } => {
                let v = self.cpu.pop16(&self.mmu)?;
                self.cpu.set_r16(dst, v);
            }
            Instruction::Lea16 { dst, address } => {
                // the effective address itself, not a load through it
                self.cpu.set_r16(dst, address);
            }
            Instruction::CallNear { rel } => {
                let ip = self.cpu.regs.ip;
                self.cpu.push16(&mut self.mmu, ip)?;
                self.cpu.regs.ip = ip.wrapping_add(rel as u16);
            }
            Instruction::Retn => {
                self.cpu.regs.ip = self.cpu.pop16(&self.mmu)?;
            }
            Instruction::Int { int } => {
                let handler = self.int_handlers[int as usize];
                return handler(int, &mut self.cpu, &mut self.mmu, &mut *self.sink);
            }
        }
        Ok(Action::Continue)
    }

    fn trace_instruction(&self, cs: u16, ip: u16, length: u16, inst: &Instruction) {
        let bytes = self.mmu.read(cs, ip, length as usize).unwrap_or_default();
        println!("[{:04X}:{:04X}] {:12} {}", cs, ip, hex_bytes(&bytes), inst);
    }
}

/// loads and runs an MZ executable to completion
pub fn run_exe(data: &[u8]) -> Result<ExeResult, RunError> {
    let mut machine = Machine::default();
    machine.load_executable(data)?;
    let exit_code = machine.run()?;
    Ok(ExeResult { exit_code, regs: machine.cpu.regs })
}

fn round_up_to_paragraph(size: usize) -> usize {
    (size + PARAGRAPH_SIZE - 1) / PARAGRAPH_SIZE * PARAGRAPH_SIZE
}
