use std::io::Write;

use chrono::prelude::*;

use crate::cpu::{ExecuteError, CPU, R16, R8, SR};
use crate::machine::Action;
use crate::memory::MMU;

/// default routine for vectors without an installed service
pub fn unsupported(
    int: u8,
    cpu: &mut CPU,
    _mmu: &mut MMU,
    _out: &mut dyn Write,
) -> Result<Action, ExecuteError> {
    Err(ExecuteError::UnsupportedService(int, cpu.get_r8(R8::AH)))
}

/// int 20h - DOS 1+ - TERMINATE PROGRAM
pub fn int20(
    _int: u8,
    _cpu: &mut CPU,
    _mmu: &mut MMU,
    _out: &mut dyn Write,
) -> Result<Action, ExecuteError> {
    Ok(Action::Halt(0))
}

/// int 21h - DOS services, dispatched on AH
pub fn int21(
    int: u8,
    cpu: &mut CPU,
    mmu: &mut MMU,
    out: &mut dyn Write,
) -> Result<Action, ExecuteError> {
    match cpu.get_r8(R8::AH) {
        0x00 => {
            // DOS 1+ - TERMINATE PROGRAM
            Ok(Action::Halt(0))
        }
        0x02 => {
            // DOS 1+ - WRITE CHARACTER TO STANDARD OUTPUT
            // DL = character to write
            let dl = cpu.get_r8(R8::DL);
            out.write_all(&[dl])?;
            // Return:
            // AL = last character output
            cpu.set_r8(R8::AL, dl);
            Ok(Action::Continue)
        }
        0x09 => {
            // DOS 1+ - WRITE STRING TO STANDARD OUTPUT
            // DS:DX -> '$'-terminated string; the terminator is not written
            let ds = cpu.get_sr(SR::DS);
            let mut off = cpu.get_r16(R16::DX);
            loop {
                let b = mmu.read_u8(ds, off)?;
                off = off.wrapping_add(1);
                if b == b'$' {
                    break;
                }
                out.write_all(&[b])?;
            }
            // Return:
            // AL = 24h (the '$' terminating the string)
            cpu.set_r8(R8::AL, b'$');
            Ok(Action::Continue)
        }
        0x2C => {
            // DOS 1+ - GET SYSTEM TIME
            // Return: CH:CL = hour:minute, DH:DL = second:1/100 second
            if cpu.deterministic {
                cpu.set_r16(R16::CX, 0);
                cpu.set_r16(R16::DX, 0);
            } else {
                let now = chrono::Local::now();
                let centi_sec = now.nanosecond() / 10_000_000;
                cpu.set_r8(R8::CH, now.hour() as u8);
                cpu.set_r8(R8::CL, now.minute() as u8);
                cpu.set_r8(R8::DH, now.second() as u8);
                cpu.set_r8(R8::DL, centi_sec as u8);
            }
            Ok(Action::Continue)
        }
        0x4C => {
            // DOS 2+ - EXIT - TERMINATE WITH RETURN CODE
            // AL = return code
            Ok(Action::Halt(cpu.get_r8(R8::AL)))
        }
        ah => Err(ExecuteError::UnsupportedService(int, ah)),
    }
}
