use std::process::exit;

use clap::{App, Arg};

use mzbox::cpu::SR;
use mzbox::hex::hex_bytes_separated;
use mzbox::machine::Machine;
use mzbox::tools::read_binary;

const VERSION: &str = "0.1";

fn main() {
    let matches = App::new("mzbox")
        .version(VERSION)
        .arg(Arg::with_name("INPUT")
            .help("MZ executable to run")
            .required(true)
            .index(1))
        .arg(Arg::with_name("trace")
            .long("trace")
            .help("Print each instruction as it executes"))
        .get_matches();

    let filename = matches.value_of("INPUT").unwrap();

    let data = match read_binary(filename) {
        Ok(data) => data,
        Err(why) => {
            eprintln!("could not read {}: {}", filename, why);
            exit(0xFF);
        }
    };

    let mut machine = Machine::default();
    machine.trace = matches.is_present("trace");

    if let Err(why) = machine.load_executable(&data) {
        eprintln!("could not load {}: {}", filename, why);
        exit(0xFF);
    }

    match machine.run() {
        Ok(code) => exit(i32::from(code)),
        Err(why) => {
            eprintln!("{}", why);
            let cs = machine.cpu.get_sr(SR::CS);
            let ip = machine.cpu.regs.ip;
            if let Ok(bytes) = machine.mmu.read(cs, ip, 8) {
                eprintln!("  bytes at {:04X}:{:04X}: {}", cs, ip, hex_bytes_separated(&bytes, ' '));
            }
            exit(0xFF);
        }
    }
}
