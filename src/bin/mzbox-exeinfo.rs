use std::process::exit;

use clap::{App, Arg};

use mzbox::format::ExeFile;
use mzbox::tools::read_binary;

const VERSION: &str = "0.1";

fn main() {
    let matches = App::new("mzbox-exeinfo")
        .version(VERSION)
        .arg(Arg::with_name("INPUT")
            .help("Sets the input file to use")
            .required(true)
            .index(1))
        .get_matches();

    let filename = matches.value_of("INPUT").unwrap();
    println!("mzbox-exeinfo {} - {}", VERSION, filename);

    let data = match read_binary(filename) {
        Ok(data) => data,
        Err(why) => {
            eprintln!("could not read {}: {}", filename, why);
            exit(1);
        }
    };

    match ExeFile::from_data(&data) {
        Ok(exe) => exe.print_details(),
        Err(why) => {
            eprintln!("could not parse {}: {}", filename, why);
            exit(1);
        }
    }
}
