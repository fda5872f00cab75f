use std::fs::File;
use std::io::{Error, Read};

/// reads a whole binary file into memory
pub fn read_binary(path: &str) -> Result<Vec<u8>, Error> {
    let mut buffer: Vec<u8> = Vec::new();
    let mut f = File::open(path)?;
    f.read_to_end(&mut buffer)?;
    Ok(buffer)
}
