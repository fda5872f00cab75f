#![allow(clippy::single_match)]

#[macro_use]
extern crate serde_derive;

#[cfg(test)]
extern crate pretty_assertions;

pub mod cpu;
pub mod dos;
pub mod format;
pub mod hex;
pub mod machine;
pub mod memory;
pub mod tools;
