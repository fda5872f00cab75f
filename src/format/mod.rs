pub use self::exe::*;

mod exe;
