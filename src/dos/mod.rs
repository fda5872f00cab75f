pub use self::dos::*;

mod dos;
