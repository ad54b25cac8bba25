pub mod types;
pub mod cbc;
pub mod mac;
pub mod constant_time;

pub use types::*;
pub use cbc::*;
pub use mac::*;
