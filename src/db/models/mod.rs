//! Database models split into separate files.

pub mod branch;
pub mod profile;

pub use self::branch::*;
pub use self::profile::*;
