//! Repository modules for database access.

pub mod branch;
pub mod profile;

pub use self::branch::BranchRepository;
pub use self::profile::{ProfileRepository, UpdateProfile};
