pub mod crypto;
pub mod dgis;
pub mod flamp;
pub mod gateway;
pub mod init;
pub mod linker;
pub mod mask;
pub mod platform;
pub mod reviews;
pub mod stats;
