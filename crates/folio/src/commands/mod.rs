pub mod build;
pub mod hash;
pub mod init;
pub mod lock;
