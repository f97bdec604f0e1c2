#![allow(clippy::module_inception)]
#![allow(clippy::upper_case_acronyms)]

pub mod config;
pub mod crypto;
pub mod error;
pub mod transaction;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
