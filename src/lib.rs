pub mod api;
pub mod config;
pub mod logging;
pub mod middleware;
pub mod rate_limit;

pub use sshxfer_transfer::transfer;
