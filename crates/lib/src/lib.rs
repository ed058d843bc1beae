//! Ferry core library — config, messaging session, relay, and HTTP surface
//! used by the CLI binary.

pub mod agent;
pub mod channels;
pub mod config;
pub mod init;
pub mod relay;
pub mod server;
pub mod session;
pub mod store;
