//! periodic-core — wire vocabulary, framing, and transport for the Periodic
//! task-queue protocol. All other periodic crates depend on this one.

pub mod codec;
pub mod command;
pub mod endpoint;
pub mod error;
pub mod frame;
pub mod job;
pub mod xor;

pub use command::{ClientType, Command};
pub use endpoint::Endpoint;
pub use error::{Error, Result};
pub use job::JobSpec;
