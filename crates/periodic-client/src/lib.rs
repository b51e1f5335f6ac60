//! periodic-client — the connection multiplexer and the two user-facing
//! roles of the Periodic protocol: a `Client` that submits and administers
//! jobs, and a `Worker` that registers functions and executes assignments.
//! Both run over a single multiplexed connection owned by [`mux::Mux`].

mod agent;
pub mod client;
pub mod job;
pub mod mux;
pub mod worker;

pub use agent::AgentId;
pub use client::{Client, SubmitOptions};
pub use job::Job;
pub use mux::Mux;
pub use worker::Worker;
