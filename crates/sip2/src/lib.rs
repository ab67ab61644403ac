//! Stacks SIP2 -- patron authentication against a self-check (SIP2) server.
//!
//! This crate builds and parses SIP2 messages, exchanges them over TCP, and
//! turns a patron status response into a stored patron record.

pub mod auth;
pub mod client;
pub mod message;
pub mod transport;
