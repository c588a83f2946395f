//! Core data model types: addresses, headers, body blocks, and thread trees.

pub mod address;
pub mod message;
pub mod thread;
