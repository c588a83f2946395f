//! `patchinbox`: threads, messages and per-file patches from a mailing-list
//! archive.
//!
//! An archive (a directory of message files or a single MBOX file) is
//! scanned once into a [`index::ThreadIndex`] of headers and reply links.
//! A [`store::ThreadStore`] answers queries over it, re-reading message
//! bodies from the [`source::RawSource`] on demand and splitting them into
//! plain, quoted and patch blocks.

pub mod config;
pub mod deadline;
pub mod error;
pub mod index;
pub mod model;
pub mod parser;
pub mod source;
pub mod store;
