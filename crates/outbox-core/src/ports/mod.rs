//! Port definitions (hexagonal architecture interfaces)
//!
//! Ports are the interfaces the watch loop depends on while their
//! implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IFileSender`] - Pushes one file to the remote server

pub mod file_sender;

pub use file_sender::IFileSender;
