//! Outbox Core - Configuration, retry policy and port definitions
//!
//! This crate contains the pieces shared by every Outbox component:
//! - **Configuration** - flat key/value store plus the typed [`config::Config`]
//! - **Retry budget** - bounded exponential backoff used by deletes and transfers
//! - **Port definitions** - traits for adapters: [`ports::IFileSender`]
//!
//! # Architecture
//!
//! The watch loop in `outbox-sync` depends only on the ports defined here;
//! `outbox-transfer` provides the production adapter and the daemon wires
//! the two together at startup.

pub mod config;
pub mod ports;
pub mod retry;
